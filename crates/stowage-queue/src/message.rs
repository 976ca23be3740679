//! Queue models: a model instance carried as a message payload

use crate::backend::{QueueMessage, UpdatedMessage};
use chrono::{DateTime, Utc};
use std::fmt;
use std::ops::{Deref, DerefMut};
use stowage_core::{Model, ModelInstance, StowageResult, Value};

/// A message of model `M`.
///
/// The payload is the JSON object of the model's fields; the service
/// properties (id, pop receipt, timestamps) are filled in by the queue
/// context once the message was put, peeked or retrieved.
pub struct Message<M: Model> {
    instance: ModelInstance<M>,
    id: Option<String>,
    pop_receipt: Option<String>,
    content: Option<String>,
    insertion_time: Option<DateTime<Utc>>,
    expiration_time: Option<DateTime<Utc>>,
    next_visible_time: Option<DateTime<Utc>>,
    dequeue_count: u32,
}

impl<M: Model> Message<M> {
    /// A message with default fields, not yet queued
    pub fn new() -> StowageResult<Self> {
        Ok(Self::from_instance(ModelInstance::new()?))
    }

    pub fn with_overrides<I, K, V>(overrides: I) -> StowageResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        Ok(Self::from_instance(ModelInstance::with_overrides(overrides)?))
    }

    pub fn from_instance(instance: ModelInstance<M>) -> Self {
        Self {
            instance,
            id: None,
            pop_receipt: None,
            content: None,
            insertion_time: None,
            expiration_time: None,
            next_visible_time: None,
            dequeue_count: 0,
        }
    }

    /// Payload to send: the fields as a JSON object
    pub fn payload(&self) -> StowageResult<String> {
        Ok(serde_json::to_string(&self.instance.to_json())?)
    }

    /// Service properties and payload of a received message.
    ///
    /// Returns `false` when the content is not a JSON object; the fields
    /// then keep their current values.
    pub fn merge_message(&mut self, message: QueueMessage) -> bool {
        let parsed = match serde_json::from_str::<serde_json::Value>(&message.content) {
            Ok(serde_json::Value::Object(payload)) => {
                self.instance.fill_json(&payload);
                true
            }
            Ok(_) | Err(_) => false,
        };

        self.id = Some(message.id);
        self.pop_receipt = message.pop_receipt;
        self.content = Some(message.content);
        self.insertion_time = Some(message.insertion_time);
        self.expiration_time = Some(message.expiration_time);
        self.next_visible_time = message.next_visible_time;
        self.dequeue_count = message.dequeue_count;
        parsed
    }

    pub(crate) fn merge_update(&mut self, content: String, updated: UpdatedMessage) {
        self.content = Some(content);
        self.pop_receipt = Some(updated.pop_receipt);
        self.next_visible_time = Some(updated.next_visible_time);
    }

    pub(crate) fn forget_receipt(&mut self) {
        self.pop_receipt = None;
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn pop_receipt(&self) -> Option<&str> {
        self.pop_receipt.as_deref()
    }

    /// Id and pop receipt, when both are known and non-empty
    pub fn receipt(&self) -> Option<(&str, &str)> {
        match (self.id(), self.pop_receipt()) {
            (Some(id), Some(receipt)) if !id.is_empty() && !receipt.is_empty() => Some((id, receipt)),
            _ => None,
        }
    }

    /// Raw content last sent or received
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn insertion_time(&self) -> Option<DateTime<Utc>> {
        self.insertion_time
    }

    pub fn expiration_time(&self) -> Option<DateTime<Utc>> {
        self.expiration_time
    }

    pub fn next_visible_time(&self) -> Option<DateTime<Utc>> {
        self.next_visible_time
    }

    pub fn dequeue_count(&self) -> u32 {
        self.dequeue_count
    }

    pub fn instance(&self) -> &ModelInstance<M> {
        &self.instance
    }

    pub fn into_instance(self) -> ModelInstance<M> {
        self.instance
    }
}

impl<M: Model> Deref for Message<M> {
    type Target = ModelInstance<M>;

    fn deref(&self) -> &ModelInstance<M> {
        &self.instance
    }
}

impl<M: Model> DerefMut for Message<M> {
    fn deref_mut(&mut self) -> &mut ModelInstance<M> {
        &mut self.instance
    }
}

impl<M: Model> Clone for Message<M> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance.clone(),
            id: self.id.clone(),
            pop_receipt: self.pop_receipt.clone(),
            content: self.content.clone(),
            insertion_time: self.insertion_time,
            expiration_time: self.expiration_time,
            next_visible_time: self.next_visible_time,
            dequeue_count: self.dequeue_count,
        }
    }
}

impl<M: Model> fmt::Debug for Message<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("pop_receipt", &self.pop_receipt)
            .field("dequeue_count", &self.dequeue_count)
            .field("instance", &self.instance)
            .finish()
    }
}
