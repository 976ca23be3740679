//! In-memory queue backend for development and testing

use crate::backend::{
    visibility_offset, QueueBackend, QueueMessage, UpdatedMessage, DEFAULT_VISIBILITY_TIMEOUT,
    MESSAGE_TIME_TO_LIVE,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use stowage_core::{BackendError, BackendResult, StorageHandle};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Entry {
    message: QueueMessage,
    visible_at: DateTime<Utc>,
    encrypted: bool,
}

impl Entry {
    fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.visible_at <= now
    }
}

/// In-memory queue backend.
///
/// Messages are served in insertion order. Retrieved messages stay hidden
/// for their visibility timeout, every get or update issues a fresh pop
/// receipt, and expired messages are dropped on access.
#[derive(Default)]
pub struct MemoryQueueBackend {
    queues: RwLock<HashMap<String, VecDeque<Entry>>>,
}

impl MemoryQueueBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_queue(&self, name: &str) -> bool {
        self.queues.read().contains_key(name)
    }

    /// Stored message contents exactly as persisted, in queue order
    pub fn raw_messages(&self, queue: &str) -> Vec<String> {
        self.queues
            .read()
            .get(queue)
            .map(|entries| entries.iter().map(|e| e.message.content.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of stored messages, hidden ones included
    pub fn message_count(&self, queue: &str) -> usize {
        self.queues.read().get(queue).map_or(0, |entries| entries.len())
    }

    fn missing_queue(queue: &StorageHandle) -> BackendError {
        BackendError::NotFound(format!("queue {}", queue.name()))
    }

    fn missing_message(queue: &StorageHandle, id: &str) -> BackendError {
        BackendError::NotFound(format!("message {} in queue {}", id, queue.name()))
    }

    fn seal(queue: &StorageHandle, content: String) -> BackendResult<(String, bool)> {
        match queue.encryption() {
            Some(binding) => binding
                .seal(content.as_bytes())
                .map(|envelope| (envelope, true))
                .map_err(|e| BackendError::Encryption(e.to_string())),
            None => Ok((content, false)),
        }
    }

    /// Message as returned to callers, content decrypted
    fn reveal(queue: &StorageHandle, entry: &Entry) -> BackendResult<QueueMessage> {
        let mut message = entry.message.clone();
        if entry.encrypted {
            let binding = queue.encryption().ok_or_else(|| {
                BackendError::Encryption(format!(
                    "message {} is encrypted but queue {} has no key",
                    message.id,
                    queue.name()
                ))
            })?;
            let plaintext = binding
                .open(&message.content)
                .map_err(|e| BackendError::Encryption(e.to_string()))?;
            message.content = String::from_utf8(plaintext)
                .map_err(|e| BackendError::Encryption(format!("message is not UTF-8: {}", e)))?;
        }
        Ok(message)
    }

    fn checked_entry<'a>(
        entries: &'a mut VecDeque<Entry>,
        queue: &StorageHandle,
        id: &str,
        pop_receipt: &str,
    ) -> BackendResult<(usize, &'a mut Entry)> {
        let (index, entry) = entries
            .iter_mut()
            .enumerate()
            .find(|(_, e)| e.message.id == id)
            .ok_or_else(|| Self::missing_message(queue, id))?;
        if entry.message.pop_receipt.as_deref() != Some(pop_receipt) {
            return Err(BackendError::Conflict(format!(
                "pop receipt of message {} in queue {} does not match",
                id,
                queue.name()
            )));
        }
        Ok((index, entry))
    }
}

fn purge_expired(entries: &mut VecDeque<Entry>, now: DateTime<Utc>) {
    entries.retain(|e| e.message.expiration_time > now);
}

#[async_trait]
impl QueueBackend for MemoryQueueBackend {
    async fn create_queue(&self, queue: &StorageHandle) -> BackendResult<()> {
        self.queues
            .write()
            .entry(queue.name().to_string())
            .or_default();
        Ok(())
    }

    async fn delete_queue(&self, queue: &StorageHandle) -> BackendResult<()> {
        self.queues
            .write()
            .remove(queue.name())
            .map(|_| ())
            .ok_or_else(|| Self::missing_queue(queue))
    }

    async fn put_message(&self, queue: &StorageHandle, content: String) -> BackendResult<QueueMessage> {
        let now = Utc::now();
        let (stored, encrypted) = Self::seal(queue, content.clone())?;
        let message = QueueMessage {
            id: Uuid::new_v4().to_string(),
            pop_receipt: Some(Uuid::new_v4().to_string()),
            content: stored,
            insertion_time: now,
            expiration_time: now + visibility_offset(MESSAGE_TIME_TO_LIVE)?,
            next_visible_time: Some(now),
            dequeue_count: 0,
        };

        let mut queues = self.queues.write();
        let entries = queues
            .get_mut(queue.name())
            .ok_or_else(|| Self::missing_queue(queue))?;
        entries.push_back(Entry {
            message: message.clone(),
            visible_at: now,
            encrypted,
        });

        Ok(QueueMessage { content, ..message })
    }

    async fn peek_messages(&self, queue: &StorageHandle, count: usize) -> BackendResult<Vec<QueueMessage>> {
        let now = Utc::now();
        let visible: Vec<Entry> = {
            let mut queues = self.queues.write();
            let entries = queues
                .get_mut(queue.name())
                .ok_or_else(|| Self::missing_queue(queue))?;
            purge_expired(entries, now);
            entries
                .iter()
                .filter(|e| e.is_visible(now))
                .take(count)
                .cloned()
                .collect()
        };

        visible
            .iter()
            .map(|entry| {
                let mut message = Self::reveal(queue, entry)?;
                message.pop_receipt = None;
                message.next_visible_time = None;
                Ok(message)
            })
            .collect()
    }

    async fn get_messages(
        &self,
        queue: &StorageHandle,
        count: usize,
        visibility_timeout: Option<Duration>,
    ) -> BackendResult<Vec<QueueMessage>> {
        let now = Utc::now();
        let hidden_until =
            now + visibility_offset(visibility_timeout.unwrap_or(DEFAULT_VISIBILITY_TIMEOUT))?;

        let retrieved: Vec<Entry> = {
            let mut queues = self.queues.write();
            let entries = queues
                .get_mut(queue.name())
                .ok_or_else(|| Self::missing_queue(queue))?;
            purge_expired(entries, now);
            entries
                .iter_mut()
                .filter(|e| e.is_visible(now))
                .take(count)
                .map(|entry| {
                    entry.visible_at = hidden_until;
                    entry.message.pop_receipt = Some(Uuid::new_v4().to_string());
                    entry.message.next_visible_time = Some(hidden_until);
                    entry.message.dequeue_count += 1;
                    entry.clone()
                })
                .collect()
        };

        retrieved
            .iter()
            .map(|entry| Self::reveal(queue, entry))
            .collect()
    }

    async fn update_message(
        &self,
        queue: &StorageHandle,
        id: &str,
        pop_receipt: &str,
        visibility_timeout: Duration,
        content: String,
    ) -> BackendResult<UpdatedMessage> {
        let now = Utc::now();
        let visible_at = now + visibility_offset(visibility_timeout)?;
        let (stored, encrypted) = Self::seal(queue, content)?;

        let mut queues = self.queues.write();
        let entries = queues
            .get_mut(queue.name())
            .ok_or_else(|| Self::missing_queue(queue))?;
        purge_expired(entries, now);
        let (_, entry) = Self::checked_entry(entries, queue, id, pop_receipt)?;

        let receipt = Uuid::new_v4().to_string();
        entry.message.content = stored;
        entry.message.pop_receipt = Some(receipt.clone());
        entry.message.next_visible_time = Some(visible_at);
        entry.visible_at = visible_at;
        entry.encrypted = encrypted;

        Ok(UpdatedMessage {
            pop_receipt: receipt,
            next_visible_time: visible_at,
        })
    }

    async fn delete_message(&self, queue: &StorageHandle, id: &str, pop_receipt: &str) -> BackendResult<()> {
        let mut queues = self.queues.write();
        let entries = queues
            .get_mut(queue.name())
            .ok_or_else(|| Self::missing_queue(queue))?;
        let (index, _) = Self::checked_entry(entries, queue, id, pop_receipt)?;
        entries.remove(index);
        Ok(())
    }
}
