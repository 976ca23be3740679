//! Queue context: registration and message operations for queue models

use crate::backend::QueueBackend;
use crate::message::Message;
use std::time::Duration;
use stowage_core::{
    BackendError, Model, Registry, StorageAccount, StorageConfig, StorageKind, StowageError,
    StowageResult,
};

/// Maps queue models onto queues, one queue per model.
///
/// Messages carry the model's fields as a JSON payload. Peeking or getting
/// from an empty or missing queue yields `None`. Update and delete need the
/// id and pop receipt of a retrieved message.
pub struct QueueContext<B: QueueBackend> {
    config: StorageConfig,
    account: StorageAccount,
    backend: B,
    registry: Registry,
}

impl<B: QueueBackend> QueueContext<B> {
    /// Create a context, failing immediately on invalid credentials
    pub fn new(config: StorageConfig, backend: B) -> StowageResult<Self> {
        let account = config.storage_account()?;
        Ok(Self {
            config,
            account,
            backend,
            registry: Registry::new(StorageKind::Queue),
        })
    }

    pub fn account(&self) -> &StorageAccount {
        &self.account
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_registered<M: Model>(&self) -> bool {
        self.registry.get::<M>().is_ok()
    }

    /// Register `M` and create its queue. Idempotent.
    ///
    /// The queue is encrypted when the model asks for it or the
    /// configuration requires encryption.
    pub async fn register<M: Model>(&mut self) -> StowageResult<()> {
        let Some(registration) = self.registry.plan::<M>(&self.config)? else {
            tracing::info!(
                "model {} already registered. Models are {:?}",
                M::NAME,
                self.registry.model_names()
            );
            return Ok(());
        };

        if let Err(e) = self.backend.create_queue(registration.handle()).await {
            tracing::error!("failed to create queue {}: {}", registration.storage_name(), e);
            return Err(e.into());
        }

        self.registry.insert::<M>(registration)?;
        tracing::info!(
            "model {} registered successfully. Models are {:?}",
            M::NAME,
            self.registry.model_names()
        );
        Ok(())
    }

    /// Unregister `M`, optionally deleting its queue and pending messages
    pub async fn unregister<M: Model>(&mut self, delete_queue: bool) -> StowageResult<()> {
        let registration = self.registry.remove::<M>()?;
        tracing::info!(
            "model {} unregistered. Models are {:?}",
            M::NAME,
            self.registry.model_names()
        );

        if delete_queue {
            match self.backend.delete_queue(registration.handle()).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!("queue {} was already gone: {}", registration.storage_name(), e);
                }
                Err(e) => {
                    tracing::error!("failed to delete queue {}: {}", registration.storage_name(), e);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Send the message; its id, pop receipt and timestamps are filled in
    pub async fn put<M: Model>(&self, message: &mut Message<M>) -> StowageResult<()> {
        let registration = self.registry.get::<M>()?;
        let payload = message.payload()?;

        match self
            .backend
            .put_message(registration.handle(), payload)
            .await
        {
            Ok(queued) => {
                message.merge_message(queued);
                Ok(())
            }
            Err(e) => Err(surface(e, "save", registration.storage_name(), None)),
        }
    }

    /// The next visible message, left visible to other consumers
    pub async fn peek<M: Model>(&self) -> StowageResult<Option<Message<M>>> {
        let registration = self.registry.get::<M>()?;

        match self.backend.peek_messages(registration.handle(), 1).await {
            Ok(messages) => Self::first_message(messages, registration.storage_name()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("can not peek queue {} because {}", registration.storage_name(), e);
                Ok(None)
            }
            Err(e) => Err(surface(e, "peek", registration.storage_name(), None)),
        }
    }

    /// Retrieve the next visible message and hide it for `hide`.
    ///
    /// `None` or a zero duration uses the service's default visibility
    /// timeout.
    pub async fn get<M: Model>(&self, hide: Option<Duration>) -> StowageResult<Option<Message<M>>> {
        let registration = self.registry.get::<M>()?;
        let hide = hide.filter(|d| !d.is_zero());

        match self
            .backend
            .get_messages(registration.handle(), 1, hide)
            .await
        {
            Ok(messages) => Self::first_message(messages, registration.storage_name()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("can not get from queue {} because {}", registration.storage_name(), e);
                Ok(None)
            }
            Err(e) => Err(surface(e, "get", registration.storage_name(), None)),
        }
    }

    /// Write the message's current fields back and hide it for `hide`.
    ///
    /// Returns `false` when the message has no id and pop receipt or is no
    /// longer in the queue.
    pub async fn update<M: Model>(&self, message: &mut Message<M>, hide: Duration) -> StowageResult<bool> {
        let registration = self.registry.get::<M>()?;
        let Some((id, receipt)) = message.receipt().map(|(i, r)| (i.to_string(), r.to_string()))
        else {
            tracing::warn!(
                "can not update message of model {} without id and pop receipt",
                M::NAME
            );
            return Ok(false);
        };
        let payload = message.payload()?;

        match self
            .backend
            .update_message(registration.handle(), &id, &receipt, hide, payload.clone())
            .await
        {
            Ok(updated) => {
                message.merge_update(payload, updated);
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "can not update message {} in queue {} because {}",
                    id,
                    registration.storage_name(),
                    e
                );
                Ok(false)
            }
            Err(e) => Err(surface(e, "update", registration.storage_name(), Some(&id))),
        }
    }

    /// Delete a retrieved message.
    ///
    /// Returns `false` when the message has no id and pop receipt or is no
    /// longer in the queue.
    pub async fn delete<M: Model>(&self, message: &mut Message<M>) -> StowageResult<bool> {
        let registration = self.registry.get::<M>()?;
        let Some((id, receipt)) = message.receipt().map(|(i, r)| (i.to_string(), r.to_string()))
        else {
            tracing::warn!(
                "can not delete message of model {} without id and pop receipt",
                M::NAME
            );
            return Ok(false);
        };

        match self
            .backend
            .delete_message(registration.handle(), &id, &receipt)
            .await
        {
            Ok(()) => {
                message.forget_receipt();
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "can not delete message {} in queue {} because {}",
                    id,
                    registration.storage_name(),
                    e
                );
                Ok(false)
            }
            Err(e) => Err(surface(e, "delete", registration.storage_name(), Some(&id))),
        }
    }

    fn first_message<M: Model>(
        messages: Vec<crate::backend::QueueMessage>,
        queue: &str,
    ) -> StowageResult<Option<Message<M>>> {
        let Some(queued) = messages.into_iter().next() else {
            return Ok(None);
        };
        let mut message = Message::<M>::new()?;
        if !message.merge_message(queued) {
            tracing::warn!(
                "can not parse message {:?} from queue {} into model {}",
                message.content(),
                queue,
                M::NAME
            );
        }
        Ok(Some(message))
    }
}

fn surface(error: BackendError, action: &str, queue: &str, id: Option<&str>) -> StowageError {
    match id {
        Some(id) => tracing::error!(
            "can not {} queue message: queue {} with message.id {} because {}",
            action,
            queue,
            id,
            error
        ),
        None => tracing::error!(
            "can not {} queue message: queue {} because {}",
            action,
            queue,
            error
        ),
    }
    error.into()
}
