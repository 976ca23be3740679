//! Queue service boundary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stowage_core::{BackendError, BackendResult, StorageHandle};

/// Visibility timeout applied by `get_messages` when none is given
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Time-to-live of a queued message
pub const MESSAGE_TIME_TO_LIVE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A message as the queue service returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: String,

    /// Receipt for update/delete; peeked messages carry none
    pub pop_receipt: Option<String>,

    pub content: String,

    pub insertion_time: DateTime<Utc>,

    pub expiration_time: DateTime<Utc>,

    pub next_visible_time: Option<DateTime<Utc>>,

    pub dequeue_count: u32,
}

/// Result of updating a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedMessage {
    pub pop_receipt: String,
    pub next_visible_time: DateTime<Utc>,
}

/// Queue service operations used by [`QueueContext`](crate::QueueContext).
///
/// A missing queue or message is reported as `BackendError::NotFound`.
/// When the queue handle carries an encryption binding the backend
/// encrypts message content on put/update and decrypts it on peek/get.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Create the queue if it does not exist
    async fn create_queue(&self, queue: &StorageHandle) -> BackendResult<()>;

    async fn delete_queue(&self, queue: &StorageHandle) -> BackendResult<()>;

    async fn put_message(&self, queue: &StorageHandle, content: String) -> BackendResult<QueueMessage>;

    /// Visible messages without changing their visibility
    async fn peek_messages(&self, queue: &StorageHandle, count: usize) -> BackendResult<Vec<QueueMessage>>;

    /// Dequeue visible messages, hiding them for `visibility_timeout`
    /// (or [`DEFAULT_VISIBILITY_TIMEOUT`])
    async fn get_messages(
        &self,
        queue: &StorageHandle,
        count: usize,
        visibility_timeout: Option<Duration>,
    ) -> BackendResult<Vec<QueueMessage>>;

    /// Replace a message's content and visibility; the old receipt is invalidated
    async fn update_message(
        &self,
        queue: &StorageHandle,
        id: &str,
        pop_receipt: &str,
        visibility_timeout: Duration,
        content: String,
    ) -> BackendResult<UpdatedMessage>;

    async fn delete_message(&self, queue: &StorageHandle, id: &str, pop_receipt: &str) -> BackendResult<()>;
}

/// Convert a visibility timeout to a chrono offset
pub(crate) fn visibility_offset(timeout: Duration) -> BackendResult<chrono::Duration> {
    chrono::Duration::from_std(timeout).map_err(|e| {
        BackendError::Service(format!(
            "Invalid visibility timeout: {:?} is too large ({})",
            timeout, e
        ))
    })
}
