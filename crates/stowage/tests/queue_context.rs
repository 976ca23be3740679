//! Queue context behavior against the in-memory queue backend

use std::time::Duration;
use stowage::prelude::*;

struct QueueOne;

impl Model for QueueOne {
    const NAME: &'static str = "QueueOne";
    const KIND: StorageKind = StorageKind::Queue;

    fn define(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .field("epgid", 0)
            .field("resolution", "")
            .field("sourcefile", "")
            .field("sourcelink", "")
    }
}

fn queue_one(resolution: &str) -> Message<QueueOne> {
    Message::with_overrides([("epgid", Value::from(1)), ("resolution", Value::from(resolution))]).unwrap()
}

async fn context() -> QueueContext<MemoryQueueBackend> {
    let _ = stowage::logging::init();
    let mut queue = QueueContext::new(StorageConfig::emulated(), MemoryQueueBackend::new()).unwrap();
    queue.register::<QueueOne>().await.unwrap();
    queue
}

#[tokio::test]
async fn test_register_model() {
    let queue = context().await;
    assert!(queue.registry().model_names().contains(&"QueueOne"));
}

#[tokio::test]
async fn test_put() {
    let queue = context().await;
    let mut message = queue_one("test_put");
    queue.put(&mut message).await.unwrap();
    assert!(message.receipt().is_some());
    assert!(queue.delete(&mut message).await.unwrap());
    assert_eq!(queue.backend().message_count("queueone"), 0);
}

#[tokio::test]
async fn test_peek() {
    let queue = context().await;
    let mut message = queue_one("test_peek");
    queue.put(&mut message).await.unwrap();

    let first = queue.peek::<QueueOne>().await.unwrap().unwrap();
    assert_eq!(first.get_as::<String>("resolution").as_deref(), Some("test_peek"));
    assert_eq!(first.id(), message.id());

    assert!(queue.delete(&mut message).await.unwrap());
}

#[tokio::test]
async fn test_get_hide() {
    let queue = context().await;
    queue.put(&mut queue_one("test_get_hide")).await.unwrap();

    let hidden = queue
        .get::<QueueOne>(Some(Duration::from_secs(10)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hidden.get_as::<i64>("epgid"), Some(1));
    assert_eq!(hidden.get_as::<String>("resolution").as_deref(), Some("test_get_hide"));
    assert!(hidden.next_visible_time().is_some());

    assert!(queue.get::<QueueOne>(None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_nothide() {
    let queue = context().await;
    queue.put(&mut queue_one("test_get_nothide")).await.unwrap();

    let first = queue
        .get::<QueueOne>(Some(Duration::from_secs(1)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.get_as::<String>("resolution").as_deref(), Some("test_get_nothide"));

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let mut again = queue.get::<QueueOne>(None).await.unwrap().unwrap();
    assert_eq!(again.id(), first.id());
    assert_eq!(again.dequeue_count(), 2);
    assert!(queue.delete(&mut again).await.unwrap());
}

#[tokio::test]
async fn test_unregister_model() {
    let mut queue = context().await;
    queue.unregister::<QueueOne>(false).await.unwrap();
    assert!(!queue.registry().model_names().contains(&"QueueOne"));
    assert!(queue.backend().has_queue("queueone"));
}

#[tokio::test]
async fn test_unregister_model_delete() {
    let mut queue = context().await;
    queue.unregister::<QueueOne>(true).await.unwrap();
    assert!(!queue.is_registered::<QueueOne>());
    assert!(!queue.backend().has_queue("queueone"));
}
