use super::*;
use crate::error::ErrorCode;
use crate::session::Identity;
use crate::store::memory::MemoryStore;
use std::time::Duration;
use tokio::time::timeout;

const COLLECTION: &str = "messages";

fn session(uid: &str) -> Session {
    Session::established(Identity {
        uid: uid.into(),
        id_token: "tok".into(),
        refresh_token: "ref".into(),
        expires_in: Duration::from_secs(3600),
    })
}

fn controller(store: &MemoryStore) -> SyncController {
    SyncController::new(Arc::new(store.clone()), COLLECTION)
}

async fn next_event(stream: &mut ViewStream) -> SyncEvent {
    timeout(Duration::from_millis(200), stream.next())
        .await
        .expect("event receive timed out")
        .expect("stream closed")
}

async fn next_view(stream: &mut ViewStream) -> ConversationView {
    match next_event(stream).await {
        SyncEvent::Snapshot(view) => view,
        SyncEvent::Error(e) => panic!("expected snapshot, got error {e}"),
    }
}

// =============================================================================
// send
// =============================================================================

#[tokio::test]
async fn blank_text_makes_no_store_call() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    for text in ["", "   ", "\n\t "] {
        assert_eq!(sync.send(&session("alice"), text).await, Err(SendError::EmptyText));
    }
    assert_eq!(store.append_calls(), 0);
}

#[tokio::test]
async fn unauthenticated_send_makes_no_store_call() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    let err = sync.send(&Session::unauthenticated(), "hi").await.unwrap_err();
    assert_eq!(err, SendError::NotAuthenticated);
    assert_eq!(store.append_calls(), 0);
}

#[tokio::test]
async fn disconnected_send_makes_no_store_call() {
    let store = MemoryStore::new();
    store.set_connected(false);
    let sync = controller(&store);
    let err = sync.send(&session("alice"), "hi").await.unwrap_err();
    assert_eq!(err, SendError::NotConnected);
    assert!(err.retryable());
    assert_eq!(store.append_calls(), 0);
}

#[tokio::test]
async fn send_appends_trimmed_text_with_session_author() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    let id = sync.send(&session("alice"), "  hello  ").await.unwrap();

    let stored = store.messages(COLLECTION);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
    assert_eq!(stored[0].text, "hello");
    assert_eq!(stored[0].author, "alice");
}

#[tokio::test]
async fn send_does_not_touch_view() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    sync.send(&session("alice"), "hello").await.unwrap();
    assert!(sync.view().is_empty());
}

#[tokio::test]
async fn store_failure_is_reported_with_store_code() {
    let store = MemoryStore::new();
    store.fail_next_append(StoreError::Response { status: 503, body: "busy".into() });
    let sync = controller(&store);

    let err = sync.send(&session("alice"), "hello").await.unwrap_err();
    assert!(matches!(err, SendError::Store(StoreError::Response { status: 503, .. })));
    assert_eq!(err.error_code(), "E_STORE_RESPONSE");
    assert!(err.retryable());
    assert!(store.messages(COLLECTION).is_empty());
}

// =============================================================================
// subscribe
// =============================================================================

#[tokio::test]
async fn subscribe_delivers_initial_view() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    sync.send(&session("alice"), "earlier").await.unwrap();

    let mut stream = sync.subscribe(&OrderBy::created_at_asc()).await.unwrap();
    let view = next_view(&mut stream).await;
    assert_eq!(view.len(), 1);
    assert_eq!(sync.view(), view);
}

#[tokio::test]
async fn appended_record_transitions_view_without_duplicates_or_gaps() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    sync.send(&session("alice"), "one").await.unwrap();
    sync.send(&session("bob"), "two").await.unwrap();

    let mut stream = sync.subscribe(&OrderBy::created_at_asc()).await.unwrap();
    let before: Vec<String> = next_view(&mut stream).await.ids().map(str::to_owned).collect();

    let new_id = sync.send(&session("alice"), "three").await.unwrap();
    let after: Vec<String> = next_view(&mut stream).await.ids().map(str::to_owned).collect();

    let mut expected = before.clone();
    expected.push(new_id);
    assert_eq!(after, expected);
}

#[tokio::test]
async fn snapshots_are_ordered_by_created_at() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    let mut stream = sync.subscribe(&OrderBy::created_at_asc()).await.unwrap();
    next_view(&mut stream).await;

    for i in 0..5 {
        sync.send(&session("alice"), &format!("m{i}")).await.unwrap();
    }
    let mut view = next_view(&mut stream).await;
    while view.len() < 5 {
        view = next_view(&mut stream).await;
    }
    let stamps: Vec<_> = view.messages().iter().map(|m| m.created_at).collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn subscription_error_keeps_last_view_and_stream_open() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    sync.send(&session("alice"), "kept").await.unwrap();
    let mut stream = sync.subscribe(&OrderBy::created_at_asc()).await.unwrap();
    let initial = next_view(&mut stream).await;

    store.push_error(COLLECTION, StoreError::Request("connection reset".into()));
    match next_event(&mut stream).await {
        SyncEvent::Error(StoreError::Request(msg)) => assert_eq!(msg, "connection reset"),
        other => panic!("expected request error, got {other:?}"),
    }
    assert_eq!(sync.view(), initial);

    sync.send(&session("alice"), "after").await.unwrap();
    assert_eq!(next_view(&mut stream).await.len(), 2);
}

#[tokio::test]
async fn unsupported_ordering_is_an_error() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    let order = OrderBy { field: "text".into(), direction: crate::model::Direction::Ascending };
    let err = sync.subscribe(&order).await.err().expect("subscribe should fail");
    assert_eq!(err, StoreError::UnsupportedOrdering("text".into()));
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn resubscribe_releases_previous_registration() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    let mut first = sync.subscribe(&OrderBy::created_at_asc()).await.unwrap();
    next_view(&mut first).await;
    assert_eq!(store.subscriber_count(), 1);

    let mut second = sync.subscribe(&OrderBy::created_at_asc()).await.unwrap();
    assert_eq!(store.subscriber_count(), 1);
    assert!(!first.is_live());
    assert!(second.is_live());

    sync.send(&session("alice"), "hi").await.unwrap();
    next_view(&mut second).await;
    assert_eq!(next_view(&mut second).await.len(), 1);
    assert!(timeout(Duration::from_millis(200), first.next()).await.unwrap().is_none());
}

#[tokio::test]
async fn close_stops_delivery_and_releases_store() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    let mut stream = sync.subscribe(&OrderBy::created_at_asc()).await.unwrap();
    next_view(&mut stream).await;

    sync.close();
    assert_eq!(store.subscriber_count(), 0);
    sync.send(&session("alice"), "unseen").await.unwrap();
    assert!(timeout(Duration::from_millis(200), stream.next()).await.unwrap().is_none());
}

#[tokio::test]
async fn dropping_controller_releases_store() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    let _stream = sync.subscribe(&OrderBy::created_at_asc()).await.unwrap();
    assert_eq!(store.subscriber_count(), 1);
    drop(sync);
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn watch_view_observes_replacements() {
    let store = MemoryStore::new();
    let sync = controller(&store);
    let mut watcher = sync.watch_view();
    let mut stream = sync.subscribe(&OrderBy::created_at_asc()).await.unwrap();
    next_view(&mut stream).await;

    sync.send(&session("alice"), "hi").await.unwrap();
    next_view(&mut stream).await;
    watcher.changed().await.unwrap();
    assert_eq!(watcher.borrow_and_update().len(), 1);
}
