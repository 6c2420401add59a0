use super::*;
use time::macros::datetime;

fn document(id: &str, text: &str, author: &str, created_at: &str) -> Value {
    json!({
        "name": format!("projects/demo/databases/(default)/documents/messages/{id}"),
        "fields": {
            "text": { "stringValue": text },
            "author": { "stringValue": author },
            "createdAt": { "timestampValue": created_at },
        },
        "createTime": created_at,
        "updateTime": created_at,
    })
}

fn message(id: &str, text: &str) -> Message {
    Message {
        id: id.into(),
        text: text.into(),
        author: "uid-1".into(),
        created_at: datetime!(2024-05-01 12:00:00 UTC),
    }
}

// =============================================================================
// polling
// =============================================================================

#[test]
fn first_poll_delivers_snapshot_even_when_empty() {
    let mut state = PollState::default();
    assert_eq!(state.observe(Ok(Vec::new())), Some(Ok(Vec::new())));
}

#[test]
fn unchanged_snapshot_is_delivered_once() {
    let mut state = PollState::default();
    let snapshot = vec![message("a", "hi")];
    assert!(state.observe(Ok(snapshot.clone())).is_some());
    assert_eq!(state.observe(Ok(snapshot)), None);
}

#[test]
fn changed_snapshot_is_delivered() {
    let mut state = PollState::default();
    state.observe(Ok(vec![message("a", "hi")]));
    let next = vec![message("a", "hi"), message("b", "there")];
    assert_eq!(state.observe(Ok(next.clone())), Some(Ok(next)));
}

#[test]
fn repeated_error_is_reported_once() {
    let mut state = PollState::default();
    let err = StoreError::Request("connection reset".into());
    assert_eq!(state.observe(Err(err.clone())), Some(Err(err.clone())));
    assert_eq!(state.observe(Err(err)), None);
}

#[test]
fn distinct_errors_are_each_reported() {
    let mut state = PollState::default();
    state.observe(Err(StoreError::Request("reset".into())));
    let other = StoreError::Response { status: 503, body: String::new() };
    assert_eq!(state.observe(Err(other.clone())), Some(Err(other)));
}

#[test]
fn recovery_with_same_snapshot_is_not_redelivered() {
    let mut state = PollState::default();
    let snapshot = vec![message("a", "hi")];
    state.observe(Ok(snapshot.clone()));
    assert!(state.observe(Err(StoreError::Request("reset".into()))).is_some());
    assert_eq!(state.observe(Ok(snapshot)), None);
}

#[test]
fn error_after_recovery_is_reported_again() {
    let mut state = PollState::default();
    let err = StoreError::Request("reset".into());
    state.observe(Err(err.clone()));
    state.observe(Ok(vec![message("a", "hi")]));
    assert_eq!(state.observe(Err(err.clone())), Some(Err(err)));
}

// =============================================================================
// request building
// =============================================================================

#[test]
fn run_query_orders_by_created_at_ascending() {
    let query = build_run_query("messages", &OrderBy::created_at_asc());
    let structured = &query["structuredQuery"];
    assert_eq!(structured["from"][0]["collectionId"], "messages");
    assert_eq!(structured["orderBy"][0]["field"]["fieldPath"], "createdAt");
    assert_eq!(structured["orderBy"][0]["direction"], "ASCENDING");
}

#[test]
fn run_query_descending_direction() {
    let order = OrderBy { field: "createdAt".into(), direction: Direction::Descending };
    let query = build_run_query("messages", &order);
    assert_eq!(query["structuredQuery"]["orderBy"][0]["direction"], "DESCENDING");
}

#[test]
fn commit_request_uses_server_timestamp_transform() {
    let message = NewMessage { text: "hello".into(), author: "uid-1".into() };
    let body = build_commit_request("projects/demo/databases/(default)", "messages", "abc123", &message);
    let write = &body["writes"][0];
    assert_eq!(write["update"]["name"], "projects/demo/databases/(default)/documents/messages/abc123");
    assert_eq!(write["update"]["fields"]["text"]["stringValue"], "hello");
    assert_eq!(write["update"]["fields"]["author"]["stringValue"], "uid-1");
    assert!(write["update"]["fields"].get("createdAt").is_none());
    assert_eq!(write["currentDocument"]["exists"], false);
    assert_eq!(write["updateTransforms"][0]["fieldPath"], "createdAt");
    assert_eq!(write["updateTransforms"][0]["setToServerValue"], "REQUEST_TIME");
}

// =============================================================================
// response parsing
// =============================================================================

#[test]
fn parse_run_query_documents_in_order() {
    let body = json!([
        { "document": document("m1", "first", "uid-a", "2024-05-01T10:00:00.000001Z"), "readTime": "2024-05-01T10:00:05Z" },
        { "document": document("m2", "second", "uid-b", "2024-05-01T10:00:02Z"), "readTime": "2024-05-01T10:00:05Z" },
    ])
    .to_string();
    let messages = parse_run_query_response(&body).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, "m1");
    assert_eq!(messages[0].text, "first");
    assert_eq!(messages[0].author, "uid-a");
    assert_eq!(messages[0].created_at, datetime!(2024-05-01 10:00:00.000001 UTC));
    assert_eq!(messages[1].id, "m2");
}

#[test]
fn parse_run_query_empty_result_has_only_read_time() {
    let body = json!([{ "readTime": "2024-05-01T10:00:05Z" }]).to_string();
    assert!(parse_run_query_response(&body).unwrap().is_empty());
}

#[test]
fn parse_run_query_skips_documents_without_timestamp() {
    let mut pending = document("m1", "pending", "uid-a", "2024-05-01T10:00:00Z");
    pending["fields"]
        .as_object_mut()
        .unwrap()
        .remove("createdAt");
    let body = json!([
        { "document": pending },
        { "document": document("m2", "ok", "uid-a", "2024-05-01T10:00:01Z") },
    ])
    .to_string();
    let messages = parse_run_query_response(&body).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "m2");
}

#[test]
fn parse_run_query_rejects_non_array() {
    let err = parse_run_query_response(r#"{"oops":true}"#).unwrap_err();
    assert!(matches!(err, StoreError::Parse(_)));
}

#[test]
fn parse_run_query_invalid_json() {
    assert!(matches!(parse_run_query_response("not json"), Err(StoreError::Parse(_))));
}

// =============================================================================
// error mapping
// =============================================================================

#[test]
fn permission_error_maps_to_rejected_with_message() {
    let body = json!({
        "error": { "code": 403, "message": "Missing or insufficient permissions.", "status": "PERMISSION_DENIED" }
    })
    .to_string();
    assert_eq!(
        error_from_response(403, body),
        StoreError::Rejected("Missing or insufficient permissions.".into())
    );
}

#[test]
fn server_error_keeps_status() {
    let err = error_from_response(503, "unavailable".into());
    assert_eq!(err, StoreError::Response { status: 503, body: "unavailable".into() });
}

#[test]
fn client_error_without_message_keeps_body() {
    let err = error_from_response(400, "bad".into());
    assert_eq!(err, StoreError::Response { status: 400, body: "bad".into() });
}

// =============================================================================
// connectivity
// =============================================================================

#[tokio::test]
async fn store_without_identity_is_not_connected() {
    let (_tx, rx) = watch::channel(None);
    let store = FirestoreStore::new("demo", "key".into(), rx, Duration::from_secs(1)).unwrap();
    assert!(!store.is_connected());
    let err = store
        .subscribe("messages", &OrderBy::created_at_asc())
        .await
        .err()
        .unwrap();
    assert_eq!(err, StoreError::NotConnected);
    let err = store
        .append("messages", NewMessage { text: "x".into(), author: "u".into() })
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::NotConnected);
}
