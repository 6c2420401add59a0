use super::*;
use time::macros::datetime;

fn message(id: &str, text: &str, created_at: OffsetDateTime) -> Message {
    Message { id: id.into(), text: text.into(), author: "uid-1".into(), created_at }
}

#[test]
fn order_by_created_at_asc_uses_created_at_field() {
    let order = OrderBy::created_at_asc();
    assert_eq!(order.field, "createdAt");
    assert_eq!(order.direction, Direction::Ascending);
}

#[test]
fn view_preserves_snapshot_order() {
    let view = ConversationView::from_snapshot(vec![
        message("a", "first", datetime!(2024-05-01 10:00:00 UTC)),
        message("b", "second", datetime!(2024-05-01 10:00:01 UTC)),
    ]);
    assert_eq!(view.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(view.last().map(|m| m.text.as_str()), Some("second"));
    assert_eq!(view.len(), 2);
}

#[test]
fn default_view_is_empty() {
    let view = ConversationView::default();
    assert!(view.is_empty());
    assert!(view.last().is_none());
}

#[test]
fn message_serializes_created_at_as_rfc3339() {
    let msg = message("a", "hi", datetime!(2024-05-01 10:00:00 UTC));
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["created_at"], "2024-05-01T10:00:00Z");
    let back: Message = serde_json::from_value(json).unwrap();
    assert_eq!(back, msg);
}

#[test]
fn author_label_truncates_long_ids() {
    let mut msg = message("a", "hi", datetime!(2024-05-01 10:00:00 UTC));
    msg.author = "Xq2bN1abcdef".into();
    assert_eq!(msg.author_label(), "Xq2bN1");
    msg.author = "abc".into();
    assert_eq!(msg.author_label(), "abc");
}
