use super::*;

#[test]
fn request_sets_fields() {
    let frame = Frame::request("presence:list", Data::new());
    assert_eq!(frame.syscall, "presence:list");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert!(frame.device_id.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn reply_inherits_context() {
    let req = Frame::request("presence:ping", Data::new()).with_device_id("phone-1");
    let done = req.done();

    assert_eq!(done.parent_id, Some(req.id));
    assert_eq!(done.device_id.as_deref(), Some("phone-1"));
    assert_eq!(done.syscall, "presence:ping");
    assert_eq!(done.status, Status::Done);
    assert!(done.data.is_empty());
}

#[test]
fn done_with_carries_payload() {
    let req = Frame::request("presence:get", Data::new());
    let done = req.done_with(Data::new()).with_data("online", true);

    assert_eq!(done.status, Status::Done);
    assert_eq!(done.parent_id, Some(req.id));
    assert_eq!(done.data.get("online").and_then(serde_json::Value::as_bool), Some(true));
}

#[test]
fn status_wire_names_are_lowercase() {
    assert_eq!(serde_json::to_value(Status::Item).unwrap(), "item");
    let status: Status = serde_json::from_str("\"error\"").unwrap();
    assert_eq!(status, Status::Error);
}

#[test]
fn prefix_and_op_extraction() {
    let frame = Frame::request("presence:ping", Data::new());
    assert_eq!(frame.prefix(), "presence");
    assert_eq!(frame.op(), "ping");

    let frame = Frame::request("noseparator", Data::new());
    assert_eq!(frame.prefix(), "noseparator");
    assert_eq!(frame.op(), "");
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("not found")]
    struct NotFound;

    impl ErrorCode for NotFound {
        fn error_code(&self) -> &'static str {
            "E_NOT_FOUND"
        }
    }

    let req = Frame::request("presence:get", Data::new());
    let err = req.error_from(&NotFound);

    assert_eq!(err.status, Status::Error);
    assert_eq!(err.data.get("code").and_then(|v| v.as_str()), Some("E_NOT_FOUND"));
    assert_eq!(err.data.get("message").and_then(|v| v.as_str()), Some("not found"));
    assert_eq!(
        err.data
            .get("retryable")
            .and_then(serde_json::Value::as_bool),
        Some(false)
    );
}

#[test]
fn deserialize_minimal_frame() {
    // Only id and syscall; everything else defaults.
    let json = r#"{"id": "053ffe5e-16ed-41f1-a36d-eabdd40c0ceb", "syscall": "presence:ping"}"#;
    let frame: Frame = serde_json::from_str(json).expect("minimal frame should deserialize");
    assert_eq!(frame.syscall, "presence:ping");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.device_id.is_none());
    assert!(frame.data.is_empty());
}

#[test]
fn serialize_omits_missing_device_id() {
    let frame = Frame::request("presence:list", Data::new());
    let json = serde_json::to_value(&frame).expect("serialize");
    assert!(json.get("device_id").is_none());
    assert_eq!(json["status"], "request");
}

#[test]
fn deserialize_without_syscall_fails() {
    let json = r#"{"id": "053ffe5e-16ed-41f1-a36d-eabdd40c0ceb"}"#;
    assert!(serde_json::from_str::<Frame>(json).is_err());
}
