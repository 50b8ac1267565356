// Pins the on-the-wire JSON shapes the RPC surface promises callers (§4.9):
// an operator CLI or dashboard parsing these frames by hand must keep working
// across internal refactors of the Rust types that produce them.

use gatewire_protocol::frames::{EventFrame, InboundFrame, PingFrame, PongFrame, ResponseFrame, StateVersion};
use gatewire_protocol::handshake::{HelloOk, HelloParams, ServerFeatures, ServerInfo};
use gatewire_protocol::methods::is_authorized;

#[test]
fn request_frame_parses_out_of_an_inbound_frame() {
    let json = r#"{"type":"request","id":"abc-123","method":"chat.send","params":{"text":"hello"}}"#;
    let frame: InboundFrame = serde_json::from_str(json).unwrap();
    assert_eq!(frame.frame_type, "request");

    let req = frame.as_request().unwrap();
    assert_eq!(req.method, "chat.send");
    assert_eq!(req.id, "abc-123");
}

#[test]
fn an_event_frame_never_parses_as_a_request() {
    let json = r#"{"type":"event","event":"tick","payload":{}}"#;
    let frame: InboundFrame = serde_json::from_str(json).unwrap();
    assert!(frame.as_request().is_none(), "event frame must not parse as request");
}

#[test]
fn response_ok_omits_the_error_field() {
    let res = ResponseFrame::ok("req-1", serde_json::json!({"pong": true}));
    let json = serde_json::to_string(&res).unwrap();

    assert!(json.contains(r#""type":"response""#));
    assert!(json.contains(r#""ok":true"#));
    assert!(json.contains(r#""pong":true"#));
    assert!(!json.contains(r#""error""#));
}

#[test]
fn response_err_omits_the_payload_field_and_carries_the_error_code() {
    let res = ResponseFrame::err("req-2", "UNAUTHORIZED", "caller's scopes do not permit this method");
    let json = serde_json::to_string(&res).unwrap();

    assert!(json.contains(r#""ok":false"#));
    assert!(json.contains(r#""UNAUTHORIZED""#));
    assert!(!json.contains(r#""payload""#));
}

#[test]
fn event_frame_carries_a_monotonic_seq_and_optional_state_version() {
    let ev = EventFrame::new("tick", serde_json::json!({"ts": 1234567890}))
        .with_seq(42);
    let json = serde_json::to_string(&ev).unwrap();

    assert!(json.contains(r#""type":"event""#));
    assert!(json.contains(r#""event":"tick""#));
    assert!(json.contains(r#""seq":42"#));
    // omitted state_version must not appear at all, not as `null`
    assert!(!json.contains("stateVersion") && !json.contains("state_version"));

    let mut ev = ev;
    ev.state_version = Some(StateVersion { presence: Some(7), health: None });
    let json = serde_json::to_string(&ev).unwrap();
    assert!(json.contains(r#""presence":7"#));
    assert!(!json.contains("health"));
}

#[test]
fn pong_echoes_the_ping_id_it_answers() {
    let json = r#"{"type":"ping","id":"hb-9"}"#;
    let frame: InboundFrame = serde_json::from_str(json).unwrap();
    assert!(frame.is_ping());

    let pong = PongFrame::reply_to(frame.ping_id());
    let out = serde_json::to_string(&pong).unwrap();
    assert!(out.contains(r#""type":"pong""#));
    assert!(out.contains(r#""id":"hb-9""#));
}

#[test]
fn a_ping_with_no_id_round_trips_with_no_id_on_either_side() {
    let ping = PingFrame::default();
    let json = serde_json::to_string(&ping).unwrap();
    assert_eq!(json, r#"{"type":"ping"}"#);

    let pong = PongFrame::reply_to(None);
    assert!(serde_json::to_string(&pong).unwrap().ends_with(r#""type":"pong"}"#));
}

#[test]
fn hello_params_with_token_authenticates_an_already_paired_node() {
    let json = r#"{"nodeId":"node-1","token":"secret-123"}"#;
    let params: HelloParams = serde_json::from_str(json).unwrap();

    assert_eq!(params.node_id, "node-1");
    assert_eq!(params.token.as_deref(), Some("secret-123"));
}

#[test]
fn hello_params_without_a_token_means_the_node_still_needs_pairing() {
    let json = r#"{"nodeId":"node-2"}"#;
    let params: HelloParams = serde_json::from_str(json).unwrap();

    assert!(params.token.is_none());
}

#[test]
fn hello_ok_reports_the_negotiated_protocol_version() {
    let hello = HelloOk {
        protocol: 3,
        server: ServerInfo {
            name: "gateway".into(),
            version: "0.1.0".into(),
            node_id: "test".into(),
        },
        features: ServerFeatures::default(),
        snapshot: serde_json::Value::Object(Default::default()),
        policy: Default::default(),
    };
    let json = serde_json::to_string(&hello).unwrap();
    assert!(json.contains(r#""protocol":3"#));
}

#[test]
fn admin_scope_passes_every_method_regardless_of_its_required_scope() {
    let scopes = vec!["operator.admin".to_string()];
    for method in ["sessions.patch", "chat.send", "sessions.list", "node.pair.approve"] {
        assert!(is_authorized(method, &scopes), "{method} should pass under admin");
    }
}

#[test]
fn write_scope_also_satisfies_a_read_required_method() {
    assert!(is_authorized("sessions.list", &["operator.write".to_string()]));
}

#[test]
fn read_scope_does_not_satisfy_a_write_required_method() {
    assert!(!is_authorized("chat.send", &["operator.read".to_string()]));
}
