use super::*;

fn message_bytes(body: &str) -> Vec<u8> {
    format!("MESSAGE\ndestination:/topic/dashboard\nsubscription:sub-0\nmessage-id:7\n\n{body}\0").into_bytes()
}

#[test]
fn command_parses_every_wire_spelling() {
    for command in [
        Command::Connect,
        Command::Stomp,
        Command::Connected,
        Command::Send,
        Command::Subscribe,
        Command::Unsubscribe,
        Command::Ack,
        Command::Nack,
        Command::Begin,
        Command::Commit,
        Command::Abort,
        Command::Disconnect,
        Command::Message,
        Command::Receipt,
        Command::Error,
    ] {
        assert_eq!(command.as_str().parse::<Command>().expect("command"), command);
    }
}

#[test]
fn command_rejects_lowercase() {
    let err = "message".parse::<Command>().expect_err("lowercase is not a command");
    assert_eq!(err, CodecError::UnknownCommand("message".to_owned()));
}

#[test]
fn decode_message_frame_reads_headers_and_body() {
    let frame = decode_frame(&message_bytes(r#"{"boxIdentifier":"BOX-01"}"#)).expect("decode");
    assert_eq!(frame.command, Command::Message);
    assert_eq!(frame.header(HEADER_DESTINATION), Some("/topic/dashboard"));
    assert_eq!(frame.header(HEADER_SUBSCRIPTION), Some("sub-0"));
    assert_eq!(frame.body_text().expect("utf8"), r#"{"boxIdentifier":"BOX-01"}"#);
}

#[test]
fn decode_skips_leading_heartbeats_and_accepts_crlf() {
    let bytes = b"\n\r\nCONNECTED\r\nversion:1.2\r\nheart-beat:0,0\r\n\r\n\0\n";
    let frame = decode_frame(bytes).expect("decode");
    assert_eq!(frame.command, Command::Connected);
    assert_eq!(frame.header("version"), Some("1.2"));
    assert!(frame.body.is_empty());
}

#[test]
fn decode_first_repeated_header_wins() {
    let bytes = b"MESSAGE\nfoo:first\nfoo:second\n\n\0";
    let frame = decode_frame(bytes).expect("decode");
    assert_eq!(frame.header("foo"), Some("first"));
    assert_eq!(frame.headers.len(), 2);
}

#[test]
fn decode_content_length_allows_embedded_nul() {
    let bytes = b"MESSAGE\ncontent-length:5\n\nab\0cd\0";
    let frame = decode_frame(bytes).expect("decode");
    assert_eq!(frame.body, b"ab\0cd");
}

#[test]
fn decode_rejects_content_length_past_end() {
    let err = decode_frame(b"MESSAGE\ncontent-length:50\n\nabc\0").expect_err("too long");
    assert_eq!(err, CodecError::InvalidContentLength("50".to_owned()));
}

#[test]
fn decode_rejects_non_numeric_content_length() {
    let err = decode_frame(b"MESSAGE\ncontent-length:abc\n\n\0").expect_err("bad length");
    assert!(matches!(err, CodecError::InvalidContentLength(_)));
}

#[test]
fn decode_rejects_missing_nul() {
    let err = decode_frame(b"MESSAGE\ndestination:/topic/x\n\n{}").expect_err("no terminator");
    assert_eq!(err, CodecError::MissingNul);
}

#[test]
fn decode_rejects_header_without_colon() {
    let err = decode_frame(b"MESSAGE\nnot-a-header\n\n\0").expect_err("malformed");
    assert_eq!(err, CodecError::MalformedHeader("not-a-header".to_owned()));
}

#[test]
fn decode_rejects_unknown_escape() {
    let err = decode_frame(b"MESSAGE\nfoo:a\\tb\n\n\0").expect_err("bad escape");
    assert_eq!(err, CodecError::InvalidEscape('t'));
}

#[test]
fn decode_rejects_heartbeat_only_input() {
    assert_eq!(decode_frame(b"\n\n").expect_err("empty"), CodecError::Empty);
    assert_eq!(decode_frame(b"").expect_err("empty"), CodecError::Empty);
}

#[test]
fn connected_headers_are_not_unescaped() {
    let frame = decode_frame(b"CONNECTED\nserver:broker\\c1\n\n\0").expect("decode");
    assert_eq!(frame.header("server"), Some("broker\\c1"));
}

#[test]
fn encode_escapes_header_values() {
    let frame = Frame::new(Command::Send).with_header("note", "a:b\nc\\d");
    let bytes = encode_frame(&frame);
    let text = String::from_utf8(bytes.clone()).expect("utf8");
    assert!(text.contains("note:a\\cb\\nc\\\\d\n"));

    let decoded = decode_frame(&bytes).expect("decode");
    assert_eq!(decoded.header("note"), Some("a:b\nc\\d"));
}

#[test]
fn encode_connect_leaves_header_values_raw() {
    let bytes = encode_frame(&Frame::connect("localhost:8080", (0, 0)));
    let text = String::from_utf8(bytes).expect("utf8");
    assert!(text.starts_with("CONNECT\n"));
    assert!(text.contains("host:localhost:8080\n"));
    assert!(text.contains("accept-version:1.2,1.1,1.0\n"));
    assert!(text.ends_with("\n\n\0"));
}

#[test]
fn encode_adds_content_length_for_bodies() {
    let frame = Frame::new(Command::Send)
        .with_header(HEADER_DESTINATION, "/app/ping")
        .with_body("hello");
    let text = String::from_utf8(encode_frame(&frame)).expect("utf8");
    assert!(text.contains("content-length:5\n"));
    assert!(text.ends_with("\n\nhello\0"));
}

#[test]
fn encode_omits_content_length_for_empty_body() {
    let text = String::from_utf8(encode_frame(&Frame::unsubscribe("sub-3"))).expect("utf8");
    assert_eq!(text, "UNSUBSCRIBE\nid:sub-3\n\n\0");
}

#[test]
fn subscribe_frame_carries_id_and_destination() {
    let frame = Frame::subscribe("sub-1", "/topic/dashboard/o-9");
    assert_eq!(frame.command, Command::Subscribe);
    assert_eq!(frame.header(HEADER_ID), Some("sub-1"));
    assert_eq!(frame.header(HEADER_DESTINATION), Some("/topic/dashboard/o-9"));
}

#[test]
fn heartbeat_detection() {
    assert!(is_heartbeat(b"\n"));
    assert!(is_heartbeat(b"\r\n"));
    assert!(is_heartbeat(b""));
    assert!(!is_heartbeat(b"MESSAGE\n\n\0"));
}

#[test]
fn body_text_rejects_invalid_utf8() {
    let frame = Frame::new(Command::Message).with_body(vec![0xff, 0xfe]);
    assert_eq!(frame.body_text().expect_err("invalid"), CodecError::InvalidUtf8);
}

#[test]
fn error_codes_group_header_failures() {
    assert_eq!(CodecError::MalformedHeader("x".into()).error_code(), "E_FRAME_HEADER");
    assert_eq!(CodecError::InvalidEscape('t').error_code(), "E_FRAME_HEADER");
    assert_eq!(CodecError::MissingNul.error_code(), "E_FRAME_UNTERMINATED");
}
