//! Unit tests for newline framing.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use aterm::wire::{LineBuffer, LineCodec};
use aterm::AppError;

// ── Decoder ─────────────────────────────────────────────────────────────────

/// A complete line is returned without its terminator.
#[test]
fn single_line_decodes_without_newline() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("{\"id\":\"0\",\"result\":1}\n");

    let line = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(line.as_deref(), Some("{\"id\":\"0\",\"result\":1}"));
    assert!(buf.is_empty());
}

/// Two lines in one buffer come out as two items, in order.
#[test]
fn merged_lines_are_split() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("first\nsecond\n");

    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("first"));
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("second"));
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
}

/// A fragment is held back until its newline arrives.
#[test]
fn partial_line_waits_for_newline() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("{\"id\":");

    assert_eq!(codec.decode(&mut buf).unwrap(), None);

    buf.extend_from_slice(b"\"1\"}\n");
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"id\":\"1\"}"));
}

/// Empty lines are yielded as empty strings; filtering is the caller's job.
#[test]
fn empty_line_is_yielded() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("\n");

    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some(""));
}

/// Invalid UTF-8 never fails the stream.
#[test]
fn invalid_utf8_is_decoded_lossily() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from(&b"ab\xffcd\n"[..]);

    let line = codec.decode(&mut buf).unwrap().unwrap();

    assert_eq!(line, "ab\u{fffd}cd");
}

/// The trailing fragment is flushed as a final line at EOF.
#[test]
fn trailing_fragment_is_yielded_at_eof() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("done\ntail");

    assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("done"));
    assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("tail"));
    assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
}

// ── Encoder ─────────────────────────────────────────────────────────────────

/// Outbound items get exactly one terminator.
#[test]
fn encoder_appends_newline() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::new();

    codec.encode("{}".to_owned(), &mut buf).unwrap();

    assert_eq!(&buf[..], b"{}\n");
}

/// An item with an embedded newline would split on the peer and is refused.
#[test]
fn encoder_refuses_embedded_newline() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::new();

    let err = codec.encode("a\nb".to_owned(), &mut buf).unwrap_err();

    assert!(matches!(err, AppError::Fatal(_)));
    assert!(buf.is_empty());
}

// ── LineBuffer ──────────────────────────────────────────────────────────────

/// Chunk boundaries do not affect the lines produced.
#[test]
fn line_buffer_reassembles_arbitrary_chunks() {
    let mut buffer = LineBuffer::new();
    let mut lines = Vec::new();

    for chunk in [&b"al"[..], b"pha\nbe", b"ta", b"\ngam", b"ma\n"] {
        lines.extend(buffer.feed(chunk));
    }

    assert_eq!(lines, ["alpha", "beta", "gamma"]);
    assert!(buffer.remainder().is_empty());
}

/// Between feeds only a newline-free fragment is retained.
#[test]
fn line_buffer_keeps_only_unterminated_remainder() {
    let mut buffer = LineBuffer::new();

    let lines = buffer.feed(b"one\ntwo\nthr");

    assert_eq!(lines, ["one", "two"]);
    assert_eq!(buffer.remainder(), b"thr");
}
