//! Pure, stateless RESP2 encoders.
//!
//! Follows the same per-frame byte templates as `RespType::to_bytes` in
//! a RESP-based server this crate's codec grew out of, and the same
//! concatenate-already-encoded-frames shape used by array encoders in
//! other RESP codecs.

use bytes::{BufMut, Bytes, BytesMut};

/// `:<decimal>\r\n`
pub fn encode_integer(value: i64) -> Bytes {
    let mut buf = BytesMut::with_capacity(24);
    buf.put_u8(b':');
    buf.extend_from_slice(value.to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.freeze()
}

/// `+<payload>\r\n`. The caller is responsible for `payload` not
/// containing an embedded CRLF.
pub fn encode_simple_string(payload: &[u8]) -> Bytes {
    frame_with_prefix(b'+', payload)
}

/// `-<payload>\r\n`. The caller is responsible for `payload` not
/// containing an embedded CRLF.
pub fn encode_error(payload: &[u8]) -> Bytes {
    frame_with_prefix(b'-', payload)
}

/// `$<len(payload)>\r\n<payload>\r\n`
pub fn encode_bulk_string(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + 16);
    buf.put_u8(b'$');
    buf.extend_from_slice(payload.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(payload);
    buf.extend_from_slice(b"\r\n");
    buf.freeze()
}

/// `$-1\r\n`
pub fn encode_null_bulk() -> Bytes {
    Bytes::from_static(b"$-1\r\n")
}

/// `*-1\r\n`
pub fn encode_null_array() -> Bytes {
    Bytes::from_static(b"*-1\r\n")
}

/// `*<count>\r\n` followed by the concatenation of `frames`, in order.
/// Each element of `frames` must already be a complete, encoded RESP
/// frame (as produced by the other `encode_*` functions).
pub fn encode_array<I>(frames: I) -> Bytes
where
    I: IntoIterator<Item = Bytes>,
{
    let frames: Vec<Bytes> = frames.into_iter().collect();
    let mut buf = BytesMut::with_capacity(frames.iter().map(Bytes::len).sum::<usize>() + 16);
    buf.put_u8(b'*');
    buf.extend_from_slice(frames.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    for frame in frames {
        buf.extend_from_slice(&frame);
    }
    buf.freeze()
}

/// The canonical client-to-server command framing: an array of bulk
/// strings, one per argument.
pub fn build_command<I, B>(args: I) -> Bytes
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    encode_array(args.into_iter().map(|a| encode_bulk_string(a.as_ref())))
}

fn frame_with_prefix(prefix: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + 3);
    buf.put_u8(prefix);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(b"\r\n");
    buf.freeze()
}
