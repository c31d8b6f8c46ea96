//! Error kinds and the pluggable error-factory binding.
//!
//! Follows the same hand-rolled-enum style as `RespError`/`DBError` in
//! the server this codec grew out of: a plain enum, a manual `Display`
//! impl, and `std::error::Error` via a blanket impl. No `thiserror`.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// Everything that can go wrong while feeding bytes to, or reading
/// replies from, a [`crate::Reader`].
#[derive(Debug)]
pub enum CodecError {
    /// `feed_range`'s `offset`/`length` window fell outside the data
    /// slice it was given.
    RangeInvalid { offset: usize, length: usize, data_len: usize },
    /// The byte stream violated RESP framing.
    Protocol(ProtocolError),
    /// A bulk string could not be decoded under the configured
    /// [`crate::Encoding`]. Surfaced unstructured, per the source
    /// protocol's own lack of a recovery path for this case.
    Encoding(std::str::Utf8Error),
    /// The reader already raised a `Protocol` error; its internal state
    /// is no longer self-synchronizing and it must be discarded.
    Poisoned,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::RangeInvalid { offset, length, data_len } => write!(
                f,
                "feed window out of range: offset {offset} + length {length} exceeds {data_len} bytes"
            ),
            CodecError::Protocol(e) => e.fmt(f),
            CodecError::Encoding(e) => write!(f, "bulk string is not valid text: {e}"),
            CodecError::Poisoned => {
                "reader is poisoned by a prior protocol error and must be discarded".fmt(f)
            }
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Protocol(e) => Some(e),
            CodecError::Encoding(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProtocolError> for CodecError {
    fn from(e: ProtocolError) -> Self {
        CodecError::Protocol(e)
    }
}

/// A RESP framing violation: bad type prefix, non-numeric length, a
/// missing trailing CRLF, an out-of-range integer, or (optionally) a
/// buffer that grew past a caller-configured cap.
#[derive(Debug, Clone)]
pub struct ProtocolError {
    message: String,
    payload: Option<Bytes>,
}

impl ProtocolError {
    pub fn new(message: impl Into<String>) -> ProtocolError {
        ProtocolError { message: message.into(), payload: None }
    }

    pub fn with_payload(message: impl Into<String>, payload: Bytes) -> ProtocolError {
        ProtocolError { message: message.into(), payload: Some(payload) }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol error: {}", self.message)
    }
}

impl std::error::Error for ProtocolError {}

/// The value materialized from a `-error\r\n` frame.
///
/// Unlike [`ProtocolError`], this is never raised as an `Err` from this
/// crate's own functions — it is a reply *value*, carried inside
/// [`crate::Reply::Error`]. It implements [`std::error::Error`] purely so
/// a caller that wants to treat it as one downstream is free to.
#[derive(Debug, Clone)]
pub struct ReplyError {
    payload: Bytes,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ReplyError {
    pub fn new(payload: Bytes) -> ReplyError {
        ReplyError { payload, source: None }
    }

    /// Build a `ReplyError` that also carries an opaque cause, for
    /// callers whose custom reply-error factory wants to wrap a richer
    /// error type without this crate needing to know its shape.
    pub fn wrapping(
        payload: Bytes,
        source: Arc<dyn std::error::Error + Send + Sync>,
    ) -> ReplyError {
        ReplyError { payload, source: Some(source) }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        String::from_utf8_lossy(&self.payload).fmt(f)
    }
}

impl std::error::Error for ReplyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// A caller-pluggable policy for turning a raw error payload into a
/// value of type `E`.
///
/// The source protocol lets a caller supply either a constructible
/// error type or an arbitrary single-argument callable, validated at
/// construction time. In Rust both forms collapse into "a function
/// from payload to value" — a closure — and the compiler rejects
/// anything else before the program even runs, so there's no runtime
/// "is this a valid factory" check to perform.
#[derive(Clone)]
pub enum ErrorFactory<E> {
    /// Use the crate's own constructor for `E`.
    BuiltIn,
    /// Use a caller-supplied closure.
    Custom(Arc<dyn Fn(Bytes) -> E + Send + Sync>),
}

impl<E> ErrorFactory<E> {
    pub fn custom(f: impl Fn(Bytes) -> E + Send + Sync + 'static) -> ErrorFactory<E> {
        ErrorFactory::Custom(Arc::new(f))
    }
}

impl<E> fmt::Debug for ErrorFactory<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorFactory::BuiltIn => f.write_str("ErrorFactory::BuiltIn"),
            ErrorFactory::Custom(_) => f.write_str("ErrorFactory::Custom(..)"),
        }
    }
}

impl ErrorFactory<ProtocolError> {
    pub(crate) fn apply(&self, payload: Bytes) -> ProtocolError {
        match self {
            ErrorFactory::BuiltIn => ProtocolError::with_payload(
                String::from_utf8_lossy(&payload).into_owned(),
                payload,
            ),
            ErrorFactory::Custom(f) => f(payload),
        }
    }
}

impl ErrorFactory<ReplyError> {
    pub(crate) fn apply(&self, payload: Bytes) -> ReplyError {
        match self {
            ErrorFactory::BuiltIn => ReplyError::new(payload),
            ErrorFactory::Custom(f) => f(payload),
        }
    }
}

impl Default for ErrorFactory<ProtocolError> {
    fn default() -> Self {
        ErrorFactory::BuiltIn
    }
}

impl Default for ErrorFactory<ReplyError> {
    fn default() -> Self {
        ErrorFactory::BuiltIn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_reply_error_carries_payload() {
        let factory: ErrorFactory<ReplyError> = ErrorFactory::default();
        let err = factory.apply(Bytes::from_static(b"ERR boom"));
        assert_eq!(err.payload(), &Bytes::from_static(b"ERR boom"));
        assert_eq!(err.to_string(), "ERR boom");
    }

    #[test]
    fn custom_reply_error_factory_is_used_verbatim() {
        let factory: ErrorFactory<ReplyError> =
            ErrorFactory::custom(|payload| ReplyError::new(Bytes::from(format!("wrapped: {}", String::from_utf8_lossy(&payload)))));
        let err = factory.apply(Bytes::from_static(b"oops"));
        assert_eq!(err.payload(), &Bytes::from_static(b"wrapped: oops"));
    }

    #[test]
    fn custom_protocol_error_factory_is_used_verbatim() {
        let factory: ErrorFactory<ProtocolError> = ErrorFactory::custom(|payload| {
            ProtocolError::with_payload(
                format!("custom: {}", String::from_utf8_lossy(&payload)),
                payload,
            )
        });
        let err = factory.apply(Bytes::from_static(b"x"));
        assert_eq!(err.message(), "custom: x");
    }
}
