//! The RESP reply value model.

use bytes::Bytes;

use crate::error::ReplyError;

/// A single fully-materialized RESP2 reply.
///
/// Every variant owns its payload (`Bytes`/`String`/`Vec`), so a `Reply`
/// never borrows from the `Reader`'s internal buffer and stays valid
/// across buffer compaction.
///
/// Note the deliberate asymmetry between [`Reply::BulkString`] and
/// [`Reply::Text`]: a bulk string is raw bytes unless the `Reader` was
/// configured with an [`crate::Encoding`], and an inline command's tokens
/// are *always* text. That split is carried over verbatim from the wire
/// protocol this models and is not "fixed" here.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A `:`-prefixed signed 64-bit integer.
    Integer(i64),
    /// A `+`-prefixed status line.
    SimpleString(Bytes),
    /// A `$`-prefixed payload, delivered as raw bytes.
    BulkString(Bytes),
    /// A decoded text payload: either a bulk string parsed under a
    /// configured encoding, or an inline-command token.
    Text(String),
    /// The `$-1\r\n` sentinel. Distinct from `BulkString(Bytes::new())`.
    BulkNull,
    /// A `*`-prefixed sequence of replies, in wire order.
    Array(Vec<Reply>),
    /// The `*-1\r\n` sentinel. Distinct from `Array(vec![])`.
    ArrayNull,
    /// A `-`-prefixed error, materialized through the bound reply-error
    /// factory. May appear at top level or nested inside an `Array`.
    Error(ReplyError),
}

impl Reply {
    /// Convenience constructor for a raw bulk string.
    pub fn bulk(data: impl Into<Bytes>) -> Reply {
        Reply::BulkString(data.into())
    }

    /// Convenience constructor for a simple string.
    pub fn simple(data: impl Into<Bytes>) -> Reply {
        Reply::SimpleString(data.into())
    }

    /// `true` for [`Reply::BulkNull`] or [`Reply::ArrayNull`].
    pub fn is_null(&self) -> bool {
        matches!(self, Reply::BulkNull | Reply::ArrayNull)
    }
}

impl PartialEq for Reply {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Reply::Integer(a), Reply::Integer(b)) => a == b,
            (Reply::SimpleString(a), Reply::SimpleString(b)) => a == b,
            (Reply::BulkString(a), Reply::BulkString(b)) => a == b,
            (Reply::Text(a), Reply::Text(b)) => a == b,
            (Reply::BulkNull, Reply::BulkNull) => true,
            (Reply::Array(a), Reply::Array(b)) => a == b,
            (Reply::ArrayNull, Reply::ArrayNull) => true,
            (Reply::Error(a), Reply::Error(b)) => a.payload() == b.payload(),
            _ => false,
        }
    }
}
