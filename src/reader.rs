//! The public codec facade: [`Reader`].
//!
//! Generalizes `RespCommandFrame`'s approach (a growing buffer, a
//! cursor-like `advance` pattern, and a `CommandBuilder`) into a
//! transport-agnostic type. Unlike that codec, `Reader` is not a
//! `tokio_util::codec::Decoder`: this crate performs no I/O and isn't
//! tied to any particular transport, so there is nothing here for a
//! `Decoder` impl to decorate.

use std::collections::VecDeque;

use bytes::BytesMut;
use log::warn;

use crate::error::{CodecError, ErrorFactory, ProtocolError, ReplyError};
use crate::parser::Parser;
use crate::value::Reply;

/// The one named text encoding this crate knows how to apply to bulk
/// string payloads. Only UTF-8 is supported, so this is a closed enum
/// rather than a runtime string lookup that could silently accept a
/// name nothing implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
}

/// Construction-time options for a [`Reader`].
pub struct ReaderOptions {
    pub protocol_error_factory: ErrorFactory<ProtocolError>,
    pub reply_error_factory: ErrorFactory<ReplyError>,
    pub encoding: Option<Encoding>,
    pub accept_inline: bool,
    /// Optional hard cap, in bytes, on the internal buffer. `feed`/
    /// `feed_range` raise [`CodecError::Protocol`] rather than growing
    /// past it. `None` means unbounded (the default).
    pub max_buffer_len: Option<usize>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            protocol_error_factory: ErrorFactory::default(),
            reply_error_factory: ErrorFactory::default(),
            encoding: None,
            accept_inline: false,
            max_buffer_len: None,
        }
    }
}

/// An incremental, resumable RESP2 reader.
///
/// A `Reader` is single-owner, not internally synchronized: `feed` and
/// `gets` are plain synchronous calls with no I/O and no suspension
/// points, and the caller is responsible for arranging any concurrency
/// around it (e.g. one task owns the `Reader` and shuttles bytes into
/// it from a socket-reading task).
pub struct Reader {
    buffer: BytesMut,
    cursor: usize,
    parser: Parser,
    protocol_error_factory: ErrorFactory<ProtocolError>,
    reply_error_factory: ErrorFactory<ReplyError>,
    encoding: Option<Encoding>,
    /// Mutable per the external interface: callers may flip this at any
    /// point between `gets` calls.
    pub accept_inline: bool,
    max_buffer_len: Option<usize>,
    reply_queue: VecDeque<Reply>,
    poisoned: bool,
}

impl Reader {
    /// Construct a `Reader` with the given options.
    pub fn new(options: ReaderOptions) -> Reader {
        Reader {
            buffer: BytesMut::new(),
            cursor: 0,
            parser: Parser::new(),
            protocol_error_factory: options.protocol_error_factory,
            reply_error_factory: options.reply_error_factory,
            encoding: options.encoding,
            accept_inline: options.accept_inline,
            max_buffer_len: options.max_buffer_len,
            reply_queue: VecDeque::new(),
            poisoned: false,
        }
    }

    /// A `Reader` with every option at its default (raw bytes, no
    /// inline commands, no buffer cap, built-in error types).
    pub fn with_defaults() -> Reader {
        Reader::new(ReaderOptions::default())
    }

    /// `true` once a [`CodecError::Protocol`] has been raised from this
    /// reader. Further calls return [`CodecError::Poisoned`] instead of
    /// attempting to resynchronize on a stream that's no longer
    /// self-describing.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Append all of `data` to the internal buffer. Does not advance
    /// the read cursor and does not attempt to parse anything.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), CodecError> {
        self.feed_range(data, 0, data.len())
    }

    /// Append `data[offset..offset + length]` to the internal buffer.
    ///
    /// Only the requested window is copied into the buffer; the rest of
    /// `data` is never touched. Fails with [`CodecError::RangeInvalid`]
    /// if the window falls outside `data`, and with
    /// [`CodecError::Protocol`] if accepting it would exceed
    /// `max_buffer_len`.
    pub fn feed_range(
        &mut self,
        data: &[u8],
        offset: usize,
        length: usize,
    ) -> Result<(), CodecError> {
        if self.poisoned {
            return Err(CodecError::Poisoned);
        }

        let end = offset
            .checked_add(length)
            .filter(|&end| offset <= data.len() && end <= data.len());
        let Some(end) = end else {
            return Err(CodecError::RangeInvalid {
                offset,
                length,
                data_len: data.len(),
            });
        };

        if let Some(max) = self.max_buffer_len {
            if self.buffer.len() + length > max {
                let err = self.protocol_error_factory.apply(bytes::Bytes::from_static(
                    b"buffer limit exceeded",
                ));
                self.poisoned = true;
                return Err(err.into());
            }
        }

        self.buffer.extend_from_slice(&data[offset..end]);
        Ok(())
    }

    /// Return the next completed top-level reply, or `Ok(None)` meaning
    /// "need more bytes". Never blocks, never performs I/O.
    ///
    /// Once this returns `Err(CodecError::Protocol(_))`, the reader is
    /// poisoned (see [`Reader::is_poisoned`]) and every subsequent call
    /// returns `Err(CodecError::Poisoned)`.
    pub fn gets(&mut self) -> Result<Option<Reply>, CodecError> {
        if self.poisoned {
            return Err(CodecError::Poisoned);
        }

        if let Some(reply) = self.reply_queue.pop_front() {
            return Ok(Some(reply));
        }

        match self.parser.parse_one(
            &self.buffer,
            &mut self.cursor,
            self.encoding,
            self.accept_inline,
            &self.protocol_error_factory,
            &self.reply_error_factory,
        ) {
            Ok(Some(reply)) => {
                self.compact();
                Ok(Some(reply))
            }
            Ok(None) => Ok(None),
            Err(CodecError::Protocol(e)) => {
                self.poisoned = true;
                warn!("RESP protocol error, reader poisoned: {e}");
                Err(CodecError::Protocol(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the already-consumed prefix of the buffer when it's safe to
    /// do so: only between top-level frames, and only once the
    /// consumed prefix is at least half the buffer (so this doesn't
    /// thrash on a steady trickle of small frames).
    fn compact(&mut self) {
        if self.cursor == 0 || !self.parser.at_frame_boundary() {
            return;
        }
        if self.cursor * 2 < self.buffer.len() {
            return;
        }
        let _ = self.buffer.split_to(self.cursor);
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Reply;
    use bytes::Bytes;
    use std::sync::Arc;

    #[test]
    fn empty_reader_has_no_reply() {
        let mut reader = Reader::with_defaults();
        assert_eq!(reader.gets().unwrap(), None);
    }

    #[test]
    fn feeds_and_reads_a_status_string() {
        let mut reader = Reader::with_defaults();
        reader.feed(b"+ok\r\n").unwrap();
        assert_eq!(reader.gets().unwrap(), Some(Reply::SimpleString(Bytes::from_static(b"ok"))));
    }

    #[test]
    fn feeds_largest_i64() {
        let mut reader = Reader::with_defaults();
        reader.feed(b":9223372036854775807\r\n").unwrap();
        assert_eq!(reader.gets().unwrap(), Some(Reply::Integer(i64::MAX)));
    }

    #[test]
    fn empty_bulk_string_round_trips() {
        let mut reader = Reader::with_defaults();
        reader.feed(b"$0\r\n\r\n").unwrap();
        assert_eq!(reader.gets().unwrap(), Some(Reply::BulkString(Bytes::new())));
    }

    #[test]
    fn flat_array_of_bulk_strings() {
        let mut reader = Reader::with_defaults();
        reader.feed(b"*2\r\n$5\r\nhello\r\n$5\r\nworld\r\n").unwrap();
        assert_eq!(
            reader.gets().unwrap(),
            Some(Reply::Array(vec![Reply::bulk(&b"hello"[..]), Reply::bulk(&b"world"[..])]))
        );
    }

    #[test]
    fn deeply_nested_arrays() {
        let mut reader = Reader::with_defaults();
        reader.feed(b"*1\r\n*1\r\n*1\r\n*1\r\n$1\r\n!\r\n").unwrap();
        let got = reader.gets().unwrap().unwrap();
        let expected = Reply::Array(vec![Reply::Array(vec![Reply::Array(vec![Reply::Array(
            vec![Reply::bulk(&b"!"[..])],
        )])])]);
        assert_eq!(got, expected);
    }

    #[test]
    fn errors_in_nested_array_are_values() {
        let mut reader = Reader::with_defaults();
        reader.feed(b"*2\r\n-err0\r\n-err1\r\n").unwrap();
        let got = reader.gets().unwrap().unwrap();
        match got {
            Reply::Array(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(&items[0], Reply::Error(e) if e.payload() == &Bytes::from_static(b"err0")));
                assert!(matches!(&items[1], Reply::Error(e) if e.payload() == &Bytes::from_static(b"err1")));
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn unknown_prefix_raises_and_poisons() {
        let mut reader = Reader::with_defaults();
        reader.feed(b"x\r\n").unwrap();
        assert!(reader.gets().is_err());
        assert!(reader.is_poisoned());
        assert!(matches!(reader.gets(), Err(CodecError::Poisoned)));
    }

    #[test]
    fn offset_only_feed() {
        let mut reader = Reader::with_defaults();
        let data = b"blah+ok\r\n";
        reader.feed_range(data, 4, data.len() - 4).unwrap();
        assert_eq!(reader.gets().unwrap(), Some(Reply::SimpleString(Bytes::from_static(b"ok"))));
    }

    #[test]
    fn offset_and_length_feed() {
        let mut reader = Reader::with_defaults();
        let data = b"blah+ok\r\n";
        reader.feed_range(data, 4, data.len() - 4).unwrap();
        assert_eq!(reader.gets().unwrap(), Some(Reply::SimpleString(Bytes::from_static(b"ok"))));
    }

    #[test]
    fn invalid_offset_is_range_invalid() {
        let mut reader = Reader::with_defaults();
        let data = b"+ok\r\n";
        assert!(matches!(
            reader.feed_range(data, 6, 0),
            Err(CodecError::RangeInvalid { .. })
        ));
    }

    #[test]
    fn invalid_length_is_range_invalid() {
        let mut reader = Reader::with_defaults();
        let data = b"+ok\r\n";
        assert!(matches!(
            reader.feed_range(data, 0, 6),
            Err(CodecError::RangeInvalid { .. })
        ));
    }

    #[test]
    fn split_feed_resumes_a_partial_bulk_string() {
        let mut reader = Reader::with_defaults();
        reader.feed(b"$5\r\nhel").unwrap();
        assert_eq!(reader.gets().unwrap(), None);
        reader.feed(b"lo\r\n").unwrap();
        assert_eq!(reader.gets().unwrap(), Some(Reply::bulk(&b"hello"[..])));
    }

    #[test]
    fn cursor_savepoint_is_observable_across_calls() {
        // P3: a `gets` returning no-reply, followed by feeding the rest,
        // yields exactly the reply that was pending — the reader isn't
        // left in some other state by the aborted attempt.
        let mut reader = Reader::with_defaults();
        reader.feed(b"*2\r\n$5\r\nhello\r\n").unwrap();
        assert_eq!(reader.gets().unwrap(), None);
        assert_eq!(reader.gets().unwrap(), None);
        reader.feed(b"$5\r\nworld\r\n").unwrap();
        assert_eq!(
            reader.gets().unwrap(),
            Some(Reply::Array(vec![Reply::bulk(&b"hello"[..]), Reply::bulk(&b"world"[..])]))
        );
    }

    #[test]
    fn inline_ping_when_enabled() {
        let mut reader = Reader::new(ReaderOptions { accept_inline: true, ..ReaderOptions::default() });
        reader.feed(b"set key value\r\n").unwrap();
        assert_eq!(
            reader.gets().unwrap(),
            Some(Reply::Array(vec![
                Reply::Text("set".into()),
                Reply::Text("key".into()),
                Reply::Text("value".into()),
            ]))
        );
    }

    #[test]
    fn inline_pipeline_preserves_order() {
        let mut reader = Reader::new(ReaderOptions { accept_inline: true, ..ReaderOptions::default() });
        reader.feed(b"ping\r\n").unwrap();
        reader.feed(b"set key value\r\n").unwrap();
        assert_eq!(
            reader.gets().unwrap(),
            Some(Reply::Array(vec![Reply::Text("ping".into())]))
        );
        assert_eq!(
            reader.gets().unwrap(),
            Some(Reply::Array(vec![
                Reply::Text("set".into()),
                Reply::Text("key".into()),
                Reply::Text("value".into()),
            ]))
        );
    }

    #[test]
    fn bulk_string_with_utf8_encoding_decodes_to_text() {
        let mut reader = Reader::new(ReaderOptions {
            encoding: Some(Encoding::Utf8),
            ..ReaderOptions::default()
        });
        let snowman = "\u{2603}".as_bytes().to_vec();
        let mut frame = format!("${}\r\n", snowman.len()).into_bytes();
        frame.extend_from_slice(&snowman);
        frame.extend_from_slice(b"\r\n");
        reader.feed(&frame).unwrap();
        assert_eq!(reader.gets().unwrap(), Some(Reply::Text("\u{2603}".to_string())));
    }

    #[test]
    fn bulk_string_without_encoding_stays_raw_bytes() {
        let mut reader = Reader::with_defaults();
        let snowman = "\u{2603}".as_bytes().to_vec();
        let mut frame = format!("${}\r\n", snowman.len()).into_bytes();
        frame.extend_from_slice(&snowman);
        frame.extend_from_slice(b"\r\n");
        reader.feed(&frame).unwrap();
        assert_eq!(reader.gets().unwrap(), Some(Reply::BulkString(Bytes::from(snowman))));
    }

    #[test]
    fn custom_protocol_error_factory_is_invoked() {
        let mut reader = Reader::new(ReaderOptions {
            protocol_error_factory: ErrorFactory::custom(|payload| {
                ProtocolError::with_payload(
                    format!("custom: {}", String::from_utf8_lossy(&payload)),
                    payload,
                )
            }),
            ..ReaderOptions::default()
        });
        reader.feed(b"x\r\n").unwrap();
        match reader.gets() {
            Err(CodecError::Protocol(e)) => assert!(e.message().starts_with("custom:")),
            other => panic!("expected a custom protocol error, got {other:?}"),
        }
    }

    #[test]
    fn custom_reply_error_factory_is_invoked() {
        let mut reader = Reader::new(ReaderOptions {
            reply_error_factory: ErrorFactory::custom(|payload| {
                ReplyError::wrapping(payload, Arc::new(std::fmt::Error))
            }),
            ..ReaderOptions::default()
        });
        reader.feed(b"-error\r\n").unwrap();
        match reader.gets().unwrap() {
            Some(Reply::Error(e)) => {
                assert_eq!(e.payload(), &Bytes::from_static(b"error"));
                assert!(std::error::Error::source(&e).is_some());
            }
            other => panic!("expected a reply error, got {other:?}"),
        }
    }

    #[test]
    fn max_buffer_len_raises_protocol_error() {
        let mut reader = Reader::new(ReaderOptions {
            max_buffer_len: Some(4),
            ..ReaderOptions::default()
        });
        assert!(reader.feed(b"abcdefgh").is_err());
        assert!(reader.is_poisoned());
    }

    #[test]
    fn buffer_compacts_once_half_consumed_at_a_frame_boundary() {
        let mut reader = Reader::with_defaults();
        reader.feed(b"+a\r\n+b\r\n").unwrap();
        assert_eq!(reader.gets().unwrap(), Some(Reply::SimpleString(Bytes::from_static(b"a"))));
        // cursor (4) is half of buffer.len() (8): compaction should have
        // reset cursor and dropped the consumed prefix.
        assert_eq!(reader.cursor, 0);
        assert_eq!(reader.gets().unwrap(), Some(Reply::SimpleString(Bytes::from_static(b"b"))));
    }
}
