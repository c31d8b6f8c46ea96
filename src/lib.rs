//! A streaming RESP2 codec: an incremental, resumable parser
//! ([`Reader`]) paired with a set of pure encoders ([`encode`]).
//!
//! This crate performs no I/O and owns no transport. A caller reads
//! bytes from wherever they come from (a socket, a pipe, a test
//! fixture) and hands them to [`Reader::feed`]/[`Reader::feed_range`],
//! then drains fully-formed replies with [`Reader::gets`] until it
//! returns `Ok(None)`.

mod encode;
mod error;
mod parser;
mod reader;
mod value;

pub use encode::{
    build_command, encode_array, encode_bulk_string, encode_error, encode_integer,
    encode_null_array, encode_null_bulk, encode_simple_string,
};
pub use error::{CodecError, ErrorFactory, ProtocolError, ReplyError};
pub use reader::{Encoding, Reader, ReaderOptions};
pub use value::Reply;
