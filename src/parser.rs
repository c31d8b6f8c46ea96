//! The incremental, resumable RESP frame parser.
//!
//! This generalizes `CommandBuilder`'s approach, which accumulated
//! exactly one flat array of bulk strings, into a
//! `Vec<PendingArray>` stack that tolerates arrays nested to any depth
//! without native recursion — so a suspension inside element `k` of an
//! `n`-element array resumes at element `k` on the next `feed`, without
//! reparsing elements `< k`, and a pathological peer can't blow the call
//! stack with deeply nested array headers.

use bytes::Bytes;

use crate::error::{CodecError, ErrorFactory, ProtocolError, ReplyError};
use crate::reader::Encoding;
use crate::value::Reply;

/// One array still waiting on `remaining` more elements.
struct PendingArray {
    remaining: usize,
    elements: Vec<Reply>,
}

/// Holds the nested-array resumption state across `parse_one` calls.
/// Everything else `parse_one` needs (the buffer, the cursor, the bound
/// options) is passed in by the caller (`Reader`), which owns it.
#[derive(Default)]
pub(crate) struct Parser {
    pending_stack: Vec<PendingArray>,
}

/// What a single atomic-frame attempt produced.
enum AtomStep {
    /// A fully-formed value, ready to be folded into whatever array (if
    /// any) is waiting for it.
    Value(Reply),
    /// An array header naming how many elements follow; `parse_one`
    /// pushes a new [`PendingArray`] and loops to parse the first one.
    ArrayHeader(usize),
}

impl Parser {
    pub fn new() -> Parser {
        Parser { pending_stack: Vec::new() }
    }

    /// `true` between top-level frames (Invariant 2 of the data model).
    pub fn at_frame_boundary(&self) -> bool {
        self.pending_stack.is_empty()
    }

    /// Attempt to parse exactly one top-level reply out of `buf`,
    /// starting at `*cursor`.
    ///
    /// On success, `*cursor` is advanced past the consumed bytes and
    /// `Ok(Some(reply))` is returned. On insufficient input, `*cursor`
    /// is left exactly where it was on entry to *this* atomic attempt
    /// (not necessarily where it was at the start of the whole
    /// top-level frame — see the module docs) and `Ok(None)` is
    /// returned. On a framing violation, `Err` is returned and the
    /// caller is expected to poison the reader.
    pub fn parse_one(
        &mut self,
        buf: &[u8],
        cursor: &mut usize,
        encoding: Option<Encoding>,
        accept_inline: bool,
        protocol_error_factory: &ErrorFactory<ProtocolError>,
        reply_error_factory: &ErrorFactory<ReplyError>,
    ) -> Result<Option<Reply>, CodecError> {
        loop {
            let atom_start = *cursor;
            let step = parse_atom(
                &buf[atom_start..],
                encoding,
                accept_inline,
                protocol_error_factory,
                reply_error_factory,
            )?;

            let mut value = match step {
                None => {
                    *cursor = atom_start;
                    return Ok(None);
                }
                Some((AtomStep::ArrayHeader(n), consumed)) => {
                    *cursor = atom_start + consumed;
                    self.pending_stack.push(PendingArray {
                        remaining: n,
                        elements: Vec::with_capacity(n.min(4096)),
                    });
                    continue;
                }
                Some((AtomStep::Value(v), consumed)) => {
                    *cursor = atom_start + consumed;
                    v
                }
            };

            // Fold `value` into the innermost pending array, possibly
            // completing it (and its parent, and its parent's parent...).
            loop {
                match self.pending_stack.last_mut() {
                    None => return Ok(Some(value)),
                    Some(parent) => {
                        parent.elements.push(value);
                        parent.remaining -= 1;
                        if parent.remaining > 0 {
                            break; // parse the next sibling element
                        }
                        let done = self.pending_stack.pop().expect("just matched Some");
                        value = Reply::Array(done.elements);
                        // loop: this completed array may itself be an
                        // element of a further-out pending array.
                    }
                }
            }
        }
    }
}

/// Locate the next CRLF starting at the beginning of `data`. Returns the
/// index of the `\r`. Never mutates; never looks behind `data[0]`.
fn find_crlf(data: &[u8]) -> Option<usize> {
    if data.len() < 2 {
        return None;
    }
    data.windows(2).position(|w| w == b"\r\n")
}

/// Read a full line (not including the CRLF) starting at `data[0]`.
/// Returns the line and the total number of bytes consumed, including
/// the CRLF.
fn read_line(data: &[u8]) -> Option<(&[u8], usize)> {
    find_crlf(data).map(|i| (&data[..i], i + 2))
}

fn parse_atom(
    data: &[u8],
    encoding: Option<Encoding>,
    accept_inline: bool,
    protocol_error_factory: &ErrorFactory<ProtocolError>,
    reply_error_factory: &ErrorFactory<ReplyError>,
) -> Result<Option<(AtomStep, usize)>, CodecError> {
    let prefix = match data.first() {
        Some(b) => *b,
        None => return Ok(None),
    };

    match prefix {
        b'+' => match read_line(&data[1..]) {
            None => Ok(None),
            Some((payload, used)) => Ok(Some((
                AtomStep::Value(Reply::SimpleString(Bytes::copy_from_slice(payload))),
                used + 1,
            ))),
        },
        b'-' => match read_line(&data[1..]) {
            None => Ok(None),
            Some((payload, used)) => {
                let error = reply_error_factory.apply(Bytes::copy_from_slice(payload));
                Ok(Some((AtomStep::Value(Reply::Error(error)), used + 1)))
            }
        },
        b':' => match read_line(&data[1..]) {
            None => Ok(None),
            Some((payload, used)) => {
                let n = parse_strict_i64(payload).ok_or_else(|| {
                    protocol_error_factory.apply(Bytes::copy_from_slice(payload))
                })?;
                Ok(Some((AtomStep::Value(Reply::Integer(n)), used + 1)))
            }
        },
        b'$' => match parse_bulk_string(&data[1..], encoding, protocol_error_factory)? {
            None => Ok(None),
            Some((step, used)) => Ok(Some((step, used + 1))),
        },
        b'*' => match parse_array_header(&data[1..], protocol_error_factory)? {
            None => Ok(None),
            Some((step, used)) => Ok(Some((step, used + 1))),
        },
        _ if accept_inline => {
            parse_inline(data, protocol_error_factory).map(|opt| opt.map(|(r, used)| (AtomStep::Value(r), used)))
        }
        _ => Err(protocol_error_factory
            .apply(Bytes::copy_from_slice(&data[..data.len().min(32)]))
            .into()),
    }
}

fn parse_bulk_string(
    data: &[u8],
    encoding: Option<Encoding>,
    protocol_error_factory: &ErrorFactory<ProtocolError>,
) -> Result<Option<(AtomStep, usize)>, CodecError> {
    let (len_line, len_used) = match read_line(data) {
        Some(v) => v,
        None => return Ok(None),
    };
    let n = parse_strict_i64(len_line)
        .ok_or_else(|| protocol_error_factory.apply(Bytes::copy_from_slice(len_line)))?;

    if n == -1 {
        return Ok(Some((AtomStep::Value(Reply::BulkNull), len_used)));
    }
    if n < 0 {
        return Err(protocol_error_factory
            .apply(Bytes::copy_from_slice(len_line))
            .into());
    }

    let n = n as usize;
    let total_needed = len_used
        .checked_add(n)
        .and_then(|v| v.checked_add(2))
        .ok_or_else(|| protocol_error_factory.apply(Bytes::copy_from_slice(len_line)))?;

    if data.len() < total_needed {
        return Ok(None);
    }

    let payload = &data[len_used..len_used + n];
    if &data[len_used + n..total_needed] != b"\r\n" {
        return Err(protocol_error_factory
            .apply(Bytes::copy_from_slice(payload))
            .into());
    }

    let value = match encoding {
        Some(Encoding::Utf8) => {
            let text = std::str::from_utf8(payload).map_err(CodecError::Encoding)?;
            Reply::Text(text.to_string())
        }
        None => Reply::BulkString(Bytes::copy_from_slice(payload)),
    };

    Ok(Some((AtomStep::Value(value), total_needed)))
}

fn parse_array_header(
    data: &[u8],
    protocol_error_factory: &ErrorFactory<ProtocolError>,
) -> Result<Option<(AtomStep, usize)>, CodecError> {
    let (len_line, used) = match read_line(data) {
        Some(v) => v,
        None => return Ok(None),
    };
    let n = parse_strict_i64(len_line)
        .ok_or_else(|| protocol_error_factory.apply(Bytes::copy_from_slice(len_line)))?;

    if n == -1 {
        return Ok(Some((AtomStep::Value(Reply::ArrayNull), used)));
    }
    if n < 0 {
        return Err(protocol_error_factory
            .apply(Bytes::copy_from_slice(len_line))
            .into());
    }
    if n == 0 {
        return Ok(Some((AtomStep::Value(Reply::Array(Vec::new())), used)));
    }

    Ok(Some((AtomStep::ArrayHeader(n as usize), used)))
}

fn parse_inline(
    data: &[u8],
    protocol_error_factory: &ErrorFactory<ProtocolError>,
) -> Result<Option<(Reply, usize)>, CodecError> {
    let (line, used) = match read_line(data) {
        Some(v) => v,
        None => return Ok(None),
    };
    let text = std::str::from_utf8(line)
        .map_err(|_| protocol_error_factory.apply(Bytes::copy_from_slice(line)))?;

    let tokens = text
        .split(|c: char| c == ' ' || c == '\t')
        .filter(|s| !s.is_empty())
        .map(|s| Reply::Text(s.to_string()))
        .collect();

    Ok(Some((Reply::Array(tokens), used)))
}

/// Strictly parse `-?[0-9]+` as an `i64`: no leading `+`, no whitespace,
/// no partial matches, and the full signed 64-bit range (including
/// `i64::MIN`, whose magnitude doesn't fit in an `i64` itself).
fn parse_strict_i64(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() {
        return None;
    }
    let (negative, digits) = if bytes[0] == b'-' {
        (true, &bytes[1..])
    } else {
        (false, bytes)
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    let magnitude: u64 = text.parse().ok()?;

    if negative {
        if magnitude == i64::MIN.unsigned_abs() {
            Some(i64::MIN)
        } else {
            i64::try_from(magnitude).ok().map(|v| -v)
        }
    } else {
        i64::try_from(magnitude).ok()
    }
}
