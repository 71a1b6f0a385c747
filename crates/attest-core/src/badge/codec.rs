//! Wire codec for attested badge batches.
//!
//! The encoded batch is embedded verbatim as the payload of a `badge-set:v1`
//! canonical message, so the signed bytes and the decoded facts are the same
//! bytes. The format is self-delimiting and strict: the decoder accepts
//! exactly one encoding per batch and rejects everything else before any
//! state is touched.
//!
//! # Layout
//!
//! ```text
//! count (u16 LE)
//! repeat count times:
//!   str(category) || str(tier_label) || tier_rank (u16 LE) ||
//!   str(display_name) || str(description) ||
//!   marker (0x00 | 0x01) [|| str(image_url) when marker = 0x01]
//! ```
//!
//! where `str` is a `u16`-LE length prefix followed by UTF-8 bytes.
//! Trailing bytes after the declared count are rejected, as is any marker
//! byte other than `0x00`/`0x01`. Malleability in the option marker or the
//! tail would let two distinct byte strings decode to the same batch while
//! only one of them was signed.

use thiserror::Error;

use super::BadgeFact;

/// Maximum records accepted in one batch.
pub const MAX_BATCH_RECORDS: usize = 64;

/// Maximum byte length of a text field in a badge record.
pub const MAX_BADGE_FIELD_LEN: usize = 1024;

/// Rejection reasons for a batch that cannot be encoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BatchEncodeError {
    /// More records than [`MAX_BATCH_RECORDS`].
    #[error("batch has {count} records, max {MAX_BATCH_RECORDS}")]
    TooManyRecords {
        /// Number of records submitted.
        count: usize,
    },

    /// A text field exceeds [`MAX_BADGE_FIELD_LEN`].
    #[error("field {field} is {len} bytes, max {MAX_BADGE_FIELD_LEN}")]
    FieldTooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Length submitted.
        len: usize,
    },
}

/// Rejection reasons for bytes that do not decode as a batch. Any of these
/// fails the whole batch; no partial decode is ever surfaced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BatchDecodeError {
    /// The input ended before the declared structure was complete.
    #[error("badge batch truncated while reading {context}")]
    Truncated {
        /// What was being read when the input ran out.
        context: &'static str,
    },

    /// The count prefix exceeds [`MAX_BATCH_RECORDS`].
    #[error("badge batch declares {count} records, max {MAX_BATCH_RECORDS}")]
    TooManyRecords {
        /// Declared record count.
        count: usize,
    },

    /// A length prefix exceeds [`MAX_BADGE_FIELD_LEN`].
    #[error("field {field} declares {len} bytes, max {MAX_BADGE_FIELD_LEN}")]
    FieldTooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Declared length.
        len: usize,
    },

    /// A text field is not valid UTF-8.
    #[error("field {field} is not valid UTF-8")]
    InvalidUtf8 {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The image-URL option marker is neither `0x00` nor `0x01`.
    #[error("invalid option marker byte {byte:#04x}")]
    InvalidOptionMarker {
        /// The rejected marker byte.
        byte: u8,
    },

    /// Bytes remain after the declared record count was consumed.
    #[error("{remaining} trailing bytes after declared record count")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        remaining: usize,
    },
}

fn put_str(
    buf: &mut Vec<u8>,
    field: &'static str,
    value: &str,
) -> Result<(), BatchEncodeError> {
    if value.len() > MAX_BADGE_FIELD_LEN {
        return Err(BatchEncodeError::FieldTooLong {
            field,
            len: value.len(),
        });
    }
    #[allow(clippy::cast_possible_truncation)] // bounded by MAX_BADGE_FIELD_LEN
    let len = value.len() as u16;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Encode a batch of facts.
///
/// # Errors
///
/// [`BatchEncodeError::TooManyRecords`] above [`MAX_BATCH_RECORDS`];
/// [`BatchEncodeError::FieldTooLong`] for any text field above
/// [`MAX_BADGE_FIELD_LEN`].
pub fn encode_batch(facts: &[BadgeFact]) -> Result<Vec<u8>, BatchEncodeError> {
    if facts.len() > MAX_BATCH_RECORDS {
        return Err(BatchEncodeError::TooManyRecords { count: facts.len() });
    }
    let mut buf = Vec::new();
    #[allow(clippy::cast_possible_truncation)] // bounded by MAX_BATCH_RECORDS
    let count = facts.len() as u16;
    buf.extend_from_slice(&count.to_le_bytes());
    for fact in facts {
        put_str(&mut buf, "category", &fact.category)?;
        put_str(&mut buf, "tier_label", &fact.tier_label)?;
        buf.extend_from_slice(&fact.tier_rank.to_le_bytes());
        put_str(&mut buf, "display_name", &fact.display_name)?;
        put_str(&mut buf, "description", &fact.description)?;
        match &fact.image_url {
            None => buf.push(0x00),
            Some(url) => {
                buf.push(0x01);
                put_str(&mut buf, "image_url", url)?;
            }
        }
    }
    Ok(buf)
}

/// Strict cursor over the encoded batch.
struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], BatchDecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.input.len())
            .ok_or(BatchDecodeError::Truncated { context })?;
        let bytes = &self.input[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u16_le(&mut self, context: &'static str) -> Result<u16, BatchDecodeError> {
        let bytes = self.take(2, context)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn byte(&mut self, context: &'static str) -> Result<u8, BatchDecodeError> {
        Ok(self.take(1, context)?[0])
    }

    fn string(&mut self, field: &'static str) -> Result<String, BatchDecodeError> {
        let len = usize::from(self.u16_le(field)?);
        if len > MAX_BADGE_FIELD_LEN {
            return Err(BatchDecodeError::FieldTooLong { field, len });
        }
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BatchDecodeError::InvalidUtf8 { field })
    }

    const fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }
}

/// Decode an encoded batch into facts.
///
/// Decoding is all-or-nothing: the first defect fails the whole batch and
/// nothing is returned.
///
/// # Errors
///
/// See [`BatchDecodeError`] for the rejection reasons.
pub fn decode_batch(input: &[u8]) -> Result<Vec<BadgeFact>, BatchDecodeError> {
    let mut reader = Reader::new(input);
    let count = usize::from(reader.u16_le("record count")?);
    if count > MAX_BATCH_RECORDS {
        return Err(BatchDecodeError::TooManyRecords { count });
    }

    let mut facts = Vec::with_capacity(count);
    for _ in 0..count {
        let category = reader.string("category")?;
        let tier_label = reader.string("tier_label")?;
        let rank_bytes = reader.take(2, "tier_rank")?;
        let tier_rank = u16::from_le_bytes([rank_bytes[0], rank_bytes[1]]);
        let display_name = reader.string("display_name")?;
        let description = reader.string("description")?;
        let image_url = match reader.byte("image_url marker")? {
            0x00 => None,
            0x01 => Some(reader.string("image_url")?),
            byte => return Err(BatchDecodeError::InvalidOptionMarker { byte }),
        };
        facts.push(BadgeFact {
            category,
            tier_label,
            tier_rank,
            display_name,
            description,
            image_url,
        });
    }

    if reader.remaining() > 0 {
        return Err(BatchDecodeError::TrailingBytes {
            remaining: reader.remaining(),
        });
    }
    Ok(facts)
}
