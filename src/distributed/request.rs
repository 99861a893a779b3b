//! Distributed result request codec
//!
//! Layout:
//!
//! ```text
//! version:u8 | job_id:16 | flags:u8 | producer:vint | sequence:vlong | columns:vint |
//!   failure: message:string
//!   rows:    vlong(count + 1) rows...            (known count)
//!            vlong(0) (0x01 row)* 0x00           (streamed)
//! crc32:u32 LE over everything before it
//! ```
//!
//! A row is a null bitmap of `ceil(columns / 8)` bytes (bit set = null,
//! padding bits zero) followed by the non-null values through their column
//! streamer, in column order. Rows without columns are always streamed.
//!
//! `sequence` numbers a producer's requests for one job from zero. The
//! end-of-stream request carries the last number, so the receiver knows how
//! many requests to expect from that producer whatever order they arrive in.

use std::fmt;

use crc32fast::Hasher;
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::row::{Bucket, Row};
use crate::stream::{StreamInput, StreamOutput};
use crate::types::{streamers_for, DataType, Streamer, Value};

/// Current wire version
pub const REQUEST_VERSION: u8 = 1;

const FLAG_LAST: u8 = 0b01;
const FLAG_FAILURE: u8 = 0b10;
const KNOWN_FLAGS: u8 = FLAG_LAST | FLAG_FAILURE;

const CHECKSUM_LEN: usize = 4;
const UNKNOWN_COUNT: u64 = 0;
const MORE_ROWS: u8 = 1;
const END_OF_ROWS: u8 = 0;

pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Splits off and verifies the trailing checksum, returning the body
fn verified_body(bytes: &[u8]) -> EngineResult<&[u8]> {
    if bytes.len() < CHECKSUM_LEN {
        return Err(EngineError::serialization(format!(
            "result request of {} bytes has no checksum",
            bytes.len()
        )));
    }
    let (body, tail) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let expected = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let actual = compute_checksum(body);
    if actual != expected {
        return Err(EngineError::serialization(format!(
            "result request checksum mismatch: expected {expected:#010x}, got {actual:#010x}"
        )));
    }
    Ok(body)
}

/// Header fields readable without knowing the column types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub version: u8,
    pub job_id: Uuid,
    pub is_last: bool,
    pub is_failure: bool,
    pub producer: u32,
    pub sequence: u64,
    pub column_count: usize,
}

impl RequestHeader {
    /// Verifies the checksum and parses the header
    pub fn peek(bytes: &[u8]) -> EngineResult<Self> {
        let body = verified_body(bytes)?;
        let mut input = StreamInput::new(body);
        Self::read_from(&mut input)
    }

    fn read_from(input: &mut StreamInput<'_>) -> EngineResult<Self> {
        let version = input.read_u8()?;
        if version != REQUEST_VERSION {
            return Err(EngineError::serialization(format!(
                "unsupported result request version {version}"
            )));
        }
        let job_id = input.read_uuid()?;
        let flags = input.read_u8()?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(EngineError::serialization(format!(
                "unknown result request flags {flags:#04x}"
            )));
        }
        let producer = input.read_vint()?;
        let sequence = input.read_vlong()?;
        let column_count = input.read_vint()? as usize;
        Ok(Self {
            version,
            job_id,
            is_last: flags & FLAG_LAST != 0,
            is_failure: flags & FLAG_FAILURE != 0,
            producer,
            sequence,
            column_count,
        })
    }
}

/// What a request carries
pub enum ResultPayload {
    Rows(Bucket),
    /// The producer's collect phase failed
    Failure(String),
}

impl fmt::Debug for ResultPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultPayload::Rows(bucket) => f.debug_tuple("Rows").field(bucket).finish(),
            ResultPayload::Failure(message) => f.debug_tuple("Failure").field(message).finish(),
        }
    }
}

/// One batch of partial results from a producer to the merge node
#[derive(Debug)]
pub struct DistributedResultRequest {
    pub job_id: Uuid,
    /// Index of the sending producer within the job
    pub producer: u32,
    /// Position of this request in the producer's stream
    pub sequence: u64,
    /// The producer sends nothing more for this job
    pub is_last: bool,
    pub payload: ResultPayload,
}

impl DistributedResultRequest {
    /// Rows from producer 0 at sequence 0; see [`Self::from_producer`]
    pub fn rows(job_id: Uuid, bucket: Bucket, is_last: bool) -> Self {
        Self {
            job_id,
            producer: 0,
            sequence: 0,
            is_last,
            payload: ResultPayload::Rows(bucket),
        }
    }

    /// A failure always ends the producer's stream
    pub fn failure(job_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            job_id,
            producer: 0,
            sequence: 0,
            is_last: true,
            payload: ResultPayload::Failure(message.into()),
        }
    }

    pub fn from_producer(mut self, producer: u32, sequence: u64) -> Self {
        self.producer = producer;
        self.sequence = sequence;
        self
    }

    /// Number of rows carried, when known without draining the bucket
    pub fn row_count(&self) -> Option<usize> {
        match &self.payload {
            ResultPayload::Rows(bucket) => bucket.size(),
            ResultPayload::Failure(_) => Some(0),
        }
    }

    /// Encodes the request; rows must match `types` column by column.
    ///
    /// Materialized buckets are written with their row count, streamed ones
    /// with continuation bytes.
    pub fn encode(self, types: &[DataType]) -> EngineResult<Vec<u8>> {
        let column_count = u32::try_from(types.len())
            .map_err(|_| EngineError::serialization("too many columns"))?;
        let mut out = StreamOutput::with_capacity(64);
        out.write_u8(REQUEST_VERSION);
        out.write_uuid(&self.job_id);
        let mut flags = 0;
        if self.is_last {
            flags |= FLAG_LAST;
        }
        if matches!(self.payload, ResultPayload::Failure(_)) {
            flags |= FLAG_FAILURE;
        }
        out.write_u8(flags);
        out.write_vint(self.producer);
        out.write_vlong(self.sequence);
        out.write_vint(column_count);

        match self.payload {
            ResultPayload::Failure(message) => out.write_string(&message),
            ResultPayload::Rows(bucket) => {
                let streamers = streamers_for(types);
                match bucket {
                    Bucket::Materialized(rows) if !streamers.is_empty() => {
                        out.write_vlong(rows.len() as u64 + 1);
                        for row in &rows {
                            write_row(row, &streamers, &mut out)?;
                        }
                    }
                    bucket => {
                        out.write_vlong(UNKNOWN_COUNT);
                        for row in bucket.into_row_iter() {
                            out.write_u8(MORE_ROWS);
                            write_row(&row?, &streamers, &mut out)?;
                        }
                        out.write_u8(END_OF_ROWS);
                    }
                }
            }
        }

        let checksum = compute_checksum(out.as_bytes());
        out.write_u32_le(checksum);
        Ok(out.into_bytes())
    }

    /// Decodes a request whose rows have the shape `types`.
    ///
    /// The rows land in an independent materialized bucket.
    pub fn decode(bytes: &[u8], types: &[DataType]) -> EngineResult<Self> {
        let body = verified_body(bytes)?;
        let mut input = StreamInput::new(body);
        let header = RequestHeader::read_from(&mut input)?;

        let payload = if header.is_failure {
            ResultPayload::Failure(input.read_string()?)
        } else {
            if header.column_count != types.len() {
                return Err(EngineError::serialization(format!(
                    "request for job {} carries {} columns, expected {}",
                    header.job_id,
                    header.column_count,
                    types.len()
                )));
            }
            let streamers = streamers_for(types);
            let rows = match input.read_vlong()? {
                UNKNOWN_COUNT => {
                    let mut rows = Vec::new();
                    loop {
                        match input.read_u8()? {
                            MORE_ROWS => rows.push(read_row(&streamers, &mut input)?),
                            END_OF_ROWS => break,
                            other => {
                                return Err(EngineError::serialization(format!(
                                    "invalid row continuation byte {other}"
                                )))
                            }
                        }
                    }
                    rows
                }
                encoded => {
                    let count = usize::try_from(encoded - 1)
                        .map_err(|_| EngineError::serialization("row count overflows usize"))?;
                    // each row takes at least its bitmap
                    let min_row_len = bitmap_len(streamers.len());
                    if min_row_len == 0 && count > 0 {
                        return Err(EngineError::serialization(
                            "rows without columns must be streamed",
                        ));
                    }
                    if min_row_len > 0 && count > input.remaining() / min_row_len {
                        return Err(EngineError::serialization(format!(
                            "row count {count} exceeds the {} remaining bytes",
                            input.remaining()
                        )));
                    }
                    let mut rows = Vec::with_capacity(count);
                    for _ in 0..count {
                        rows.push(read_row(&streamers, &mut input)?);
                    }
                    rows
                }
            };
            ResultPayload::Rows(Bucket::materialized(rows))
        };

        if !input.is_exhausted() {
            return Err(EngineError::serialization(format!(
                "{} trailing bytes after result request",
                input.remaining()
            )));
        }

        Ok(Self {
            job_id: header.job_id,
            producer: header.producer,
            sequence: header.sequence,
            is_last: header.is_last,
            payload,
        })
    }
}

fn bitmap_len(columns: usize) -> usize {
    columns.div_ceil(8)
}

fn write_row(row: &Row, streamers: &[&dyn Streamer], out: &mut StreamOutput) -> EngineResult<()> {
    if row.len() != streamers.len() {
        return Err(EngineError::serialization(format!(
            "row has {} columns, expected {}",
            row.len(),
            streamers.len()
        )));
    }
    let mut bitmap = vec![0u8; bitmap_len(row.len())];
    for (i, value) in row.iter().enumerate() {
        if value.is_null() {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }
    out.write_raw(&bitmap);
    for (value, streamer) in row.iter().zip(streamers) {
        if !value.is_null() {
            streamer.write_value(value, out)?;
        }
    }
    Ok(())
}

fn read_row(streamers: &[&dyn Streamer], input: &mut StreamInput<'_>) -> EngineResult<Row> {
    let columns = streamers.len();
    let bitmap = input.read_exact(bitmap_len(columns))?;
    if columns % 8 != 0 {
        if let Some(last) = bitmap.last() {
            let padding = !0u8 << (columns % 8);
            if last & padding != 0 {
                return Err(EngineError::serialization(
                    "null bitmap has padding bits set",
                ));
            }
        }
    }
    let mut row = Vec::with_capacity(columns);
    for (i, streamer) in streamers.iter().enumerate() {
        if bitmap[i / 8] & (1 << (i % 8)) != 0 {
            row.push(Value::Null);
        } else {
            row.push(streamer.read_value(input)?);
        }
    }
    Ok(row)
}
