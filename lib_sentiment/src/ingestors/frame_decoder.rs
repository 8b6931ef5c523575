//! # SSE Frame Decoder
//!
//! Turns the raw byte chunks of an SSE response into `DeltaRecord`s.
//!
//! ## Framing
//! - Chunks are buffered until a `\n` completes a line, so a frame split across
//!   two network reads is decoded exactly once. A trailing `\r` is dropped.
//! - Only `data:` lines carry payloads. `event:`, `id:`, `retry:`, comment
//!   lines (`:`) and blank separators are ignored.
//! - Heartbeats (`{"type": "heartbeat"}`, or any payload without sentiment
//!   data that mentions the marker) keep the connection alive and never reach
//!   the engine.
//! - An unterminated line longer than `MAX_PENDING_BYTES` is dropped and
//!   counted as a decode failure.
//! - A malformed frame is logged, counted and skipped; decoding continues with
//!   the next line.

use std::collections::VecDeque;

use futures_util::{stream, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

use super::transport::ByteStream;
use crate::model::delta::{DeltaRecord, WireRecord};
use crate::types::{StreamError, StreamResult};

const DATA_FIELD: &str = "data:";
const HEARTBEAT_MARKER: &str = "heartbeat";
const MAX_PENDING_BYTES: usize = 256 * 1024;

/// Classification of a single line.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    Record(DeltaRecord),
    Heartbeat,
    /// Not a data line, or an empty payload.
    Ignored,
    /// A data line whose payload could not be decoded.
    Malformed(String),
}

/// Running counters, handy for status displays and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    pub data_frames: u64,
    pub records: u64,
    pub heartbeats: u64,
    pub decode_failures: u64,
}

/// Incremental decoder bound to one connection.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Feed one chunk, returning the records completed by it in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DeltaRecord> {
        self.pending.extend_from_slice(chunk);

        let records = match self.pending.iter().rposition(|b| *b == b'\n') {
            Some(last_newline) => {
                let rest = self.pending.split_off(last_newline + 1);
                let complete = std::mem::replace(&mut self.pending, rest);
                complete[..last_newline]
                    .split(|b| *b == b'\n')
                    .filter_map(|raw| self.accept_line(raw))
                    .collect()
            }
            None => Vec::new(),
        };

        if self.pending.len() > MAX_PENDING_BYTES {
            self.drop_oversized_line();
        }
        records
    }

    /// The rest of the dropped line arrives without a `data:` prefix and is ignored.
    fn drop_oversized_line(&mut self) {
        self.stats.decode_failures += 1;
        log::warn!(
            "Dropping unterminated frame of {} bytes (limit {})",
            self.pending.len(),
            MAX_PENDING_BYTES
        );
        self.pending.clear();
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<DeltaRecord> {
        let tail = std::mem::take(&mut self.pending);
        if tail.is_empty() {
            return Vec::new();
        }
        self.accept_line(&tail).into_iter().collect()
    }

    fn accept_line(&mut self, raw: &[u8]) -> Option<DeltaRecord> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

        let frame = match std::str::from_utf8(raw) {
            Ok(line) => decode_line(line),
            Err(e) if raw.starts_with(DATA_FIELD.as_bytes()) => {
                DecodedFrame::Malformed(format!("Invalid UTF-8: {}", e))
            }
            Err(_) => DecodedFrame::Ignored,
        };

        match frame {
            DecodedFrame::Record(record) => {
                self.stats.data_frames += 1;
                self.stats.records += 1;
                Some(record)
            }
            DecodedFrame::Heartbeat => {
                self.stats.data_frames += 1;
                self.stats.heartbeats += 1;
                log::debug!("Heartbeat frame received");
                None
            }
            DecodedFrame::Malformed(reason) => {
                self.stats.data_frames += 1;
                self.stats.decode_failures += 1;
                log::warn!("Skipping malformed sentiment frame: {}", reason);
                None
            }
            DecodedFrame::Ignored => None,
        }
    }
}

/// Classify one line of an SSE body, without the trailing newline.
pub fn decode_line(line: &str) -> DecodedFrame {
    let Some(rest) = line.strip_prefix(DATA_FIELD) else {
        return DecodedFrame::Ignored;
    };
    let payload = rest.strip_prefix(' ').unwrap_or(rest).trim_end();
    if payload.is_empty() {
        return DecodedFrame::Ignored;
    }
    decode_payload(payload)
}

fn decode_payload(payload: &str) -> DecodedFrame {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(_) if payload.contains(HEARTBEAT_MARKER) => return DecodedFrame::Heartbeat,
        Err(e) => return DecodedFrame::Malformed(format!("Invalid JSON: {}", e)),
    };

    if value.get("type").and_then(Value::as_str) == Some(HEARTBEAT_MARKER) {
        return DecodedFrame::Heartbeat;
    }
    if value.get("sentiment").is_none() && payload.contains(HEARTBEAT_MARKER) {
        return DecodedFrame::Heartbeat;
    }

    let record = serde_json::from_value::<WireRecord>(value)
        .map_err(|e| StreamError::Decode(format!("Invalid sentiment frame: {}", e)))
        .and_then(DeltaRecord::try_from);

    match record {
        Ok(record) => DecodedFrame::Record(record),
        Err(e) => DecodedFrame::Malformed(e.to_string()),
    }
}

/// Adapt a byte stream into a lazy stream of records.
///
/// Decode failures are swallowed by the decoder; only transport errors come
/// through, and an error ends the stream.
pub fn decode_records(bytes: ByteStream) -> impl Stream<Item = StreamResult<DeltaRecord>> + Send {
    struct State {
        bytes: ByteStream,
        decoder: FrameDecoder,
        ready: VecDeque<DeltaRecord>,
        finished: bool,
    }

    let state = State {
        bytes,
        decoder: FrameDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(record) = st.ready.pop_front() {
                return Some((Ok(record), st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let records = st.decoder.feed(&chunk);
                    st.ready.extend(records);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.finished = true;
                    let records = st.decoder.finish();
                    st.ready.extend(records);
                }
            }
        }
    })
}
