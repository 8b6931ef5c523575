//! # Data Ingestors Module
//!
//! Everything between the network and the aggregation engine.
//!
//! ## Contained Modules:
//! - **`transport`**: the `StreamTransport` seam. A transport opens one
//!   long-lived connection and hands back raw byte chunks; it never retries.
//! - **`sse_http`** (feature `transport`): the `reqwest` implementation that
//!   talks to the sentiment backend's SSE endpoint.
//! - **`transcript`**: replays a captured SSE body from a file.
//! - **`frame_decoder`**: turns byte chunks into `DeltaRecord`s, dropping
//!   heartbeats and skipping malformed frames.

pub mod frame_decoder;
#[cfg(feature = "transport")]
pub mod sse_http;
pub mod transcript;
pub mod transport;

// --- Public API Re-exports ---
pub use frame_decoder::{decode_line, decode_records, DecodedFrame, DecoderStats, FrameDecoder};
#[cfg(feature = "transport")]
pub use sse_http::HttpSseTransport;
pub use transcript::TranscriptTransport;
pub use transport::{ByteStream, StreamTransport};
