//! # Transcript Transport
//!
//! Replays a captured SSE response body from disk through the same pipeline
//! as the live connection. Handy for offline runs and for reproducing a
//! session from a saved stream.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;

use super::transport::{ByteStream, StreamTransport};
use crate::types::{StreamError, StreamResult};

const DEFAULT_CHUNK_SIZE: usize = 4096;

/// File-backed transport. Each `open` reads the whole file and yields it in
/// fixed-size chunks, so frames may straddle chunk boundaries just like on
/// the wire.
#[derive(Debug, Clone)]
pub struct TranscriptTransport {
    path: PathBuf,
    chunk_size: usize,
}

impl TranscriptTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StreamTransport for TranscriptTransport {
    async fn open(&self) -> StreamResult<ByteStream> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            StreamError::Transport(format!("Cannot read transcript {}: {}", self.path.display(), e))
        })?;
        let raw = Bytes::from(raw);
        log::info!("Replaying {} bytes from {}", raw.len(), self.path.display());

        let chunks: Vec<StreamResult<Bytes>> = (0..raw.len())
            .step_by(self.chunk_size)
            .map(|start| Ok(raw.slice(start..(start + self.chunk_size).min(raw.len()))))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}
