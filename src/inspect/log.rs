use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::InspectError;

/// Bytes read per step when walking a log backwards
const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024;

/// Reads the tail of a log file
#[async_trait]
pub trait LogReader: Send + Sync {
    /// The last `lines` lines of `path`, oldest first
    async fn tail(&self, path: &Path, lines: usize) -> Result<Vec<String>, InspectError>;
}

/// Log reader over the local filesystem
///
/// Reads backwards from the end of the file, so the cost depends on the
/// requested lines and not on the size of the log.
#[derive(Debug, Clone)]
pub struct FileLogReader {
    chunk_size: u64,
}

impl FileLogReader {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(chunk_size: u64) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for FileLogReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes from the end of `file` holding at least `lines + 1` newlines, or
/// the whole file if it has fewer
async fn read_tail(file: &mut File, lines: usize, chunk_size: u64) -> std::io::Result<Vec<u8>> {
    let mut offset = file.metadata().await?.len();
    let mut buf: Vec<u8> = Vec::new();
    let mut newlines = 0;

    // The extra newline marks where the oldest wanted line starts
    while offset > 0 && newlines <= lines {
        let size = chunk_size.min(offset);
        offset -= size;

        file.seek(SeekFrom::Start(offset)).await?;
        let mut chunk = vec![0u8; size as usize];
        file.read_exact(&mut chunk).await?;

        newlines += chunk.iter().filter(|&&b| b == b'\n').count();
        chunk.extend_from_slice(&buf);
        buf = chunk;
    }

    Ok(buf)
}

#[async_trait]
impl LogReader for FileLogReader {
    async fn tail(&self, path: &Path, lines: usize) -> Result<Vec<String>, InspectError> {
        let read_error = |source: std::io::Error| InspectError::Read {
            path: path.to_path_buf(),
            source,
        };

        if lines == 0 {
            return Ok(Vec::new());
        }

        let mut file = File::open(path).await.map_err(read_error)?;
        let bytes = read_tail(&mut file, lines, self.chunk_size)
            .await
            .map_err(read_error)?;

        // Log lines may carry arbitrary bytes from client queries; a split
        // character can only land in the partial first line, which is dropped
        let text = String::from_utf8_lossy(&bytes);
        let all: Vec<&str> = text.lines().collect();
        let start = all.len().saturating_sub(lines);

        Ok(all[start..].iter().map(|line| line.to_string()).collect())
    }
}
