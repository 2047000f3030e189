// Mon Feb 2 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Out of bounds: address {0:#x} not in a mapped region")]
    OutOfBounds(u64),
    #[error("No terminated string at address {0:#x}")]
    UnreadableString(u64),
    #[error("Binary parse error: {0}")]
    BinaryParseError(String),
    #[error("Scan cancelled")]
    Cancelled,
}
