use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid {what} length: expected {expected} bytes, got {actual}")]
    FrameLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Protocol desync: {0}")]
    ProtocolDesync(String),

    #[error("Link failure: {0}")]
    LinkFailure(String),

    #[error("Stream queue overflow (capacity {capacity})")]
    QueueOverflow { capacity: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Fails with `FrameLength` unless `data` is exactly `expected` bytes long
    pub fn check_len(what: &'static str, data: &[u8], expected: usize) -> Result<()> {
        if data.len() != expected {
            return Err(GatewayError::FrameLength {
                what,
                expected,
                actual: data.len(),
            });
        }
        Ok(())
    }

    /// Fails with `FrameLength` when `data` is shorter than `minimum` bytes
    pub fn check_min_len(what: &'static str, data: &[u8], minimum: usize) -> Result<()> {
        if data.len() < minimum {
            return Err(GatewayError::FrameLength {
                what,
                expected: minimum,
                actual: data.len(),
            });
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
