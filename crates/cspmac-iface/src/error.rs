use cspmac_frame::FrameError;
use cspmac_transport::TransportError;

/// Numeric error codes of the CSP stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    NoMemory = -1,
    InvalidArgument = -2,
    Already = -7,
    TxError = -10,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::Success => "Success",
            ErrorCode::NoMemory => "NoMemory",
            ErrorCode::InvalidArgument => "InvalidArgument",
            ErrorCode::Already => "Already",
            ErrorCode::TxError => "TxError",
        }
    }
}

/// Errors that can occur in MAC interface operations.
#[derive(Debug, thiserror::Error)]
pub enum IfaceError {
    /// An allocation needed by the operation failed.
    #[error("out of memory: {0}")]
    NoMemory(&'static str),

    /// A required argument was absent or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An interface with the same name is already registered.
    #[error("interface {0:?} already registered")]
    AlreadyRegistered(String),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The send primitive failed to take the frame.
    #[error("transmit failed: {0}")]
    Send(#[from] TransportError),

    /// The receive worker thread could not be started.
    #[error("failed to start rx worker: {0}")]
    Spawn(#[source] std::io::Error),
}

impl IfaceError {
    /// The stack error code this error is reported as.
    pub fn code(&self) -> ErrorCode {
        match self {
            IfaceError::NoMemory(_) | IfaceError::Spawn(_) => ErrorCode::NoMemory,
            IfaceError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            IfaceError::AlreadyRegistered(_) => ErrorCode::Already,
            IfaceError::Frame(FrameError::ExceedsMtu { .. }) => ErrorCode::TxError,
            IfaceError::Frame(FrameError::PoolExhausted) => ErrorCode::NoMemory,
            IfaceError::Frame(_) => ErrorCode::InvalidArgument,
            IfaceError::Send(_) => ErrorCode::TxError,
        }
    }
}

pub type Result<T> = std::result::Result<T, IfaceError>;
