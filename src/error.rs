use std::fmt;
use thiserror::Error;

/// A raw errno value reported by the hosting environment or the Provider.
///
/// Always positive, never the kernel's `-errno` return convention.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    pub const EFAULT: Self = Self(libc::EFAULT);
    pub const EINVAL: Self = Self(libc::EINVAL);
    pub const ENOENT: Self = Self(libc::ENOENT);
    pub const ENOMEM: Self = Self(libc::ENOMEM);
    pub const ENOTTY: Self = Self(libc::ENOTTY);
    pub const EOPNOTSUPP: Self = Self(libc::EOPNOTSUPP);
    pub const EBADF: Self = Self(libc::EBADF);
    pub const EBUSY: Self = Self(libc::EBUSY);
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Renders as "<message> (os error N)".
        write!(f, "{}", std::io::Error::from_raw_os_error(self.0))
    }
}

impl std::error::Error for Errno {}

impl fmt::Debug for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Errno({})", self.0)
    }
}

/// Which half of a caller-memory transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    CopyIn,
    CopyOut,
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CopyIn => f.write_str("copy from caller"),
            Self::CopyOut => f.write_str("copy to caller"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TranslatorError {
    #[error("Unknown command code: 0x{0:08x}")]
    UnknownCommand(u32),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Bad address during {0}")]
    Fault(Transfer),

    #[error("RDMA provider error: {0}")]
    Provider(Errno),

    #[error("DMA-BUF error: {0}")]
    DmaBuf(Errno),

    #[error("Inconsistent provider response: {0}")]
    Inconsistent(String),

    #[error("Failed to release provider pages: {0}")]
    Cleanup(Errno),

    #[error("RDMA interface unavailable: {0}")]
    InterfaceUnavailable(String),

    #[error("Endpoint registration failed: {0}")]
    Registration(Errno),

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranslatorError {
    /// The errno a caller of the control endpoint observes for this error.
    #[must_use]
    pub fn errno(&self) -> Errno {
        match self {
            Self::UnknownCommand(_) => Errno::ENOTTY,
            Self::InvalidArgument(_) | Self::Inconsistent(_) => Errno::EINVAL,
            Self::NotSupported(_) => Errno::EOPNOTSUPP,
            Self::Fault(_) => Errno::EFAULT,
            Self::Provider(e) | Self::DmaBuf(e) | Self::Cleanup(e) | Self::Registration(e) => *e,
            Self::InterfaceUnavailable(_) => Errno::ENOENT,
            Self::Io(e) => Errno(e.raw_os_error().unwrap_or(libc::EIO)),
        }
    }
}

impl From<TranslatorError> for std::io::Error {
    fn from(err: TranslatorError) -> Self {
        match err {
            TranslatorError::Io(e) => e,
            other => Self::from_raw_os_error(other.errno().0),
        }
    }
}

// A convenient alias
pub type TranslatorResult<T> = Result<T, TranslatorError>;
