//! Shared primitives used across PixelDust crates.

pub mod clock;

use core::fmt;

pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;

/// Result alias used across the workspace.
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Coded error shared by every PixelDust crate.
///
/// `code` is a stable dotted identifier (`net.prefetch.duplicate`) that callers
/// match on; `message` is for humans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserError {
    pub code: &'static str,
    pub message: String,
}

impl BrowserError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BrowserError {}
