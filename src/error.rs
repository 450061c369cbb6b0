//! Error types shared by the coordinator, page agents and speech bridges.
//!
//! Every variant is reportable: the coordinator turns it into an error
//! response carrying the `Display` text, and no variant is fatal to the
//! process as a whole.

use thiserror::Error;

use crate::message::TabId;

#[derive(Debug, Error)]
pub enum Error {
    /// A speech capability is missing on this page.
    #[error("{0} is not supported in this browser")]
    Unsupported(&'static str),

    /// Microphone access was refused.
    #[error("Microphone access denied. Please grant permission.")]
    PermissionDenied,

    /// The page is a privileged internal page.
    #[error("{feature} is not available on {prefix} pages")]
    RestrictedContext {
        feature: &'static str,
        prefix: String,
    },

    /// A probe into a page agent failed or produced no result.
    #[error("probe failed: {0}")]
    ProbeFailed(String),

    #[error("Theme not found: {0}")]
    UnknownTheme(String),

    #[error("no such tab: {0}")]
    UnknownTab(TabId),

    #[error("no active tab")]
    NoActiveTab,

    /// Speech recognition reported an error code.
    #[error("speech recognition error: {0}")]
    Recognition(String),

    #[error("invalid page snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl Error {
    /// Probe failures are skipped by the polling loops instead of reported.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ProbeFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Human-readable text for a recognition error code reported by the browser.
pub fn recognition_error_message(code: &str) -> &'static str {
    match code {
        "no-speech" => "No speech was detected",
        "aborted" => "Speech recognition was aborted",
        "audio-capture" => "No microphone was found",
        "network" => "Network error occurred",
        "not-allowed" => "Microphone access was denied",
        "service-not-allowed" => "Speech recognition service is not allowed",
        "bad-grammar" => "Bad grammar error",
        "language-not-supported" => "Language not supported",
        _ => "Unknown error",
    }
}
