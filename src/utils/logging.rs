// Observability hook for the session store
use log::debug;
use std::fmt;

/// Why an existing session was rejected on read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `exp` recorded when the session was written has passed
    ExpiredAtIssue,
    /// Idle longer than the current rolling duration
    ExpiredByRolling,
    /// Older than the current absolute duration
    ExpiredByAbsolute,
    /// Envelope is malformed or no key authenticates it
    DecryptFailed,
    /// Decrypted cleartext is not a valid session payload
    MalformedPayload,
}

impl RejectReason {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ExpiredAtIssue => "expired-at-issue",
            Self::ExpiredByRolling => "expired-by-rolling",
            Self::ExpiredByAbsolute => "expired-by-absolute",
            Self::DecryptFailed => "decrypt-failed",
            Self::MalformedPayload => "malformed-payload",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Points in the session lifecycle reported to a [`SessionObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SessionRejected { reason: RejectReason },
    ChunkingTriggered { chunks: usize, chunk_size: usize },
    CookieCleared { name: String },
}

/// Receives session store events
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

/// Default observer: writes every event to the `log` facade at debug level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::SessionRejected { reason } => {
                debug!("existing session was rejected because {reason}");
            }
            SessionEvent::ChunkingTriggered { chunks, chunk_size } => {
                debug!("cookie size greater than {chunk_size}, chunking into {chunks} cookies");
            }
            SessionEvent::CookieCleared { name } => {
                debug!("clearing session cookie {name}");
            }
        }
    }
}
