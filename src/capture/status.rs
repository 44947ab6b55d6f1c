//! Degraded-capture reporting.
//!
//! Each failure class reaches the user at most once per session; repeats and
//! anything after session end are logged only.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// User-facing banner payload. Status 200 renders informational and
/// auto-dismisses; anything else renders as a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub status: u16,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            status: 200,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
        }
    }
}

/// Where banners go. The embedder renders them; the default just logs.
pub trait NotificationSurface: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Logging-only surface for headless runs.
pub struct LogSurface;

impl NotificationSurface for LogSurface {
    fn notify(&self, notification: &Notification) {
        if notification.status == 200 {
            tracing::info!("{}", notification.message);
        } else {
            warn!("{}", notification.message);
        }
    }
}

/// Classes of capture degradation, each with a distinguishing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    TranscriptRegionMissing,
    ChatPanelMissing,
    ChatIconMissing,
    EndControlMissing,
    TranscriptParse,
    ChatParse,
    TitleCapture,
}

impl FailureKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::TranscriptRegionMissing => "001",
            Self::ChatPanelMissing => "002",
            Self::ChatIconMissing => "003",
            Self::EndControlMissing => "004",
            Self::TranscriptParse => "005",
            Self::ChatParse => "006",
            Self::TitleCapture => "007",
        }
    }
}

const CAPTURE_BUG_MESSAGE: &str =
    "<strong>Meeting capture encountered an error</strong> <br /> Please try reloading the meeting tab.";

pub struct StatusReporter {
    surface: Arc<dyn NotificationSurface>,
    reported: HashSet<FailureKind>,
    session_over: bool,
}

impl StatusReporter {
    pub fn new(surface: Arc<dyn NotificationSurface>) -> Self {
        Self {
            surface,
            reported: HashSet::new(),
            session_over: false,
        }
    }

    /// After this, every failure is post-session noise and is swallowed.
    pub fn session_ended(&mut self) {
        self.session_over = true;
    }

    pub fn has_reported(&self, kind: FailureKind) -> bool {
        self.reported.contains(&kind)
    }

    /// Record a failure. The first occurrence of a kind shows the one
    /// banner for it; later occurrences only log.
    pub fn report(&mut self, kind: FailureKind, error: &anyhow::Error) {
        if self.session_over {
            debug!("Capture error after session end (code {}): {:#}", kind.code(), error);
            return;
        }
        error!("Capture error code {}: {:#}", kind.code(), error);
        if self.reported.insert(kind) {
            self.surface
                .notify(&Notification::warning(CAPTURE_BUG_MESSAGE));
        }
    }

    /// Record a non-critical failure without a banner.
    pub fn log_only(&mut self, kind: FailureKind, error: &anyhow::Error) {
        warn!("Capture error code {}: {:#}", kind.code(), error);
        self.reported.insert(kind);
    }

    /// Pass an informational or status-record notification straight through.
    pub fn announce(&self, notification: &Notification) {
        self.surface.notify(notification);
    }
}
