//! Meeting capture engine: segmentation, chat collection, session
//! lifecycle and degraded-capture reporting.

pub mod chat;
pub mod segmenter;
pub mod session;
pub mod status;
pub mod strategy;
pub mod types;

pub use session::{SessionController, SessionOptions, SessionPhase};
pub use types::{ChatMessage, SessionMeta, TranscriptBlock};
