pub mod error;
pub mod store;
pub mod transcript;
pub mod types;

pub use error::SessionError;
pub use store::{ListFilter, SessionStore};
pub use transcript::{TranscriptMessage, TranscriptStore};
pub use types::{
    GroupActivation, OnOff, ReasoningLevel, SendPolicy, SessionEntry, SessionKey, SessionKeyKind,
    SessionPatch, ThinkingLevel,
};
