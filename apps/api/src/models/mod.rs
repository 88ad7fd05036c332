pub mod document;
pub mod matching;

pub use document::{Document, DocumentKind};
pub use matching::{AuditEntry, MatchRecord, MatchView};
