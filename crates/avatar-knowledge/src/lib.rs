//! Scripted knowledge base for the avatar.
//!
//! Loads question/answer records from a JSON source, indexes their
//! normalized phrasings once, and scores incoming utterances against them
//! with a token-order-insensitive fuzzy metric.
//!
//! The index is read-only once built. Reloading builds a complete new
//! [`KnowledgeBase`] off to the side and swaps it into the shared
//! [`KnowledgeHandle`]; requests already holding the previous snapshot keep
//! using it until they finish.

mod error;
mod index;
mod matcher;

pub use error::KnowledgeError;
pub use index::{load, KnowledgeBase, KnowledgeHandle};
pub use matcher::{normalize, token_set_ratio, MatchResult, Matcher, DEFAULT_MATCH_THRESHOLD};
