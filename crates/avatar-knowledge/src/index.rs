use crate::error::KnowledgeError;
use crate::matcher::Phrase;
use avatar_types::{EntryId, QaEntry};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// One record as it appears in the source file.
///
/// `question` may be absent in the legacy `{keywords, answer}` shape, in
/// which case the first keyword stands in for it.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<EntryId>,
    #[serde(default)]
    question: Option<String>,
    answer: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
}

#[derive(Debug)]
pub(crate) struct IndexedEntry {
    pub(crate) entry: QaEntry,
    /// Normalized question followed by normalized keywords.
    pub(crate) phrases: Vec<Phrase>,
}

/// An ordered, immutable set of scripted answers with their match index.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    version: Option<String>,
    entries: Vec<IndexedEntry>,
}

impl KnowledgeBase {
    /// An index with no entries. Every utterance falls through to the
    /// fallback responder.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds an index from already-typed entries.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::Invalid`] on duplicate ids or on entries
    /// whose question or answer is blank.
    pub fn from_entries(entries: Vec<QaEntry>) -> Result<Self, KnowledgeError> {
        let mut seen = HashSet::new();
        let mut indexed = Vec::with_capacity(entries.len());

        for (index, entry) in entries.into_iter().enumerate() {
            if !seen.insert(entry.id) {
                return Err(KnowledgeError::Invalid {
                    index,
                    reason: format!("duplicate id {}", entry.id),
                });
            }
            if entry.answer.trim().is_empty() {
                return Err(KnowledgeError::Invalid {
                    index,
                    reason: "answer is empty".to_string(),
                });
            }

            let mut phrases = Vec::with_capacity(1 + entry.keywords.len());
            let question = Phrase::new(&entry.question);
            if question.is_empty() {
                return Err(KnowledgeError::Invalid {
                    index,
                    reason: "question has no matchable words".to_string(),
                });
            }
            phrases.push(question);
            phrases.extend(
                entry
                    .keywords
                    .iter()
                    .map(|k| Phrase::new(k))
                    .filter(|p| !p.is_empty()),
            );

            indexed.push(IndexedEntry { entry, phrases });
        }

        Ok(Self {
            version: None,
            entries: indexed,
        })
    }

    /// Parses a knowledge base from its JSON text.
    ///
    /// Accepts either a bare array of records or an object of the form
    /// `{"version": "...", "entries": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self, KnowledgeError> {
        let (version, records) = match serde_json::from_str::<Value>(json)? {
            Value::Array(records) => (None, records),
            Value::Object(mut map) => {
                let version = match map.remove("version") {
                    Some(Value::String(v)) => Some(v),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                };
                match map.remove("entries") {
                    Some(Value::Array(records)) => (version, records),
                    _ => {
                        return Err(KnowledgeError::Invalid {
                            index: 0,
                            reason: "expected an `entries` array".to_string(),
                        })
                    }
                }
            }
            _ => {
                return Err(KnowledgeError::Invalid {
                    index: 0,
                    reason: "expected an array of records".to_string(),
                })
            }
        };

        let mut entries = Vec::with_capacity(records.len());
        for (index, value) in records.into_iter().enumerate() {
            let raw: RawRecord =
                serde_json::from_value(value).map_err(|e| KnowledgeError::Invalid {
                    index,
                    reason: e.to_string(),
                })?;

            let question = match raw.question {
                Some(q) if !q.trim().is_empty() => q,
                _ => raw
                    .keywords
                    .first()
                    .cloned()
                    .ok_or_else(|| KnowledgeError::Invalid {
                        index,
                        reason: "record has neither a question nor keywords".to_string(),
                    })?,
            };

            entries.push(QaEntry {
                id: raw.id.unwrap_or(index as EntryId + 1),
                question,
                answer: raw.answer,
                keywords: raw.keywords,
                tags: raw.tags,
            });
        }

        let mut kb = Self::from_entries(entries)?;
        kb.version = version;
        Ok(kb)
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in source order.
    pub fn entries(&self) -> impl Iterator<Item = &QaEntry> {
        self.entries.iter().map(|e| &e.entry)
    }

    pub fn get(&self, id: EntryId) -> Option<&QaEntry> {
        self.entries().find(|e| e.id == id)
    }

    pub(crate) fn indexed(&self) -> &[IndexedEntry] {
        &self.entries
    }
}

/// Reads and indexes the knowledge base at `path`.
///
/// # Errors
///
/// Returns [`KnowledgeError`] if the file cannot be read or any record is
/// malformed. Nothing is partially loaded.
pub fn load(path: impl AsRef<Path>) -> Result<KnowledgeBase, KnowledgeError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let kb = KnowledgeBase::from_json_str(&contents)?;
    tracing::info!(
        path = %path.display(),
        entries = kb.len(),
        version = kb.version().unwrap_or("-"),
        "loaded knowledge base"
    );
    Ok(kb)
}

/// Shared, swappable reference to the live knowledge base.
///
/// Uses `std::sync::RwLock` because the lock only guards a pointer copy and
/// is never held across an `.await`.
#[derive(Debug, Clone)]
pub struct KnowledgeHandle {
    current: Arc<RwLock<Arc<KnowledgeBase>>>,
}

impl KnowledgeHandle {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(kb))),
        }
    }

    /// The index new requests should use. The returned snapshot stays valid
    /// even if a reload swaps in a newer index.
    pub fn snapshot(&self) -> Arc<KnowledgeBase> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => {
                tracing::error!("knowledge base lock poisoned, serving last index");
                Arc::clone(&poisoned.into_inner())
            }
        }
    }

    /// Installs `kb` for all subsequent readers and returns the previous
    /// index.
    pub fn swap(&self, kb: KnowledgeBase) -> Arc<KnowledgeBase> {
        let next = Arc::new(kb);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }

    /// Loads `path` and swaps it in. On failure the current index is left
    /// untouched.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<usize, KnowledgeError> {
        let kb = load(path)?;
        let count = kb.len();
        let previous = self.swap(kb);
        tracing::info!(
            previous = previous.len(),
            current = count,
            "knowledge base swapped"
        );
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_keyword_records_use_first_keyword_as_question() {
        let kb = KnowledgeBase::from_json_str(
            r#"[{"keywords": ["store hours", "when are you open"], "answer": "9 to 5."}]"#,
        )
        .unwrap();
        let entry = kb.entries().next().unwrap();
        assert_eq!(entry.id, 1);
        assert_eq!(entry.question, "store hours");
        assert_eq!(kb.indexed()[0].phrases.len(), 2);
    }

    #[test]
    fn versioned_source_keeps_version() {
        let kb = KnowledgeBase::from_json_str(
            r#"{"version": "2024-06", "entries": [
                {"id": 7, "question": "Who are you?", "answer": "Aria.", "tags": ["identity"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(kb.version(), Some("2024-06"));
        assert_eq!(kb.get(7).unwrap().answer, "Aria.");
        assert!(kb.get(7).unwrap().tags.contains("identity"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = KnowledgeBase::from_json_str(
            r#"[{"id": 1, "question": "a", "answer": "x"}, {"id": 1, "question": "b", "answer": "y"}]"#,
        )
        .unwrap_err();
        match err {
            KnowledgeError::Invalid { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("duplicate"), "got: {}", reason);
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn blank_answer_is_rejected() {
        let result = KnowledgeBase::from_json_str(r#"[{"question": "hi", "answer": "  "}]"#);
        assert!(matches!(result, Err(KnowledgeError::Invalid { .. })));
    }

    #[test]
    fn punctuation_only_question_is_rejected() {
        let result = KnowledgeBase::from_json_str(r#"[{"question": "?!", "answer": "x"}]"#);
        assert!(matches!(result, Err(KnowledgeError::Invalid { .. })));
    }

    #[test]
    fn record_without_question_or_keywords_is_rejected() {
        let result = KnowledgeBase::from_json_str(r#"[{"answer": "orphan"}]"#);
        assert!(matches!(result, Err(KnowledgeError::Invalid { index: 0, .. })));
    }

    #[test]
    fn non_json_is_a_parse_error() {
        let result = KnowledgeBase::from_json_str("question: answer");
        assert!(matches!(result, Err(KnowledgeError::Parse(_))));
    }

    #[test]
    fn swap_leaves_old_snapshot_valid() {
        let handle = KnowledgeHandle::new(
            KnowledgeBase::from_json_str(r#"[{"question": "old", "answer": "old answer"}]"#)
                .unwrap(),
        );
        let before = handle.snapshot();

        handle.swap(
            KnowledgeBase::from_json_str(
                r#"[{"question": "new", "answer": "a"}, {"question": "newer", "answer": "b"}]"#,
            )
            .unwrap(),
        );

        assert_eq!(before.len(), 1);
        assert_eq!(before.entries().next().unwrap().answer, "old answer");
        assert_eq!(handle.snapshot().len(), 2);
    }
}
