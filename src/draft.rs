use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// In-progress answers for one test attempt: question id mapped to the
/// selected option id (choice questions) or free text (essay questions).
/// One value per question; later writes overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerDraft(BTreeMap<String, String>);

impl AnswerDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, question_id: impl Into<String>, value: impl Into<String>) {
        self.0.insert(question_id.into(), value.into());
    }

    pub fn get(&self, question_id: &str) -> Option<&str> {
        self.0.get(question_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(id, value)| (id.as_str(), value.as_str()))
    }
}

impl FromIterator<(String, String)> for AnswerDraft {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Storage key for one (student, test) draft. The shape is shared with the
/// web client, which keeps the same drafts in browser local storage.
pub fn draft_key(student_id: &str, test_id: &str) -> String {
    format!("quiz-answers-{student_id}-{test_id}")
}

/// Device-local persistence for in-progress answers. Single active writer per
/// key is assumed; concurrent tabs editing the same test are not reconciled.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Fails soft: a corrupt or unreadable entry is logged and reported as
    /// absent, never raised to the caller.
    async fn load(&self, student_id: &str, test_id: &str) -> Option<AnswerDraft>;

    async fn save(&self, student_id: &str, test_id: &str, draft: &AnswerDraft) -> Result<()>;

    /// Removes the stored draft. Clearing an absent entry is a no-op.
    async fn clear(&self, student_id: &str, test_id: &str) -> Result<()>;
}

/// Draft store writing one JSON file per key under a root directory.
pub struct FsDraftStore {
    root: PathBuf,
}

impl FsDraftStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, student_id: &str, test_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", draft_key(student_id, test_id)))
    }
}

#[async_trait]
impl DraftStore for FsDraftStore {
    async fn load(&self, student_id: &str, test_id: &str) -> Option<AnswerDraft> {
        let path = self.path_for(student_id, test_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "Failed to read draft file");
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(draft) => Some(draft),
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "Discarding unparsable draft");
                None
            }
        }
    }

    async fn save(&self, student_id: &str, test_id: &str, draft: &AnswerDraft) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create draft directory {}", self.root.display()))?;

        let path = self.path_for(student_id, test_id);
        let bytes = serde_json::to_vec(draft).context("serialize draft")?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("write draft file {}", path.display()))?;
        Ok(())
    }

    async fn clear(&self, student_id: &str, test_id: &str) -> Result<()> {
        let path = self.path_for(student_id, test_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("remove draft file {}", path.display()))
            }
        }
    }
}

/// In-memory draft store for embedding applications and tests. Entries are
/// kept as raw JSON so failure paths can plant corrupt payloads.
#[derive(Default)]
pub struct MemoryDraftStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_raw(&self, student_id: &str, test_id: &str, raw: impl Into<String>) {
        let mut entries = self.entries.lock().expect("draft store lock");
        entries.insert(draft_key(student_id, test_id), raw.into());
    }

    pub fn contains(&self, student_id: &str, test_id: &str) -> bool {
        let entries = self.entries.lock().expect("draft store lock");
        entries.contains_key(&draft_key(student_id, test_id))
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn load(&self, student_id: &str, test_id: &str) -> Option<AnswerDraft> {
        let key = draft_key(student_id, test_id);
        let raw = {
            let entries = self.entries.lock().expect("draft store lock");
            entries.get(&key).cloned()
        }?;

        match serde_json::from_str(&raw) {
            Ok(draft) => Some(draft),
            Err(err) => {
                tracing::warn!(error = %err, key = %key, "Discarding unparsable draft");
                None
            }
        }
    }

    async fn save(&self, student_id: &str, test_id: &str, draft: &AnswerDraft) -> Result<()> {
        let raw = serde_json::to_string(draft).context("serialize draft")?;
        let mut entries = self.entries.lock().expect("draft store lock");
        entries.insert(draft_key(student_id, test_id), raw);
        Ok(())
    }

    async fn clear(&self, student_id: &str, test_id: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("draft store lock");
        entries.remove(&draft_key(student_id, test_id));
        Ok(())
    }
}
