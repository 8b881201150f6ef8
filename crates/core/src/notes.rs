use crate::error::NoteError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

const KEY_PREFIX: &str = "notes_";

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn load(&self, document_key: &str) -> Result<Option<String>, NoteError>;

    async fn save(&self, document_key: &str, text: &str) -> Result<(), NoteError>;
}

pub fn storage_key(document_key: &str) -> String {
    format!("{KEY_PREFIX}{document_key}")
}

#[derive(Default)]
pub struct InMemoryNoteStore {
    entries: RwLock<BTreeMap<String, String>>,
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn load(&self, document_key: &str) -> Result<Option<String>, NoteError> {
        Ok(self
            .entries
            .read()
            .await
            .get(&storage_key(document_key))
            .cloned())
    }

    async fn save(&self, document_key: &str, text: &str) -> Result<(), NoteError> {
        self.entries
            .write()
            .await
            .insert(storage_key(document_key), text.to_string());
        Ok(())
    }
}

pub struct JsonFileNoteStore {
    path: PathBuf,
    guard: RwLock<()>,
}

impl JsonFileNoteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: RwLock::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, NoteError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait]
impl NoteStore for JsonFileNoteStore {
    async fn load(&self, document_key: &str) -> Result<Option<String>, NoteError> {
        let _read = self.guard.read().await;
        Ok(self.read_all().await?.remove(&storage_key(document_key)))
    }

    async fn save(&self, document_key: &str, text: &str) -> Result<(), NoteError> {
        let _write = self.guard.write().await;
        let mut entries = self.read_all().await?;
        entries.insert(storage_key(document_key), text.to_string());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, serde_json::to_string_pretty(&entries)?).await?;
        Ok(())
    }
}
