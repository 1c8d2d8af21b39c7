use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::task::Task;

/// Storage key of the main task collection.
pub const TASKS_KEY: &str = "nowtask_tasks";

/// Whole-collection storage: readers get a snapshot, writers replace it.
pub trait CollectionStore {
    fn get(&self, key: &str) -> anyhow::Result<Vec<Task>>;
    fn set(&self, key: &str, tasks: &[Task]) -> anyhow::Result<()>;
}

/// One `<key>.jsonl` file per collection under a data directory.
#[derive(Debug)]
pub struct JsonlStore {
    pub data_dir: PathBuf,
}

impl JsonlStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened collection store");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(anyhow!("invalid collection key: {key:?}"));
        }
        Ok(self.data_dir.join(format!("{key}.jsonl")))
    }
}

impl CollectionStore for JsonlStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Vec<Task>> {
        let path = self.path_for(key)?;
        load_jsonl(&path).with_context(|| format!("failed to load collection {key}"))
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    fn set(&self, key: &str, tasks: &[Task]) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        save_jsonl_atomic(&path, tasks).with_context(|| format!("failed to save collection {key}"))
    }
}

/// Process-local store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Task>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(key: &str, tasks: Vec<Task>) -> Self {
        let store = Self::default();
        store
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), tasks);
        store
    }
}

impl CollectionStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Vec<Task>> {
        let collections = self.collections.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(collections.get(key).cloned().unwrap_or_default())
    }

    fn set(&self, key: &str, tasks: &[Task]) -> anyhow::Result<()> {
        debug!(key, count = tasks.len(), "replacing in-memory collection");
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), tasks.to_vec());
        Ok(())
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(file = %path.display(), "collection file missing; starting empty");
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to open {}", path.display()));
        }
    };
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: Task = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
