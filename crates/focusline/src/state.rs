//! JSON state file under `.focusline/state.json`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use focusline_app::config::CONFIG_DIR;
use focusline_app::{FocusConfig, FocusService, MemoryTaskStore, UndoHistory};
use focusline_core::{FocusQueue, Task};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

const STATE_FILE: &str = "state.json";

/// Everything the CLI keeps between runs.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    queue: FocusQueue,
    #[serde(default)]
    history: UndoHistory,
}

impl StateFile {
    fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(STATE_FILE)
    }

    /// Read the state of the workspace at `root`; empty when none was saved yet.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Write atomically, creating `.focusline/` when needed.
    pub fn save(&self, root: &Path) -> Result<()> {
        let dir = root.join(CONFIG_DIR);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let mut file = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut file, self)?;
        file.write_all(b"\n")?;
        let path = Self::path(root);
        file.persist(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Rebuild a service from the saved snapshot.
    pub fn into_service(self, config: FocusConfig) -> FocusService<MemoryTaskStore> {
        FocusService::new(MemoryTaskStore::from_tasks(self.tasks), config)
            .with_queue(self.queue)
            .with_history(self.history)
    }

    /// Capture what needs saving.
    pub fn from_service(service: FocusService<MemoryTaskStore>) -> Self {
        let (store, queue, history) = service.into_parts();
        Self {
            tasks: store.snapshot(),
            queue,
            history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use focusline_app::CreateTaskInput;
    use tempfile::tempdir;

    #[test]
    fn missing_state_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let state = StateFile::load(dir.path())?;
        assert!(state.tasks.is_empty());
        assert_eq!(state.queue.active_len(), 0);
        Ok(())
    }

    #[test]
    fn state_survives_a_save_and_load() -> Result<()> {
        let dir = tempdir()?;
        let mut service = StateFile::default().into_service(FocusConfig::default());
        let task = service.create_task(CreateTaskInput {
            title: "water plants".into(),
            steps: vec!["kitchen".into()],
            recurrence: None,
        })?;
        service.add_to_queue(task.id, true, None)?;
        StateFile::from_service(service).save(dir.path())?;

        let reloaded = StateFile::load(dir.path())?.into_service(FocusConfig::default());
        assert!(reloaded.queue().contains_task(task.id));
        assert_eq!(reloaded.queue().today_line_index(), 1);
        assert_eq!(reloaded.history().len(), 1);
        Ok(())
    }
}
