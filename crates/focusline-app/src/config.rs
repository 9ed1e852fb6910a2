use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use focusline_core::{StreakPolicy, UndoPolicy};
use serde::Deserialize;

/// Directory holding focusline files inside a workspace.
pub const CONFIG_DIR: &str = ".focusline";
const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration loaded from `.focusline/config.toml`.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FocusConfig {
    /// Streak counting rules.
    #[serde(default)]
    pub streak: StreakConfig,
    /// Undo history behaviour.
    #[serde(default)]
    pub undo: UndoConfig,
    /// Reminder scheduling.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl FocusConfig {
    /// Load configuration from the nearest ancestor of `start` that has a
    /// `.focusline` directory. Falls back to defaults when none exists.
    ///
    /// # Errors
    /// Returns an error when the config file exists but cannot be read or is invalid.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        match find_root(start.as_ref()) {
            Some(root) => Self::from_workdir(root),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a known workspace directory.
    ///
    /// # Errors
    /// Returns an error when the config file exists but cannot be read or is invalid.
    pub fn from_workdir(workdir: impl AsRef<Path>) -> Result<Self> {
        let config_path = workdir.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("failed to load {}", config_path.display()))
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    /// Returns an error for malformed TOML, unknown keys or out-of-range values.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.undo.validate()
    }
}

/// Nearest ancestor of `start` (inclusive) containing a `.focusline` directory.
#[must_use]
pub fn find_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(CONFIG_DIR).is_dir())
        .map(Path::to_path_buf)
}

/// `[streak]` block.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StreakConfig {
    /// Whether a skipped day ends a streak.
    #[serde(default = "default_true")]
    pub skipped_breaks_streak: bool,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            skipped_breaks_streak: true,
        }
    }
}

impl StreakConfig {
    /// Policy handed to the ledger.
    #[must_use]
    pub const fn policy(self) -> StreakPolicy {
        StreakPolicy {
            skipped_breaks_streak: self.skipped_breaks_streak,
        }
    }
}

/// `[undo]` block.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UndoConfig {
    /// Number of undo entries kept.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Mutations allowed between an action and its undo.
    #[serde(default)]
    pub max_intervening: u64,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            max_intervening: 0,
        }
    }
}

impl UndoConfig {
    /// Policy handed to the queue.
    #[must_use]
    pub const fn policy(self) -> UndoPolicy {
        UndoPolicy {
            max_intervening: self.max_intervening,
        }
    }

    fn validate(self) -> Result<()> {
        if self.history_limit == 0 {
            bail!("undo.history_limit must be at least 1");
        }
        if self.max_intervening >= self.history_limit as u64 {
            bail!(
                "undo.max_intervening ({}) must be smaller than undo.history_limit ({})",
                self.max_intervening,
                self.history_limit
            );
        }
        Ok(())
    }
}

/// `[notifications]` block.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    /// Whether reminders are scheduled at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_history_limit() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(root: &Path, body: &str) -> Result<()> {
        let cfg_dir = root.join(CONFIG_DIR);
        fs::create_dir_all(&cfg_dir)?;
        let mut file = fs::File::create(cfg_dir.join(CONFIG_FILE))?;
        writeln!(file, "{body}")?;
        Ok(())
    }

    #[test]
    fn missing_config_returns_defaults() -> Result<()> {
        let dir = tempdir()?;
        let cfg = FocusConfig::from_workdir(dir.path())?;
        assert_eq!(cfg, FocusConfig::default());
        assert!(cfg.streak.skipped_breaks_streak);
        assert_eq!(cfg.undo.history_limit, 20);
        assert_eq!(cfg.undo.max_intervening, 0);
        assert!(cfg.notifications.enabled);
        Ok(())
    }

    #[test]
    fn load_config_with_all_blocks() -> Result<()> {
        let dir = tempdir()?;
        write_config(
            dir.path(),
            "[streak]\nskipped_breaks_streak = false\n\n[undo]\nhistory_limit = 5\nmax_intervening = 2\n\n[notifications]\nenabled = false",
        )?;

        let cfg = FocusConfig::from_workdir(dir.path())?;
        assert!(!cfg.streak.policy().skipped_breaks_streak);
        assert_eq!(cfg.undo.history_limit, 5);
        assert_eq!(cfg.undo.policy().max_intervening, 2);
        assert!(!cfg.notifications.enabled);
        Ok(())
    }

    #[test]
    fn discover_walks_up_to_the_workspace() -> Result<()> {
        let dir = tempdir()?;
        write_config(dir.path(), "[undo]\nhistory_limit = 3")?;
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested)?;

        let cfg = FocusConfig::discover(&nested)?;
        assert_eq!(cfg.undo.history_limit, 3);
        assert_eq!(find_root(&nested).as_deref(), Some(dir.path()));
        Ok(())
    }

    #[test]
    fn zero_history_limit_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        write_config(dir.path(), "[undo]\nhistory_limit = 0")?;

        let Err(err) = FocusConfig::from_workdir(dir.path()) else {
            panic!("zero history limit should error");
        };
        assert!(format!("{err:#}").contains("history_limit must be at least 1"));
        Ok(())
    }

    #[test]
    fn intervening_allowance_must_fit_history() {
        let Err(err) = FocusConfig::from_toml("[undo]\nhistory_limit = 2\nmax_intervening = 2") else {
            panic!("allowance larger than history should error");
        };
        assert!(err.to_string().contains("must be smaller than"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FocusConfig::from_toml("[streak]\nbreaks = true").is_err());
    }
}
