//! Flat key/value configuration store grouped by section. Reads and
//! writes are whole-section operations; the game thread re-reads settings
//! on demand to pick up external edits without a restart. See
//! `SPEC_FULL.md` §3 (Ambient stack, Configuration) and §6 (Config store).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A section's contents: flat key/value pairs, serialized as a TOML table.
pub type Section = toml::value::Table;

pub const SECTION_GAME: &str = "game";
pub const SECTION_PLAYER_1: &str = "player1";
pub const SECTION_PLAYER_2: &str = "player2";
pub const SECTION_SYSTEM: &str = "system";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serializing config file: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// The whole on-disk store, held as a map of section name to section table.
pub struct ConfigStore {
    path: PathBuf,
    sections: BTreeMap<String, Section>,
}

impl ConfigStore {
    /// Load from `path`, or start empty if the file doesn't exist yet.
    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let sections = if path.exists() {
            let text = fs::read_to_string(&path)?;
            toml::from_str(&text)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, sections })
    }

    /// Re-read the store from disk, discarding in-memory changes that were
    /// never persisted. Supports external hot reload (§6).
    pub fn reload(&mut self) -> ConfigResult<()> {
        let reloaded = Self::load(&self.path)?;
        self.sections = reloaded.sections;
        Ok(())
    }

    pub fn get_section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Replace a whole section and persist the change immediately.
    pub fn set_section(&mut self, name: &str, data: Section) -> ConfigResult<()> {
        self.sections.insert(name.to_string(), data);
        self.persist()
    }

    fn persist(&self) -> ConfigResult<()> {
        let text = toml::to_string_pretty(&self.sections)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, text)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toml::Value;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("centaur-config-test-{name}-{}.toml", std::process::id()))
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = ConfigStore::load(temp_path("missing")).unwrap();
        assert!(store.get_section(SECTION_GAME).is_none());
    }

    #[test]
    fn set_section_persists_and_reloads() {
        let path = temp_path("roundtrip");
        let mut store = ConfigStore::load(&path).unwrap();

        let mut player1 = Section::new();
        player1.insert("name".into(), Value::String("Human".into()));
        player1.insert("elo".into(), Value::Integer(1500));
        store.set_section(SECTION_PLAYER_1, player1.clone()).unwrap();

        let mut reloaded = ConfigStore::load(&path).unwrap();
        assert_eq!(reloaded.get_section(SECTION_PLAYER_1), Some(&player1));

        reloaded.reload().unwrap();
        assert_eq!(reloaded.get_section(SECTION_PLAYER_1), Some(&player1));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn reload_picks_up_external_edits() {
        let path = temp_path("external-edit");
        let mut store = ConfigStore::load(&path).unwrap();
        let mut system = Section::new();
        system.insert("developer_mode".into(), Value::Boolean(false));
        store.set_section(SECTION_SYSTEM, system).unwrap();

        // Simulate an external process editing the file directly.
        let text = fs::read_to_string(&path).unwrap();
        let mut edited: BTreeMap<String, Section> = toml::from_str(&text).unwrap();
        edited
            .get_mut(SECTION_SYSTEM)
            .unwrap()
            .insert("developer_mode".into(), Value::Boolean(true));
        fs::write(&path, toml::to_string_pretty(&edited).unwrap()).unwrap();

        store.reload().unwrap();
        let system = store.get_section(SECTION_SYSTEM).unwrap();
        assert_eq!(system.get("developer_mode"), Some(&Value::Boolean(true)));

        let _ = fs::remove_file(&path);
    }
}
