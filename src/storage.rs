//! Save persistence for Abyss level instances.
//!
//! Saved levels are stored per master seed, one file per Abyss level:
//! `{base_dir}/abyss_{seed}/level_{n}.bin`

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::abyss::SavedAbyss;
use crate::error::{AbyssError, Result};

/// Storage manager for saved Abyss levels
pub struct AbyssStorage {
    base_dir: PathBuf,
    seed: u64,
}

impl AbyssStorage {
    /// Create a storage manager rooted at `base_dir` for the given master seed
    pub fn new<P: AsRef<Path>>(base_dir: P, seed: u64) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            seed,
        }
    }

    fn seed_dir(&self) -> PathBuf {
        self.base_dir.join(format!("abyss_{}", self.seed))
    }

    fn level_path(&self, level: u32) -> PathBuf {
        self.seed_dir().join(format!("level_{}.bin", level))
    }

    pub fn exists(&self, level: u32) -> bool {
        self.level_path(level).exists()
    }

    /// Save a level with bincode, replacing any previous save
    pub fn save(&self, saved: &SavedAbyss) -> Result<PathBuf> {
        fs::create_dir_all(self.seed_dir())?;

        let path = self.level_path(saved.progress.abyss_level);
        let writer = BufWriter::new(File::create(&path)?);
        bincode::serialize_into(writer, saved).map_err(|e| AbyssError::Serialization(e.to_string()))?;

        info!(path = %path.display(), depth = saved.state.depth, "saved abyss level");
        Ok(path)
    }

    /// Load a level. Returns `None` if it was never saved.
    pub fn load(&self, level: u32) -> Result<Option<SavedAbyss>> {
        let path = self.level_path(level);
        if !path.exists() {
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&path)?);
        let saved: SavedAbyss =
            bincode::deserialize_from(reader).map_err(|e| AbyssError::Deserialization(e.to_string()))?;
        if saved.state.seed != self.seed {
            return Err(AbyssError::Deserialization(format!(
                "{} belongs to seed {}, not {}",
                path.display(),
                saved.state.seed,
                self.seed
            )));
        }
        info!(path = %path.display(), depth = saved.state.depth, "loaded abyss level");
        Ok(Some(saved))
    }

    /// Delete a saved level (if it exists)
    pub fn delete(&self, level: u32) -> Result<()> {
        let path = self.level_path(level);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Levels saved for this seed, in ascending order
    pub fn list_levels(&self) -> Result<Vec<u32>> {
        let dir = self.seed_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut levels = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let level = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix("level_"))
                .and_then(|n| n.parse().ok());
            if let Some(level) = level {
                levels.push(level);
            }
        }
        levels.sort_unstable();
        Ok(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abyss::{Abyss, GameProgress};
    use crate::config::AbyssConfig;
    use crate::layout::Layout;
    use crate::population::Roster;
    use crate::terrain::Feature;
    use tempfile::tempdir;

    fn saved_level(level: u32) -> SavedAbyss {
        let config = AbyssConfig { entry_exit: false, familiar_layout: false, ..AbyssConfig::default() };
        let mut abyss = Abyss::with_layout(config, 12345, Layout::Plain(Feature::Floor))
            .unwrap()
            .with_progress(GameProgress { abyss_level: level, has_rune: false });
        abyss.enter_fresh(&mut Roster::new()).unwrap();
        abyss.to_saved()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let storage = AbyssStorage::new(dir.path(), 12345);

        let saved = saved_level(2);
        storage.save(&saved).unwrap();
        assert!(storage.exists(2));
        assert!(!storage.exists(3));

        let loaded = storage.load(2).unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempdir().unwrap();
        let storage = AbyssStorage::new(dir.path(), 12345);
        storage.save(&saved_level(3)).unwrap();
        storage.save(&saved_level(1)).unwrap();
        assert_eq!(storage.list_levels().unwrap(), vec![1, 3]);

        storage.delete(1).unwrap();
        assert_eq!(storage.list_levels().unwrap(), vec![3]);
        assert!(storage.load(1).unwrap().is_none());
    }

    #[test]
    fn test_other_seed_is_rejected() {
        let dir = tempdir().unwrap();
        let saved = saved_level(1);
        let path = AbyssStorage::new(dir.path(), 12345).save(&saved).unwrap();

        let other = AbyssStorage::new(dir.path(), 999);
        fs::create_dir_all(path.parent().unwrap().with_file_name("abyss_999")).unwrap();
        fs::copy(&path, other.level_path(1)).unwrap();
        assert!(matches!(other.load(1), Err(AbyssError::Deserialization(_))));
    }
}
