use crate::error::{PmaError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `data` through a tempfile in the same directory, then rename.
/// A crash mid-write leaves the previous project file intact.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read a `.pma/` YAML file. A missing file means `pma init` has not run.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(PmaError::NotInitialized);
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&data)?)
}

pub fn save_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_yaml::to_string(value)?;
    atomic_write(path, data.as_bytes())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}
