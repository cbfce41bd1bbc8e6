//! Locked JSON file helpers shared by the on-disk caches.
//!
//! Readers take a shared lock and writers an exclusive one, so a cache being
//! rewritten by one process is never observed half-written by another.

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Read a JSON document; a missing or empty file yields `None`.
pub fn read_json_locked<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    file.lock_shared()?;

    let mut content = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut content);
    file.unlock()?;
    read.with_context(|| format!("Failed to read {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&content)
        .map(Some)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Like [`read_json_locked`], but unreadable or corrupt files degrade to the
/// default value. Callers overwrite them on the next successful save.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read_json_locked(path) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!("Ignoring unreadable cache {}: {:#}", path.display(), e);
            T::default()
        }
    }
}

/// Write a JSON document under an exclusive lock.
pub fn write_json_locked<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(value).context("Failed to serialize cache")?;

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open {} for writing", path.display()))?;
    file.lock_exclusive()?;

    // Truncate under the lock
    let written = file.set_len(0).and_then(|_| {
        let mut writer = std::io::BufWriter::new(&file);
        writer.write_all(content.as_bytes())?;
        writer.flush()
    });
    file.unlock()?;
    written.with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}

/// Read, modify and rewrite a JSON document while holding one exclusive
/// lock, so concurrent updaters never lose each other's changes. A missing,
/// empty or corrupt file starts from the default value.
pub fn update_json_locked<T, R, F>(path: &Path, f: F) -> Result<R>
where
    T: Serialize + DeserializeOwned + Default,
    F: FnOnce(&mut T) -> R,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open {} for update", path.display()))?;
    file.lock_exclusive()?;

    let updated = (|| -> Result<R> {
        let mut content = String::new();
        std::io::BufReader::new(&file).read_to_string(&mut content)?;

        let mut value: T = if content.trim().is_empty() {
            T::default()
        } else {
            serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Replacing unreadable {}: {}", path.display(), e);
                T::default()
            })
        };
        let result = f(&mut value);

        let content = serde_json::to_string_pretty(&value)?;
        file.set_len(0)?;
        (&file).seek(SeekFrom::Start(0))?;
        let mut writer = std::io::BufWriter::new(&file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        Ok(result)
    })();
    file.unlock()?;

    updated.with_context(|| format!("Failed to update {}", path.display()))
}
