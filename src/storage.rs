use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use tracing::debug;

use crate::domain::{Ledger, Session, SessionError, StopOutcome};

const TEMP_SUFFIX_LEN: usize = 8;

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Corrupt { path: PathBuf, source: serde_json::Error },
    Encode(serde_json::Error),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::Corrupt { path, source } => write!(
                f,
                "state file {} is corrupt and was left untouched: {source}",
                path.display()
            ),
            StorageError::Encode(err) => write!(f, "failed to encode state: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

/// Error from a store transition: either the user asked for something the
/// session state refuses, or the state file could not be read or written.
#[derive(Debug)]
pub enum StoreError {
    Session(SessionError),
    Storage(StorageError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Session(err) => write!(f, "{err}"),
            StoreError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<SessionError> for StoreError {
    fn from(err: SessionError) -> Self {
        StoreError::Session(err)
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::Storage(err)
    }
}

pub fn load_ledger(path: &Path) -> Result<Ledger, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Ledger::new()),
        Err(err) => return Err(StorageError::Io(err)),
    };

    if raw.trim().is_empty() {
        return Ok(Ledger::new());
    }

    serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_ledger(path: &Path, ledger: &Ledger) -> Result<(), StorageError> {
    let mut encoded = serde_json::to_string_pretty(ledger).map_err(StorageError::Encode)?;
    encoded.push('\n');
    write_atomic(path, encoded.as_bytes())?;
    debug!(path = %path.display(), days = ledger.days.len(), "saved state");
    Ok(())
}

/// Writes to a sibling temp file and renames it over `path`, so readers see
/// either the old content or the new content.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_sibling(path);
    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMP_SUFFIX_LEN)
        .map(char::from)
        .collect();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    path.with_file_name(format!(".{file_name}.{suffix}.tmp"))
}

/// Load-modify-save wrapper around a state file. Each transition reloads the
/// file and only writes it back on success. There is no lock across
/// processes, so two concurrent invocations can lose an update.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Ledger, StorageError> {
        load_ledger(&self.path)
    }

    pub fn save(&self, ledger: &Ledger) -> Result<(), StorageError> {
        save_ledger(&self.path, ledger)
    }

    pub fn start(&self, category: &str, now: DateTime<Utc>) -> Result<Session, StoreError> {
        let mut ledger = self.load()?;
        let session = ledger.start(category, now)?.clone();
        self.save(&ledger)?;
        Ok(session)
    }

    /// Returns the outcome together with the committed ledger so callers can
    /// report on it without reading the file again.
    pub fn stop(&self, now: DateTime<Utc>) -> Result<(StopOutcome, Ledger), StoreError> {
        let mut ledger = self.load()?;
        let outcome = ledger.stop(now)?;
        self.save(&ledger)?;
        Ok((outcome, ledger))
    }
}
