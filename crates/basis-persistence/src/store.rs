//! JSON state file.
//!
//! One file per bot process. Every save rewrites the whole record through
//! a temporary sibling file and a rename, so a crash mid-write leaves the
//! previous record intact. Concurrent processes must not share a file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{PersistenceError, PersistenceResult};
use crate::state::{PositionState, StateRecord};

/// Reads and overwrites the persisted position state.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state of `symbol`.
    ///
    /// A missing file, or one that is not valid JSON, yields an empty
    /// state. Any other read failure is returned, as is a file written
    /// for a different symbol.
    pub fn load(&self, symbol: &str) -> PersistenceResult<PositionState> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No state file, starting flat");
                return Ok(PositionState::empty(symbol));
            }
            Err(e) => return Err(e.into()),
        };

        let record: StateRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    ?e,
                    "State file is not valid JSON, starting flat"
                );
                return Ok(PositionState::empty(symbol));
            }
        };

        if let Some(found) = record.symbol.as_deref() {
            if found != symbol {
                return Err(PersistenceError::SymbolMismatch {
                    expected: symbol.to_string(),
                    found: found.to_string(),
                });
            }
        }

        let state = PositionState::from_record(symbol, record);
        info!(
            path = %self.path.display(),
            open = state.is_open(),
            qty = %state.hedge.qty(),
            direction = %state.last_direction,
            "Loaded position state"
        );
        Ok(state)
    }

    /// Overwrite the state file with `state`.
    pub fn save(&self, state: &PositionState) -> PersistenceResult<()> {
        let bytes = serde_json::to_vec_pretty(&state.to_record())?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), open = state.is_open(), "Saved position state");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
