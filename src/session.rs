//! Lifetime of the on-disk extraction directory.

use std::io;
use std::path::Path;

use tempfile::TempDir;

use crate::error::PlayerError;

/// Temporary directory that holds the extracted frame stills.
///
/// `teardown` removes the directory at most once; later calls are no-ops.
/// Dropping an untorn-down workspace still deletes the directory, so early
/// exits cannot leave stills behind.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
}

impl Workspace {
    pub fn create() -> Result<Self, PlayerError> {
        let dir = tempfile::Builder::new()
            .prefix("telecine-")
            .tempdir()
            .map_err(|err| {
                PlayerError::Extraction(format!("failed to create extraction directory: {err}"))
            })?;
        Ok(Self { dir: Some(dir) })
    }

    /// None once the workspace has been torn down.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    pub fn teardown(&mut self) -> Result<(), PlayerError> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        match dir.close() {
            Ok(()) => Ok(()),
            // Already gone counts as removed.
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PlayerError::Cleanup(err)),
        }
    }
}
