//! Durable single-slot store for the active session.
//!
//! The session is mutated on every set edit during a workout, so it lives
//! in a plain JSON file outside the relational store: no transaction is
//! needed for a whole-value replace, and a write-through on every change
//! means a restart never loses in-progress data.

use std::path::PathBuf;

use entreno_domain::{
    ReadError, SessionRepository, StorageError, UpdateError, WorkoutSession,
};

pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn storage_error(err: impl std::fmt::Display) -> StorageError {
    StorageError::Transaction(err.to_string())
}

impl SessionRepository for FileSessionStore {
    async fn read_active_session(&self) -> Result<Option<WorkoutSession>, ReadError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ReadError::Storage(storage_error(err))),
        };
        let session =
            serde_json::from_str(&content).map_err(|err| ReadError::Storage(storage_error(err)))?;
        Ok(Some(session))
    }

    async fn write_active_session(
        &self,
        session: Option<WorkoutSession>,
    ) -> Result<(), UpdateError> {
        match session {
            Some(session) => {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|err| UpdateError::Storage(storage_error(err)))?;
                }
                let content = serde_json::to_string(&session)
                    .map_err(|err| UpdateError::Storage(storage_error(err)))?;
                std::fs::write(&self.path, content)
                    .map_err(|err| UpdateError::Storage(storage_error(err)))?;
            }
            None => match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(UpdateError::Storage(storage_error(err))),
            },
        }
        Ok(())
    }
}
