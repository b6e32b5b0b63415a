//! One ephemeral resolution attempt and its scratch resources.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::corpus::Corpus;
use crate::core::errors::{DexprintError, Result};

/// Exclusive scratch area for a single resolution attempt.
///
/// The directory `<scratch_root>/<uuid>` is created when the session opens
/// and removed when the session is dropped, whatever the outcome.
#[derive(Debug)]
pub struct MatchSession {
    id: Uuid,
    scratch_dir: PathBuf,
}

impl MatchSession {
    /// Open a session with a freshly named scratch directory.
    pub fn open(scratch_root: &Path) -> Result<Self> {
        fs::create_dir_all(scratch_root).map_err(|e| {
            DexprintError::io(
                format!("Failed to create scratch root {}", scratch_root.display()),
                e,
            )
        })?;

        let id = Uuid::new_v4();
        let scratch_dir = scratch_root.join(id.to_string());
        fs::create_dir(&scratch_dir).map_err(|e| {
            let message = if e.kind() == ErrorKind::AlreadyExists {
                format!("Scratch directory {} is already in use", scratch_dir.display())
            } else {
                format!("Failed to create scratch directory {}", scratch_dir.display())
            };
            DexprintError::io(message, e)
        })?;

        debug!("Opened match session {id}");
        Ok(Self { id, scratch_dir })
    }

    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Scratch directory owned by this session
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Fresh working context over a corpus, valid for this session only.
    pub fn context<'s, 'c>(&'s self, corpus: &'c Corpus) -> MatchContext<'s, 'c> {
        MatchContext {
            session: self,
            corpus,
        }
    }
}

impl Drop for MatchSession {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.scratch_dir) {
            Ok(()) => debug!("Closed match session {}", self.id),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove scratch directory {}: {}",
                self.scratch_dir.display(),
                e
            ),
        }
    }
}

/// Working context handed to a match primitive for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'s, 'c> {
    session: &'s MatchSession,
    corpus: &'c Corpus,
}

impl<'s, 'c> MatchContext<'s, 'c> {
    /// Corpus the attempt runs against
    pub fn corpus(&self) -> &'c Corpus {
        self.corpus
    }

    /// Session identifier
    pub fn session_id(&self) -> Uuid {
        self.session.id
    }

    /// Scratch directory the primitive may write into
    pub fn scratch_dir(&self) -> &'s Path {
        &self.session.scratch_dir
    }
}
