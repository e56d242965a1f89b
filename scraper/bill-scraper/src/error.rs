use std::fmt;
use std::io;
use std::path::PathBuf;

use crawl::FetchError;
use thiserror::Error;

/// A page did not have the table layout the parser expects.
#[derive(Debug, Error)]
#[error("unexpected page structure at {page}: {reason}")]
pub struct ParseError {
    pub page: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(page: impl Into<String>, reason: impl Into<String>) -> Self {
        ParseError {
            page: page.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("csv error on {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path} line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Step of a synchronization run, used to say where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchSessions,
    RefreshBills,
    RefreshStatuses,
}

impl Stage {
    /// Failing here leaves the session list already saved for this run.
    pub fn leaves_partial_snapshot(&self) -> bool {
        !matches!(self, Stage::FetchSessions)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::FetchSessions => write!(f, "fetching sessions"),
            Stage::RefreshBills => write!(f, "refreshing bills"),
            Stage::RefreshStatuses => write!(f, "refreshing statuses"),
        }
    }
}

#[derive(Debug, Error)]
#[error("sync failed while {stage}: {source}")]
pub struct SyncError {
    pub stage: Stage,
    #[source]
    pub source: SourceError,
}

impl SyncError {
    pub fn at(stage: Stage) -> impl FnOnce(SourceError) -> SyncError {
        move |source| SyncError { stage, source }
    }
}
