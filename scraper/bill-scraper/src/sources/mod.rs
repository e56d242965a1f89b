//! Live-site adapters for the three datasets.
//!
//! Each adapter fetches one kind of page, hands the body to a pure parse
//! function, and reads/writes its own snapshot file.

use async_trait::async_trait;
use scraper::{ElementRef, Selector};

use crate::error::{ParseError, SourceError};
use crate::model::{Bill, Session, Status};

pub mod bills;
pub mod sessions;
pub mod statuses;

pub use bills::BillPages;
pub use sessions::SessionPages;
pub use statuses::StatusPages;

#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Sessions in the order the site lists them; the last one is the most recent.
    async fn fetch_live(&self) -> Result<Vec<Session>, SourceError>;
    fn read_persisted(&self) -> Result<Vec<Session>, SourceError>;
    fn write(&self, sessions: &[Session]) -> Result<(), SourceError>;
}

#[async_trait]
pub trait BillSource: Send + Sync {
    async fn fetch_live(&self, session: &Session) -> Result<Vec<Bill>, SourceError>;
    fn read_persisted(&self) -> Result<Vec<Bill>, SourceError>;
    fn write(&self, bills: &[Bill]) -> Result<(), SourceError>;
}

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_live(&self, bill: &Bill) -> Result<Vec<Status>, SourceError>;
    fn read_persisted(&self) -> Result<Vec<Status>, SourceError>;
    fn write(&self, statuses: &[Status]) -> Result<(), SourceError>;
}

fn selector(page: &str, css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|err| ParseError::new(page, format!("invalid selector {css:?}: {err}")))
}

/// `td` cells of a table row; header rows come back empty.
fn cells<'a>(row: &ElementRef<'a>, td: &Selector) -> Vec<ElementRef<'a>> {
    row.select(td).collect()
}
