//! Scrapes the Legislative Assembly of Ontario bill tracker into three CSV
//! snapshots (sessions, bills, statuses), re-scraping only the sessions that can
//! still have changed since the previous run.

use std::sync::Arc;

use crawl::{FetchError, ScrapingClient};

pub mod config;
pub mod error;
pub mod model;
pub mod sources;
pub mod store;
pub mod sync;

use config::SyncConfig;
use sources::{BillPages, SessionPages, StatusPages};
use sync::{SyncEngine, SyncOptions};

pub type LiveEngine = SyncEngine<SessionPages, BillPages, StatusPages>;

/// Wires the live-site sources to the snapshot files under `config.data_dir`.
pub fn live_engine(config: &SyncConfig) -> Result<LiveEngine, FetchError> {
    let client = Arc::new(ScrapingClient::new(config.client_options())?);
    let store = config.store();

    Ok(SyncEngine::new(
        SessionPages::new(client.clone(), store.clone(), &config.root_url, &config.sessions_url()),
        BillPages::new(client.clone(), store.clone(), &config.root_url),
        StatusPages::new(client, store),
        SyncOptions {
            mode: config.mode,
            progress: config.progress,
        },
    ))
}
