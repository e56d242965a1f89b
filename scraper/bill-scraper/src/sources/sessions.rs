use std::sync::Arc;

use async_trait::async_trait;
use crawl::utils::{absolute_url, clean_text};
use crawl::ScrapingClient;
use scraper::Html;

use super::{cells, selector, SessionSource};
use crate::error::{ParseError, SourceError};
use crate::model::Session;
use crate::store::SnapshotStore;

const SESSION_TABLE: &str = "#block-de-theme-content > article > div > div > table";

/// The bills landing page, which lists every session with its dates.
pub struct SessionPages {
    client: Arc<ScrapingClient>,
    store: SnapshotStore,
    root_url: String,
    index_url: String,
}

impl SessionPages {
    pub fn new(client: Arc<ScrapingClient>, store: SnapshotStore, root_url: &str, index_url: &str) -> Self {
        SessionPages {
            client,
            store,
            root_url: root_url.to_string(),
            index_url: index_url.to_string(),
        }
    }
}

#[async_trait]
impl SessionSource for SessionPages {
    async fn fetch_live(&self) -> Result<Vec<Session>, SourceError> {
        let content = self.client.get_text(&self.index_url).await?;
        Ok(parse_sessions(&content, &self.index_url, &self.root_url)?)
    }

    fn read_persisted(&self) -> Result<Vec<Session>, SourceError> {
        Ok(self.store.read_sessions()?)
    }

    fn write(&self, sessions: &[Session]) -> Result<(), SourceError> {
        Ok(self.store.write_sessions(sessions)?)
    }
}

pub fn parse_sessions(content: &str, page: &str, root_url: &str) -> Result<Vec<Session>, ParseError> {
    let document = Html::parse_document(content);
    let table_selector = selector(page, SESSION_TABLE)?;
    let row_selector = selector(page, "tr")?;
    let cell_selector = selector(page, "td")?;
    let link_selector = selector(page, "a")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| ParseError::new(page, "no session table"))?;

    let mut sessions = Vec::new();
    for row in table.select(&row_selector) {
        let cols = cells(&row, &cell_selector);
        if cols.is_empty() {
            continue;
        }
        if cols.len() < 3 {
            return Err(ParseError::new(
                page,
                format!("session row has {} cells, expected 3", cols.len()),
            ));
        }

        let link = cols[0]
            .select(&link_selector)
            .next()
            .ok_or_else(|| ParseError::new(page, "session row without a link"))?;
        let href = link
            .value()
            .attr("href")
            .ok_or_else(|| ParseError::new(page, "session link without href"))?;

        sessions.push(Session {
            name: clean_text(&link.text().collect::<String>()),
            url: absolute_url(root_url, href),
            start_date: clean_text(&cols[1].text().collect::<String>()),
            end_date: clean_text(&cols[2].text().collect::<String>()),
        });
    }

    // An empty listing would read as every session having been removed.
    if sessions.is_empty() {
        return Err(ParseError::new(page, "session table has no rows"));
    }

    Ok(sessions)
}
