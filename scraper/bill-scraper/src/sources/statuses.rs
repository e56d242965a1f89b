use std::sync::Arc;

use async_trait::async_trait;
use crawl::utils::clean_text;
use crawl::ScrapingClient;
use scraper::Html;

use super::{cells, selector, StatusSource};
use crate::error::{ParseError, SourceError};
use crate::model::{Bill, Status};
use crate::store::SnapshotStore;

pub const STATUS_URL_SUFFIX: &str = "/status";

/// Per-bill status history pages.
pub struct StatusPages {
    client: Arc<ScrapingClient>,
    store: SnapshotStore,
}

impl StatusPages {
    pub fn new(client: Arc<ScrapingClient>, store: SnapshotStore) -> Self {
        StatusPages { client, store }
    }
}

pub fn status_url(bill: &Bill) -> String {
    format!("{}{}", bill.url.trim_end_matches('/'), STATUS_URL_SUFFIX)
}

#[async_trait]
impl StatusSource for StatusPages {
    async fn fetch_live(&self, bill: &Bill) -> Result<Vec<Status>, SourceError> {
        let url = status_url(bill);
        let content = self.client.get_text(&url).await?;
        Ok(parse_statuses(&content, &url, bill)?)
    }

    fn read_persisted(&self) -> Result<Vec<Status>, SourceError> {
        Ok(self.store.read_statuses()?)
    }

    fn write(&self, statuses: &[Status]) -> Result<(), SourceError> {
        Ok(self.store.write_statuses(statuses)?)
    }
}

pub fn parse_statuses(content: &str, page: &str, bill: &Bill) -> Result<Vec<Status>, ParseError> {
    let document = Html::parse_document(content);
    let table_selector = selector(page, "table")?;
    let row_selector = selector(page, "tr")?;
    let cell_selector = selector(page, "td")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| ParseError::new(page, "no status table"))?;

    let mut statuses = Vec::new();
    for row in table.select(&row_selector) {
        let cols = cells(&row, &cell_selector);
        if cols.is_empty() {
            continue;
        }
        if cols.len() < 4 {
            return Err(ParseError::new(
                page,
                format!("status row has {} cells, expected 4", cols.len()),
            ));
        }

        let text = |i: usize| clean_text(&cols[i].text().collect::<String>());
        statuses.push(Status {
            session_name: bill.session_name.clone(),
            bill_number: bill.bill_number.clone(),
            bill_title: bill.bill_title.clone(),
            date: text(0),
            stage: text(1),
            activity: text(2),
            committee: text(3),
        });
    }

    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bill() -> Bill {
        Bill {
            session_name: "43rd Parliament, Session 1".to_string(),
            bill_number: "Bill 23".to_string(),
            bill_title: "More Homes Built Faster Act, 2022".to_string(),
            url: "https://www.ola.org/en/legislative-business/bills/parliament-43/session-1/bill-23/".to_string(),
            sponsors: Vec::new(),
        }
    }

    #[test]
    fn status_page_hangs_off_the_bill_url() {
        assert_eq!(
            status_url(&bill()),
            "https://www.ola.org/en/legislative-business/bills/parliament-43/session-1/bill-23/status"
        );
    }

    #[test]
    fn parses_history_rows_in_page_order() {
        let html = r#"<html><body><table>
            <tr><th>Date</th><th>Bill stage</th><th>Event</th><th>Outcome/Committee</th></tr>
            <tr><td>October 25, 2022</td><td>First Reading</td><td>Carried</td><td></td></tr>
            <tr><td>November 3, 2022</td><td>Second Reading</td><td>Referred to committee</td><td>Standing Committee on Heritage, Infrastructure and Cultural Policy</td></tr>
        </table></body></html>"#;

        let statuses = parse_statuses(html, &status_url(&bill()), &bill()).unwrap();

        assert_eq!(statuses.len(), 2);
        assert_eq!(
            statuses[0],
            Status {
                session_name: "43rd Parliament, Session 1".to_string(),
                bill_number: "Bill 23".to_string(),
                bill_title: "More Homes Built Faster Act, 2022".to_string(),
                date: "October 25, 2022".to_string(),
                stage: "First Reading".to_string(),
                activity: "Carried".to_string(),
                committee: String::new(),
            }
        );
        assert_eq!(
            statuses[1].committee,
            "Standing Committee on Heritage, Infrastructure and Cultural Policy"
        );
    }

    #[test]
    fn missing_table_is_a_parse_error() {
        let page = status_url(&bill());
        let err = parse_statuses("<html><body></body></html>", &page, &bill()).unwrap_err();
        assert_eq!(err.page, page);
        assert_eq!(err.reason, "no status table");
    }
}
