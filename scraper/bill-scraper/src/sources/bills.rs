use std::sync::Arc;

use async_trait::async_trait;
use crawl::utils::{absolute_url, clean_text, extract_from_row};
use crawl::ScrapingClient;
use scraper::Html;

use super::{cells, selector, BillSource};
use crate::error::{ParseError, SourceError};
use crate::model::{Bill, Session, Sponsor};
use crate::store::SnapshotStore;

const BILL_TABLE: &str = "table.views-table.views-view-table";
const SPONSOR: &str = "article.node--type-bill-sponsor";
const SPONSOR_NAME: &str = "div.field--name-field-full-name-by-last-name";
const SPONSOR_ROLE: &str = "div.field--name-field-sponsor-role";

/// Per-session bill listings.
pub struct BillPages {
    client: Arc<ScrapingClient>,
    store: SnapshotStore,
    root_url: String,
}

impl BillPages {
    pub fn new(client: Arc<ScrapingClient>, store: SnapshotStore, root_url: &str) -> Self {
        BillPages {
            client,
            store,
            root_url: root_url.to_string(),
        }
    }
}

#[async_trait]
impl BillSource for BillPages {
    async fn fetch_live(&self, session: &Session) -> Result<Vec<Bill>, SourceError> {
        let content = self.client.get_text(&session.url).await?;
        Ok(parse_bills(&content, &session.url, &self.root_url, &session.name)?)
    }

    fn read_persisted(&self) -> Result<Vec<Bill>, SourceError> {
        Ok(self.store.read_bills()?)
    }

    fn write(&self, bills: &[Bill]) -> Result<(), SourceError> {
        Ok(self.store.write_bills(bills)?)
    }
}

pub fn parse_bills(content: &str, page: &str, root_url: &str, session_name: &str) -> Result<Vec<Bill>, ParseError> {
    let document = Html::parse_document(content);
    let table_selector = selector(page, BILL_TABLE)?;
    let row_selector = selector(page, "tbody tr")?;
    let cell_selector = selector(page, "td")?;
    let link_selector = selector(page, "a")?;
    let sponsor_selector = selector(page, SPONSOR)?;
    let name_selector = selector(page, SPONSOR_NAME)?;
    let role_selector = selector(page, SPONSOR_ROLE)?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| ParseError::new(page, "no bill table"))?;

    let mut bills = Vec::new();
    for row in table.select(&row_selector) {
        let cols = cells(&row, &cell_selector);
        if cols.is_empty() {
            continue;
        }
        if cols.len() < 3 {
            return Err(ParseError::new(
                page,
                format!("bill row has {} cells, expected 3", cols.len()),
            ));
        }

        let bill_number = clean_text(&cols[0].text().collect::<String>());
        let link = cols[1]
            .select(&link_selector)
            .next()
            .ok_or_else(|| ParseError::new(page, format!("bill {bill_number} has no link")))?;
        let href = link
            .value()
            .attr("href")
            .ok_or_else(|| ParseError::new(page, format!("bill {bill_number} link has no href")))?;

        let mut sponsors = Vec::new();
        for sponsor in cols[2].select(&sponsor_selector) {
            let name = extract_from_row(&sponsor, &name_selector, None)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| ParseError::new(page, format!("sponsor of bill {bill_number} has no name")))?;
            let title = extract_from_row(&sponsor, &role_selector, None).unwrap_or_default();
            sponsors.push(Sponsor { name, title });
        }

        bills.push(Bill {
            session_name: session_name.to_string(),
            bill_title: clean_text(&link.text().collect::<String>()),
            url: absolute_url(root_url, href),
            bill_number,
            sponsors,
        });
    }

    Ok(bills)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://www.ola.org/en/legislative-business/bills/parliament-43/session-1";
    const SESSION: &str = "43rd Parliament, Session 1";

    fn sponsor(name: &str, role: Option<&str>) -> String {
        let role = role
            .map(|r| format!(r#"<div class="field--name-field-sponsor-role">{r}</div>"#))
            .unwrap_or_default();
        format!(
            r#"<article class="node node--type-bill-sponsor"><div class="field--name-field-full-name-by-last-name">{name}</div>{role}</article>"#
        )
    }

    fn listing(rows: &str) -> String {
        format!(
            r#"<html><body><table class="views-table views-view-table cols-3">
              <thead><tr><th>Bill</th><th>Title</th><th>Sponsors</th></tr></thead>
              <tbody>{rows}</tbody>
            </table></body></html>"#
        )
    }

    #[test]
    fn parses_bills_with_sponsors_in_page_order() {
        let html = listing(&format!(
            r#"<tr><td>Bill 1</td><td><a href="/en/legislative-business/bills/parliament-43/session-1/bill-1">An Act to amend the Highway Traffic Act</a></td><td>{}{}</td></tr>
               <tr><td>Bill 2</td><td><a href="/en/legislative-business/bills/parliament-43/session-1/bill-2">Supply Act, 2022</a></td><td></td></tr>"#,
            sponsor("Ford, Doug", Some("Premier")),
            sponsor("Bethlenfalvy, Peter", None),
        ));

        let bills = parse_bills(&html, PAGE, "https://www.ola.org/", SESSION).unwrap();

        assert_eq!(bills.len(), 2);
        assert_eq!(bills[0].session_name, SESSION);
        assert_eq!(bills[0].bill_number, "Bill 1");
        assert_eq!(bills[0].bill_title, "An Act to amend the Highway Traffic Act");
        assert_eq!(
            bills[0].url,
            "https://www.ola.org/en/legislative-business/bills/parliament-43/session-1/bill-1"
        );
        assert_eq!(
            bills[0].sponsors,
            vec![
                Sponsor {
                    name: "Ford, Doug".to_string(),
                    title: "Premier".to_string()
                },
                Sponsor {
                    name: "Bethlenfalvy, Peter".to_string(),
                    title: String::new()
                },
            ]
        );
        assert!(bills[1].sponsors.is_empty());
    }

    #[test]
    fn session_without_bills_parses_to_nothing() {
        let bills = parse_bills(&listing(""), PAGE, "https://www.ola.org/", SESSION).unwrap();
        assert!(bills.is_empty());
    }

    #[test]
    fn missing_table_is_a_parse_error() {
        let err = parse_bills("<html><body></body></html>", PAGE, "https://www.ola.org/", SESSION).unwrap_err();
        assert_eq!(err.reason, "no bill table");
    }

    #[test]
    fn unnamed_sponsor_is_a_parse_error() {
        let html = listing(
            r#"<tr><td>Bill 5</td><td><a href="/bill-5">Title</a></td><td><article class="node--type-bill-sponsor"></article></td></tr>"#,
        );
        let err = parse_bills(&html, PAGE, "https://www.ola.org/", SESSION).unwrap_err();
        assert_eq!(err.reason, "sponsor of bill Bill 5 has no name");
    }

    #[test]
    fn blank_sponsor_name_is_a_parse_error() {
        let html = listing(&format!(
            r#"<tr><td>Bill 6</td><td><a href="/bill-6">Title</a></td><td>{}{}</td></tr>"#,
            sponsor("Ford, Doug", Some("Premier")),
            sponsor(" \u{00A0} ", None),
        ));
        let err = parse_bills(&html, PAGE, "https://www.ola.org/", SESSION).unwrap_err();
        assert_eq!(err.reason, "sponsor of bill Bill 6 has no name");
    }
}
