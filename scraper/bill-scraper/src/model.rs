use serde::{Deserialize, Serialize};

/// End date the site shows for a session that is still sitting.
pub const OPEN_END_DATE: &str = "Present";

/// One sitting of the legislature, e.g. "43rd Parliament, Session 1".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "session_name")]
    pub name: String,
    pub url: String,
    pub start_date: String,
    pub end_date: String,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.end_date == OPEN_END_DATE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sponsor {
    pub name: String,
    /// Empty when the page states no role.
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bill {
    pub session_name: String,
    pub bill_number: String,
    pub bill_title: String,
    pub url: String,
    /// In the order they appear on the page.
    pub sponsors: Vec<Sponsor>,
}

/// One row of a bill's published history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub session_name: String,
    pub bill_number: String,
    pub bill_title: String,
    pub date: String,
    #[serde(rename = "bill_stage")]
    pub stage: String,
    pub activity: String,
    pub committee: String,
}
