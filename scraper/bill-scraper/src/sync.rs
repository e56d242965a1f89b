//! Incremental synchronization of the three snapshots.
//!
//! A run lists the sessions, works out which of them may have changed since the
//! last run, re-scrapes bills and statuses for those sessions only, and writes
//! each dataset as retained rows followed by freshly scraped rows.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::RefreshMode;
use crate::error::{Stage, SyncError};
use crate::model::{Bill, Session, Status};
use crate::sources::{BillSource, SessionSource, StatusSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// Listed live but not in the last snapshot.
    New,
    /// Still sitting, in either the live listing or the last snapshot.
    Open,
    /// In the last snapshot but no longer listed; its rows are dropped.
    Removed,
    /// Selected by the refresh mode regardless of its state.
    Forced,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeReason::New => write!(f, "new"),
            ChangeReason::Open => write!(f, "open"),
            ChangeReason::Removed => write!(f, "removed upstream"),
            ChangeReason::Forced => write!(f, "forced"),
        }
    }
}

/// Sessions whose bills and statuses are replaced this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    changed: BTreeMap<String, ChangeReason>,
}

impl Plan {
    pub fn is_changed(&self, session_name: &str) -> bool {
        self.changed.contains_key(session_name)
    }

    pub fn reason(&self, session_name: &str) -> Option<ChangeReason> {
        self.changed.get(session_name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.changed.keys().map(String::as_str)
    }

    pub fn reasons(&self) -> impl Iterator<Item = (&str, ChangeReason)> {
        self.changed.iter().map(|(name, reason)| (name.as_str(), *reason))
    }

    pub fn len(&self) -> usize {
        self.changed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    fn mark(&mut self, session_name: &str, reason: ChangeReason) {
        self.changed.entry(session_name.to_string()).or_insert(reason);
    }
}

/// Decides which sessions need their bills and statuses re-scraped.
pub fn classify(mode: RefreshMode, live: &[Session], persisted: &[Session]) -> Plan {
    let mut plan = Plan::default();
    let live_names: HashSet<&str> = live.iter().map(|s| s.name.as_str()).collect();
    let persisted_open: BTreeMap<&str, bool> = persisted.iter().map(|s| (s.name.as_str(), s.is_open())).collect();

    match mode {
        RefreshMode::Incremental => {
            for session in live {
                match persisted_open.get(session.name.as_str()) {
                    None => plan.mark(&session.name, ChangeReason::New),
                    Some(was_open) if *was_open || session.is_open() => plan.mark(&session.name, ChangeReason::Open),
                    Some(_) => {}
                }
            }
        }
        RefreshMode::Full => {
            for session in live {
                plan.mark(&session.name, ChangeReason::Forced);
            }
        }
        RefreshMode::Current => {
            if let Some(current) = live.last() {
                plan.mark(&current.name, ChangeReason::Forced);
            }
        }
    }

    for session in persisted {
        if !live_names.contains(session.name.as_str()) {
            plan.mark(&session.name, ChangeReason::Removed);
        }
    }

    plan
}

/// Keeps the first listing of each session name.
fn unique_by_name(sessions: Vec<Session>) -> Vec<Session> {
    let mut seen = HashSet::new();
    sessions
        .into_iter()
        .filter(|session| {
            let first = seen.insert(session.name.clone());
            if !first {
                tracing::warn!(session = %session.name, "session listed twice, dropping repeat");
            }
            first
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub mode: RefreshMode,
    /// Show a progress bar while status pages are fetched.
    pub progress: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            mode: RefreshMode::Incremental,
            progress: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub sessions: usize,
    pub plan: Plan,
    pub bills_retained: usize,
    pub bills_fetched: usize,
    pub statuses_retained: usize,
    pub statuses_fetched: usize,
}

pub struct SyncEngine<S, B, T> {
    sessions: S,
    bills: B,
    statuses: T,
    options: SyncOptions,
}

impl<S, B, T> SyncEngine<S, B, T>
where
    S: SessionSource,
    B: BillSource,
    T: StatusSource,
{
    pub fn new(sessions: S, bills: B, statuses: T, options: SyncOptions) -> Self {
        SyncEngine {
            sessions,
            bills,
            statuses,
            options,
        }
    }

    /// Lists sessions and classifies them without fetching or writing anything else.
    pub async fn plan(&self) -> Result<Plan, SyncError> {
        let (live, persisted) = self.list_sessions().await?;
        Ok(classify(self.options.mode, &live, &persisted))
    }

    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let result = self.run_stages().await;
        if let Err(err) = &result {
            if err.stage.leaves_partial_snapshot() {
                tracing::warn!(
                    stage = %err.stage,
                    "run aborted after the session list was saved; sessions first seen in this run will not be re-scraped incrementally, run `sync --full` to recover their bills and statuses"
                );
            }
        }
        result
    }

    async fn run_stages(&self) -> Result<SyncReport, SyncError> {
        let (live, persisted) = self.list_sessions().await?;
        self.sessions
            .write(&live)
            .map_err(SyncError::at(Stage::FetchSessions))?;
        tracing::info!(sessions = live.len(), previously = persisted.len(), "session list saved");

        let plan = classify(self.options.mode, &live, &persisted);
        for (name, reason) in plan.reasons() {
            tracing::info!(session = name, %reason, "session marked for refresh");
        }
        if plan.is_empty() {
            tracing::info!("no session changed since the last run");
        }

        let (bills, bills_retained) = self.refresh_bills(&live, &plan).await?;
        let fresh_bills = &bills[bills_retained..];
        let (statuses_retained, statuses_fetched) = self.refresh_statuses(fresh_bills, &plan).await?;

        Ok(SyncReport {
            sessions: live.len(),
            bills_retained,
            bills_fetched: fresh_bills.len(),
            statuses_retained,
            statuses_fetched,
            plan,
        })
    }

    async fn list_sessions(&self) -> Result<(Vec<Session>, Vec<Session>), SyncError> {
        let at = SyncError::at(Stage::FetchSessions);
        let persisted = self.sessions.read_persisted().map_err(at)?;
        let live = self
            .sessions
            .fetch_live()
            .await
            .map_err(SyncError::at(Stage::FetchSessions))?;
        Ok((unique_by_name(live), persisted))
    }

    /// Returns the merged bills and how many of them were retained; the
    /// freshly fetched ones follow the retained ones.
    async fn refresh_bills(&self, live: &[Session], plan: &Plan) -> Result<(Vec<Bill>, usize), SyncError> {
        let at = || SyncError::at(Stage::RefreshBills);

        let mut bills: Vec<Bill> = self
            .bills
            .read_persisted()
            .map_err(at())?
            .into_iter()
            .filter(|bill| !plan.is_changed(&bill.session_name))
            .collect();
        let retained = bills.len();

        for session in live.iter().filter(|s| plan.is_changed(&s.name)) {
            let fetched = self.bills.fetch_live(session).await.map_err(at())?;
            tracing::info!(session = %session.name, bills = fetched.len(), url = %session.url, "bills fetched");
            bills.extend(fetched);
        }

        self.bills.write(&bills).map_err(at())?;
        tracing::info!(retained, fetched = bills.len() - retained, "bill snapshot saved");

        Ok((bills, retained))
    }

    async fn refresh_statuses(&self, fresh_bills: &[Bill], plan: &Plan) -> Result<(usize, usize), SyncError> {
        let at = || SyncError::at(Stage::RefreshStatuses);

        let mut statuses: Vec<Status> = self
            .statuses
            .read_persisted()
            .map_err(at())?
            .into_iter()
            .filter(|status| !plan.is_changed(&status.session_name))
            .collect();
        let retained = statuses.len();

        let progress = self.progress_bar(fresh_bills.len());
        for bill in fresh_bills {
            progress.set_message(format!("{} {}", bill.session_name, bill.bill_number));
            let fetched = self.statuses.fetch_live(bill).await.map_err(at())?;
            tracing::debug!(session = %bill.session_name, bill = %bill.bill_number, rows = fetched.len(), "statuses fetched");
            statuses.extend(fetched);
            progress.inc(1);
        }
        progress.finish_and_clear();

        let fetched = statuses.len() - retained;
        self.statuses.write(&statuses).map_err(at())?;
        tracing::info!(retained, fetched, "status snapshot saved");

        Ok((retained, fetched))
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.options.progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            progress.set_style(style.progress_chars("#>-"));
        }
        progress
    }
}
