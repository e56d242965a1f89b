//! Flat CSV snapshots, one file per dataset.
//!
//! Every write replaces the whole file: rows go to a sibling `.tmp` file which is
//! renamed over the target only once it has been fully written. A missing file
//! reads back as an empty snapshot.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PersistenceError;
use crate::model::{Bill, Session, Sponsor, Status};

pub const SESSIONS_FILE: &str = "sessions.csv";
pub const BILLS_FILE: &str = "bills.csv";
pub const STATUSES_FILE: &str = "statuses.csv";

const SESSION_COLUMNS: [&str; 4] = ["session_name", "url", "start_date", "end_date"];
const BILL_COLUMNS: [&str; 4] = ["session_name", "bill_number", "bill_title", "url"];
const STATUS_COLUMNS: [&str; 7] = [
    "session_name",
    "bill_number",
    "bill_title",
    "date",
    "bill_stage",
    "activity",
    "committee",
];

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SnapshotStore { dir: dir.into() }
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.dir.join(SESSIONS_FILE)
    }

    pub fn bills_path(&self) -> PathBuf {
        self.dir.join(BILLS_FILE)
    }

    pub fn statuses_path(&self) -> PathBuf {
        self.dir.join(STATUSES_FILE)
    }

    pub fn read_sessions(&self) -> Result<Vec<Session>, PersistenceError> {
        read_rows(&self.sessions_path())
    }

    pub fn write_sessions(&self, sessions: &[Session]) -> Result<(), PersistenceError> {
        write_rows(&self.sessions_path(), &SESSION_COLUMNS, sessions)
    }

    pub fn read_statuses(&self) -> Result<Vec<Status>, PersistenceError> {
        read_rows(&self.statuses_path())
    }

    pub fn write_statuses(&self, statuses: &[Status]) -> Result<(), PersistenceError> {
        write_rows(&self.statuses_path(), &STATUS_COLUMNS, statuses)
    }

    pub fn read_bills(&self) -> Result<Vec<Bill>, PersistenceError> {
        let path = self.bills_path();
        let Some(mut reader) = open_reader(&path)? else {
            return Ok(Vec::new());
        };

        let headers = reader.headers().map_err(csv_error(&path))?.clone();
        if headers.len() < BILL_COLUMNS.len() || headers.iter().zip(BILL_COLUMNS).any(|(found, expected)| found != expected) {
            return Err(PersistenceError::Malformed {
                path,
                line: 1,
                reason: format!("expected header to start with {}", BILL_COLUMNS.join(",")),
            });
        }

        let mut bills = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error(&path))?;
            if record.len() < BILL_COLUMNS.len() {
                return Err(PersistenceError::Malformed {
                    path,
                    line: record.position().map(|p| p.line()).unwrap_or_default(),
                    reason: format!("expected at least {} fields, found {}", BILL_COLUMNS.len(), record.len()),
                });
            }

            let fields: Vec<&str> = record.iter().collect();
            let mut sponsors: Vec<Sponsor> = fields[BILL_COLUMNS.len()..]
                .chunks(2)
                .map(|pair| Sponsor {
                    name: pair[0].to_string(),
                    title: pair.get(1).copied().unwrap_or_default().to_string(),
                })
                .collect();
            // Shorter sponsor lists are padded out to the widest bill.
            while sponsors.last().is_some_and(|s| s.name.is_empty() && s.title.is_empty()) {
                sponsors.pop();
            }

            bills.push(Bill {
                session_name: fields[0].to_string(),
                bill_number: fields[1].to_string(),
                bill_title: fields[2].to_string(),
                url: fields[3].to_string(),
                sponsors,
            });
        }

        Ok(bills)
    }

    /// Writes bills with `k` sponsor name/title column pairs, `k` being the
    /// largest sponsor count among `bills`.
    pub fn write_bills(&self, bills: &[Bill]) -> Result<(), PersistenceError> {
        let max_sponsors = bills.iter().map(|bill| bill.sponsors.len()).max().unwrap_or(0);

        let mut header: Vec<String> = BILL_COLUMNS.iter().map(|c| c.to_string()).collect();
        for i in 1..=max_sponsors {
            header.push(format!("sponsor_name_{i}"));
            header.push(format!("sponsor_title_{i}"));
        }

        replace_file(&self.bills_path(), |writer| {
            writer.write_record(&header)?;
            for bill in bills {
                let mut row = vec![
                    bill.session_name.as_str(),
                    bill.bill_number.as_str(),
                    bill.bill_title.as_str(),
                    bill.url.as_str(),
                ];
                for sponsor in &bill.sponsors {
                    row.push(&sponsor.name);
                    row.push(&sponsor.title);
                }
                row.resize(header.len(), "");
                writer.write_record(&row)?;
            }
            Ok(())
        })
    }
}

fn open_reader(path: &Path) -> Result<Option<csv::Reader<File>>, PersistenceError> {
    match File::open(path) {
        Ok(file) => Ok(Some(csv::ReaderBuilder::new().flexible(true).from_reader(file))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistenceError> {
    let Some(mut reader) = open_reader(path)? else {
        return Ok(Vec::new());
    };

    reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(csv_error(path))
}

fn write_rows<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<(), PersistenceError> {
    replace_file(path, |writer| {
        writer.write_record(header)?;
        for row in rows {
            writer.serialize(row)?;
        }
        Ok(())
    })
}

fn replace_file<F>(path: &Path, fill: F) -> Result<(), PersistenceError>
where
    F: FnOnce(&mut csv::Writer<File>) -> Result<(), csv::Error>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let tmp = temp_path(path);
    let written = write_temp(&tmp, fill);
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }

    fs::rename(&tmp, path).map_err(io_error(path))
}

fn write_temp<F>(tmp: &Path, fill: F) -> Result<(), PersistenceError>
where
    F: FnOnce(&mut csv::Writer<File>) -> Result<(), csv::Error>,
{
    let file = File::create(tmp).map_err(io_error(tmp))?;
    // Headers are written explicitly so empty snapshots still get one.
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    fill(&mut writer).map_err(csv_error(tmp))?;

    let file = writer
        .into_inner()
        .map_err(|err| io_error(tmp)(err.into_error()))?;
    file.sync_all().map_err(io_error(tmp))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bill(session: &str, number: &str, sponsors: &[(&str, &str)]) -> Bill {
        Bill {
            session_name: session.to_string(),
            bill_number: number.to_string(),
            bill_title: format!("Bill {number}"),
            url: format!("https://www.ola.org/en/{session}/bill-{number}"),
            sponsors: sponsors
                .iter()
                .map(|(name, title)| Sponsor {
                    name: name.to_string(),
                    title: title.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn missing_files_read_as_empty_snapshots() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("not-yet-created"));

        assert!(store.read_sessions().unwrap().is_empty());
        assert!(store.read_bills().unwrap().is_empty());
        assert!(store.read_statuses().unwrap().is_empty());
    }

    #[test]
    fn sponsor_columns_widen_to_the_largest_bill() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let bills = vec![
            bill("A", "1", &[]),
            bill("B", "2", &[("Ford, Doug", "Premier")]),
            bill("C", "3", &[("Smith, Jo", ""), ("Lee, Kim", "Minister"), ("Roy, Al", "")]),
        ];

        store.write_bills(&bills).unwrap();
        let written = fs::read_to_string(store.bills_path()).unwrap();
        let lines: Vec<&str> = written.lines().collect();

        assert_eq!(
            lines[0],
            "session_name,bill_number,bill_title,url,sponsor_name_1,sponsor_title_1,sponsor_name_2,sponsor_title_2,sponsor_name_3,sponsor_title_3"
        );
        assert_eq!(lines[1], "A,1,Bill 1,https://www.ola.org/en/A/bill-1,,,,,,");
        assert_eq!(lines[2], "B,2,Bill 2,https://www.ola.org/en/B/bill-2,\"Ford, Doug\",Premier,,,,");
        assert_eq!(lines.len(), 4);

        assert_eq!(store.read_bills().unwrap(), bills);
    }

    #[test]
    fn empty_snapshots_still_carry_a_header() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        store.write_sessions(&[]).unwrap();
        store.write_bills(&[]).unwrap();
        store.write_statuses(&[]).unwrap();

        assert_eq!(
            fs::read_to_string(store.sessions_path()).unwrap(),
            "session_name,url,start_date,end_date\n"
        );
        assert_eq!(
            fs::read_to_string(store.bills_path()).unwrap(),
            "session_name,bill_number,bill_title,url\n"
        );
        assert_eq!(
            fs::read_to_string(store.statuses_path()).unwrap(),
            "session_name,bill_number,bill_title,date,bill_stage,activity,committee\n"
        );
    }

    #[test]
    fn rewriting_what_was_read_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        store
            .write_sessions(&[Session {
                name: "42nd Parliament, Session 1".to_string(),
                url: "https://www.ola.org/en/legislative-business/bills/parliament-42/session-1".to_string(),
                start_date: "July 11, 2018".to_string(),
                end_date: "March 19, 2021".to_string(),
            }])
            .unwrap();
        store
            .write_statuses(&[Status {
                session_name: "42nd Parliament, Session 1".to_string(),
                bill_number: "2".to_string(),
                bill_title: "Urgent Priorities Act, 2018".to_string(),
                date: "July 25, 2018".to_string(),
                stage: "Royal Assent".to_string(),
                activity: "".to_string(),
                committee: "".to_string(),
            }])
            .unwrap();
        store
            .write_bills(&[bill("42", "2", &[("Thompson, Lisa M.", "")]), bill("42", "3", &[])])
            .unwrap();

        let before: Vec<String> = [store.sessions_path(), store.bills_path(), store.statuses_path()]
            .iter()
            .map(|p| fs::read_to_string(p).unwrap())
            .collect();

        store.write_sessions(&store.read_sessions().unwrap()).unwrap();
        store.write_bills(&store.read_bills().unwrap()).unwrap();
        store.write_statuses(&store.read_statuses().unwrap()).unwrap();

        let after: Vec<String> = [store.sessions_path(), store.bills_path(), store.statuses_path()]
            .iter()
            .map(|p| fs::read_to_string(p).unwrap())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn failed_write_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.write_bills(&[bill("A", "1", &[])]).unwrap();
        let previous = fs::read_to_string(store.bills_path()).unwrap();

        // A directory in the way of the temporary file makes the write fail.
        fs::create_dir(temp_path(&store.bills_path())).unwrap();
        let err = store.write_bills(&[bill("B", "9", &[])]).unwrap_err();

        assert!(matches!(err, PersistenceError::Io { .. }));
        assert_eq!(fs::read_to_string(store.bills_path()).unwrap(), previous);
    }

    #[test]
    fn foreign_bill_header_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        fs::write(store.bills_path(), "parliament,bill_number,bill_title,url_title\nx,1,t,u\n").unwrap();

        let err = store.read_bills().unwrap_err();
        assert!(matches!(err, PersistenceError::Malformed { line: 1, .. }));
    }
}
