//! Record models shared by the progress and star collections.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Wildcard value accepted by [`SubjectFilter`] for `subject` and `kind`.
pub const ANY: i64 = -1;

/// One exercise item, either in the progress collection or in a star folder.
///
/// `course`, `subject` and `kind` are optional because records created from
/// a bare list of identifiers carry no classification. The remote service
/// sends no `time`, so it defaults to `None` when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ItemRecord {
    pub pid: String,
    #[serde(default)]
    pub course: Option<i64>,
    #[serde(default)]
    pub subject: Option<i64>,
    #[serde(rename = "type", default)]
    #[sqlx(rename = "type")]
    pub kind: Option<i64>,
    #[serde(default)]
    pub time: Option<String>,
}

/// A record in the progress collection, unique by `pid`.
pub type ProgressRecord = ItemRecord;

/// A record in a star folder, unique by `(folder, pid)`.
pub type StarRecord = ItemRecord;

impl ItemRecord {
    /// A fully classified record stamped with `time`.
    pub fn new(
        pid: impl Into<String>,
        course: i64,
        subject: i64,
        kind: i64,
        time: impl Into<String>,
    ) -> Self {
        Self {
            pid: pid.into(),
            course: Some(course),
            subject: Some(subject),
            kind: Some(kind),
            time: Some(time.into()),
        }
    }

    /// A record known only by its identifier.
    pub fn unclassified(pid: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            pid: pid.into(),
            course: None,
            subject: None,
            kind: None,
            time: Some(time.into()),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.pid.trim().is_empty() {
            return Err("pid cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Selects records by classification.
///
/// `course` must match exactly. `subject` and `kind` match anything when set
/// to [`ANY`].
///
/// ```
/// use core_library::{ItemRecord, SubjectFilter, ANY};
///
/// let record = ItemRecord::new("q1", 1, 4, 2, "0");
/// assert!(SubjectFilter::new(1, ANY, ANY).matches(&record));
/// assert!(!SubjectFilter::new(2, ANY, ANY).matches(&record));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectFilter {
    pub course: i64,
    pub subject: i64,
    pub kind: i64,
}

impl SubjectFilter {
    pub fn new(course: i64, subject: i64, kind: i64) -> Self {
        Self {
            course,
            subject,
            kind,
        }
    }

    pub fn matches(&self, record: &ItemRecord) -> bool {
        record.course == Some(self.course)
            && (self.subject == ANY || record.subject == Some(self.subject))
            && (self.kind == ANY || record.kind == Some(self.kind))
    }

    pub fn apply(&self, records: Vec<ItemRecord>) -> Vec<ItemRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}
