use crate::models::ContactDraft;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A remote contact as pulled from the CRM, already lifted out of the wire
/// format. Name fields are raw (untrimmed); `emails` holds the raw values of
/// the remote email records in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteContact {
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub emails: Vec<String>,
}

impl RemoteContact {
    /// First email record's value, trimmed; `None` when the list is empty or
    /// the first value is blank. Later emails are ignored by policy.
    pub fn primary_email(&self) -> Option<&str> {
        let first = self.emails.first()?.trim();
        (!first.is_empty()).then_some(first)
    }
}

/// Classification outcome for one remote entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// No usable email; counted separately, never written.
    Skip,
    /// No local record with this email.
    Create,
    /// Local record exists but a name field differs.
    Update,
    /// Local record exists and matches.
    NoOp,
}

/// One pending write produced by classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedWrite {
    Create(ContactDraft),
    /// Both name fields are overwritten together, never diffed per field.
    Update {
        id: Uuid,
        name: String,
        last_name: String,
    },
}

/// The full batch of writes for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub writes: Vec<PlannedWrite>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub unchanged: u64,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Skip => self.skipped += 1,
            Disposition::Create => self.created += 1,
            Disposition::Update => self.updated += 1,
            Disposition::NoOp => self.unchanged += 1,
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            write!(
                f,
                "[dry run] would create {}, update {}, skip {} (unchanged {})",
                self.created, self.updated, self.skipped, self.unchanged
            )
        } else {
            write!(
                f,
                "sync completed: new={} updated={} skipped={} unchanged={}",
                self.created, self.updated, self.skipped, self.unchanged
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_email_takes_first_trimmed() {
        let rc = RemoteContact {
            emails: vec!["  jo@x.com ".to_string(), "other@x.com".to_string()],
            ..Default::default()
        };
        assert_eq!(rc.primary_email(), Some("jo@x.com"));
    }

    #[test]
    fn primary_email_rejects_empty_and_blank() {
        assert_eq!(RemoteContact::default().primary_email(), None);
        let blank = RemoteContact {
            emails: vec!["   ".to_string()],
            ..Default::default()
        };
        assert_eq!(blank.primary_email(), None);
    }
}
