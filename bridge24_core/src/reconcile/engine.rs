use crate::config::{EmailMatching, SyncSettings};
use crate::models::{Contact, ContactDraft};
use crate::reconcile::models::{
    Disposition, PlannedWrite, RemoteContact, SyncPlan, SyncReport,
};
use crate::store::traits::ContactStore;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Where remote contacts come from. Implemented by the Bitrix24 client in
/// `bridge24_integrations`; tests swap in an in-process source.
#[async_trait]
pub trait ContactSource: Send + Sync {
    /// Fetch the remote contact list, already filtered server-side by
    /// creation date. Transport failures and malformed responses surface as
    /// errors and abort the whole run.
    async fn fetch_contacts(&self) -> Result<Vec<RemoteContact>>;
}

/// Classify one remote entry against the local record found (or not found)
/// for its primary email.
///
/// Remote values are trimmed before comparison; stored values are compared
/// raw, so a stored `NULL` differs from a remote empty string and triggers
/// an update that pins the field to `""`. After that first write the run is
/// idempotent.
pub fn classify(remote: &RemoteContact, existing: Option<&Contact>) -> (Disposition, Option<PlannedWrite>) {
    let Some(email) = remote.primary_email() else {
        return (Disposition::Skip, None);
    };

    let name = remote.name.as_deref().unwrap_or("").trim();
    let last_name = remote.last_name.as_deref().unwrap_or("").trim();

    match existing {
        None => {
            let draft = ContactDraft {
                name: Some(name.to_string()),
                last_name: Some(last_name.to_string()),
                email: email.to_string(),
                phone: None,
            };
            (Disposition::Create, Some(PlannedWrite::Create(draft)))
        }
        Some(local) => {
            let name_differs = local.name.as_deref() != Some(name);
            let last_differs = local.last_name.as_deref() != Some(last_name);
            if name_differs || last_differs {
                (
                    Disposition::Update,
                    Some(PlannedWrite::Update {
                        id: local.id,
                        name: name.to_string(),
                        last_name: last_name.to_string(),
                    }),
                )
            } else {
                (Disposition::NoOp, None)
            }
        }
    }
}

/// Re-classify a remote entry whose email already has a write planned in
/// this run. Compared against the pending write's end state: equal names
/// fold to `NoOp`, differing names overwrite the pending fields and count
/// as `Update` (last occurrence wins, same as running the writes in order).
fn merge_into_pending(remote: &RemoteContact, write: &mut PlannedWrite) -> Disposition {
    let name = remote.name.as_deref().unwrap_or("").trim();
    let last_name = remote.last_name.as_deref().unwrap_or("").trim();

    match write {
        PlannedWrite::Create(draft) => {
            if draft.name.as_deref() == Some(name) && draft.last_name.as_deref() == Some(last_name)
            {
                Disposition::NoOp
            } else {
                draft.name = Some(name.to_string());
                draft.last_name = Some(last_name.to_string());
                Disposition::Update
            }
        }
        PlannedWrite::Update {
            name: pending_name,
            last_name: pending_last,
            ..
        } => {
            if pending_name == name && pending_last == last_name {
                Disposition::NoOp
            } else {
                *pending_name = name.to_string();
                *pending_last = last_name.to_string();
                Disposition::Update
            }
        }
    }
}

/// The Bulk Reconciler: one-directional pull of remote contacts into the
/// local store.
pub struct Reconciler {
    source: Arc<dyn ContactSource>,
    store: Arc<dyn ContactStore>,
}

impl Reconciler {
    pub fn new(source: Arc<dyn ContactSource>, store: Arc<dyn ContactStore>) -> Self {
        Self { source, store }
    }

    /// Run one reconciliation pass.
    ///
    /// Fails closed: a fetch error or any store error aborts with no writes
    /// committed (the plan is applied in a single transaction). Dry-run
    /// classifies identically but never touches the store's write path.
    #[tracing::instrument(level = "info", skip(self), fields(dry_run = settings.dry_run))]
    pub async fn run(&self, settings: SyncSettings) -> Result<SyncReport> {
        let remotes = self.source.fetch_contacts().await?;
        tracing::info!(count = remotes.len(), "fetched remote contacts");

        let mut plan = SyncPlan::default();
        let mut report = SyncReport {
            dry_run: settings.dry_run,
            ..Default::default()
        };

        // Writes already planned this run, keyed by email under the active
        // matching policy. A later entry with the same email resolves
        // against the pending write, not the pre-run store state, so a
        // duplicated remote email folds into one write instead of tripping
        // the unique index and aborting the batch.
        let mut pending: HashMap<String, usize> = HashMap::new();

        for remote in &remotes {
            let Some(email) = remote.primary_email() else {
                report.record(Disposition::Skip);
                tracing::debug!(
                    disposition = ?Disposition::Skip,
                    email = "<none>",
                    "classified remote contact"
                );
                continue;
            };

            let key = match settings.matching {
                EmailMatching::Exact => email.to_string(),
                EmailMatching::CaseInsensitive => email.to_lowercase(),
            };

            let disposition = if let Some(&idx) = pending.get(&key) {
                merge_into_pending(remote, &mut plan.writes[idx])
            } else {
                let existing = self
                    .store
                    .find_contact_by_email(email, settings.matching)
                    .await?;
                let (disposition, write) = classify(remote, existing.as_ref());
                if let Some(write) = write {
                    plan.writes.push(write);
                    pending.insert(key, plan.writes.len() - 1);
                }
                disposition
            };

            report.record(disposition);
            tracing::debug!(?disposition, email, "classified remote contact");
        }

        if !settings.dry_run && !plan.is_empty() {
            self.store.apply_plan(&plan).await?;
        }

        tracing::info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            unchanged = report.unchanged,
            "reconciliation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailMatching;
    use crate::store::traits::ListQuery;
    use crate::{Error, Result};
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct FixedSource(Vec<RemoteContact>);

    #[async_trait]
    impl ContactSource for FixedSource {
        async fn fetch_contacts(&self) -> Result<Vec<RemoteContact>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ContactSource for FailingSource {
        async fn fetch_contacts(&self) -> Result<Vec<RemoteContact>> {
            Err(Error::BackendMessage("bitrix unreachable".to_string()))
        }
    }

    #[derive(Default)]
    struct MemStore {
        contacts: Mutex<Vec<Contact>>,
        applied_plans: Mutex<Vec<SyncPlan>>,
    }

    impl MemStore {
        fn with(contacts: Vec<Contact>) -> Self {
            Self {
                contacts: Mutex::new(contacts),
                applied_plans: Mutex::default(),
            }
        }

        fn snapshot(&self) -> Vec<Contact> {
            self.contacts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContactStore for MemStore {
        async fn list_contacts(&self, _query: ListQuery) -> Result<Vec<Contact>> {
            Ok(self.snapshot())
        }

        async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>> {
            Ok(self.snapshot().into_iter().find(|c| c.id == id))
        }

        async fn find_contact_by_email(
            &self,
            email: &str,
            matching: EmailMatching,
        ) -> Result<Option<Contact>> {
            Ok(self.snapshot().into_iter().find(|c| match matching {
                EmailMatching::Exact => c.email == email,
                EmailMatching::CaseInsensitive => c.email.eq_ignore_ascii_case(email),
            }))
        }

        async fn insert_contact(&self, draft: &ContactDraft) -> Result<Contact> {
            let now = Utc::now();
            let contact = Contact {
                id: Uuid::new_v4(),
                name: draft.name.clone(),
                last_name: draft.last_name.clone(),
                email: draft.email.clone(),
                phone: draft.phone.clone(),
                created_at: now,
                updated_at: now,
            };
            self.contacts.lock().unwrap().push(contact.clone());
            Ok(contact)
        }

        async fn apply_plan(&self, plan: &SyncPlan) -> Result<()> {
            self.applied_plans.lock().unwrap().push(plan.clone());
            let mut contacts = self.contacts.lock().unwrap();
            for write in &plan.writes {
                match write {
                    PlannedWrite::Create(draft) => {
                        let now = Utc::now();
                        contacts.push(Contact {
                            id: Uuid::new_v4(),
                            name: draft.name.clone(),
                            last_name: draft.last_name.clone(),
                            email: draft.email.clone(),
                            phone: draft.phone.clone(),
                            created_at: now,
                            updated_at: now,
                        });
                    }
                    PlannedWrite::Update {
                        id,
                        name,
                        last_name,
                    } => {
                        let c = contacts
                            .iter_mut()
                            .find(|c| c.id == *id)
                            .ok_or_else(|| Error::NotFound(id.to_string()))?;
                        c.name = Some(name.clone());
                        c.last_name = Some(last_name.clone());
                        c.updated_at = Utc::now();
                    }
                }
            }
            Ok(())
        }
    }

    fn remote(name: &str, last: &str, emails: &[&str]) -> RemoteContact {
        RemoteContact {
            name: Some(name.to_string()),
            last_name: Some(last.to_string()),
            emails: emails.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn stored(name: &str, last: &str, email: &str) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            name: Some(name.to_string()),
            last_name: Some(last.to_string()),
            email: email.to_string(),
            phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn end_to_end_create_and_skip() {
        let source = Arc::new(FixedSource(vec![
            remote("Jo", "Do", &["jo@x.com"]),
            remote("An", "Ok", &[]),
        ]));
        let store = Arc::new(MemStore::default());
        let reconciler = Reconciler::new(source, store.clone());

        let report = reconciler.run(SyncSettings::default()).await.unwrap();
        assert_eq!((report.created, report.updated, report.skipped), (1, 0, 1));

        let contacts = store.snapshot();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].email, "jo@x.com");
        assert_eq!(contacts[0].name.as_deref(), Some("Jo"));
        assert_eq!(contacts[0].last_name.as_deref(), Some("Do"));
    }

    #[tokio::test]
    async fn update_overwrites_both_name_fields() {
        let local = stored("Old", "Do", "jo@x.com");
        let id = local.id;
        let store = Arc::new(MemStore::with(vec![local]));
        let source = Arc::new(FixedSource(vec![remote(" Jo ", "Do", &["jo@x.com"])]));
        let reconciler = Reconciler::new(source, store.clone());

        let report = reconciler.run(SyncSettings::default()).await.unwrap();
        assert_eq!(report.updated, 1);

        let updated = store.get_contact(id).await.unwrap().unwrap();
        assert_eq!(updated.name.as_deref(), Some("Jo"));
        assert_eq!(updated.last_name.as_deref(), Some("Do"));
    }

    #[tokio::test]
    async fn second_run_is_all_noops() {
        let source = Arc::new(FixedSource(vec![remote("Jo", "Do", &["jo@x.com"])]));
        let store = Arc::new(MemStore::default());
        let reconciler = Reconciler::new(source.clone(), store.clone());

        let first = reconciler.run(SyncSettings::default()).await.unwrap();
        assert_eq!(first.created, 1);

        let second = reconciler.run(SyncSettings::default()).await.unwrap();
        assert_eq!((second.created, second.updated), (0, 0));
        assert_eq!(second.unchanged, 1);
        assert_eq!(store.applied_plans.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dry_run_never_writes() {
        let source = Arc::new(FixedSource(vec![
            remote("Jo", "Do", &["jo@x.com"]),
            remote("An", "Ok", &["an@x.com"]),
        ]));
        let store = Arc::new(MemStore::default());
        let reconciler = Reconciler::new(source, store.clone());

        let settings = SyncSettings {
            dry_run: true,
            ..Default::default()
        };
        let report = reconciler.run(settings).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.created, 2);
        assert!(store.snapshot().is_empty());
        assert!(store.applied_plans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_first_email_is_skipped() {
        let source = Arc::new(FixedSource(vec![remote("Jo", "Do", &["  ", "jo@x.com"])]));
        let store = Arc::new(MemStore::default());
        let reconciler = Reconciler::new(source, store.clone());

        let report = reconciler.run(SyncSettings::default()).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn exact_matching_misses_case_variants() {
        let store = Arc::new(MemStore::with(vec![stored("Jo", "Do", "jo@x.com")]));
        let source = Arc::new(FixedSource(vec![remote("Jo", "Do", &["JO@X.COM"])]));
        let reconciler = Reconciler::new(source, store.clone());

        let settings = SyncSettings {
            matching: crate::config::EmailMatching::Exact,
            dry_run: true,
        };
        let report = reconciler.run(settings).await.unwrap();
        // Legacy behavior: the case variant looks like a brand-new contact.
        assert_eq!(report.created, 1);

        let report = reconciler.run(SyncSettings { dry_run: true, ..Default::default() }).await.unwrap();
        assert_eq!(report.unchanged, 1);
    }

    #[tokio::test]
    async fn duplicate_email_in_batch_folds_into_one_create() {
        // The unique index on lower(email) must not abort the run when the
        // remote list itself repeats an email.
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            crate::store::sqlite::SqliteStore::open(dir.path().join("test.db"))
                .await
                .unwrap(),
        );
        let source = Arc::new(FixedSource(vec![
            remote("Jo", "Do", &["jo@x.com"]),
            remote("Jo", "Do", &["jo@x.com"]),
        ]));
        let reconciler = Reconciler::new(source, store.clone());

        let report = reconciler.run(SyncSettings::default()).await.unwrap();
        assert_eq!((report.created, report.unchanged), (1, 1));

        let contacts = store.list_contacts(ListQuery::default()).await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].email, "jo@x.com");
    }

    #[tokio::test]
    async fn case_variant_duplicate_updates_the_pending_create() {
        let source = Arc::new(FixedSource(vec![
            remote("Jo", "Do", &["jo@x.com"]),
            remote("Joe", "Doe", &["JO@X.COM"]),
        ]));
        let store = Arc::new(MemStore::default());
        let reconciler = Reconciler::new(source, store.clone());

        let report = reconciler.run(SyncSettings::default()).await.unwrap();
        assert_eq!((report.created, report.updated), (1, 1));

        // Last occurrence wins; the first occurrence's email spelling sticks.
        let contacts = store.snapshot();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].email, "jo@x.com");
        assert_eq!(contacts[0].name.as_deref(), Some("Joe"));
        assert_eq!(contacts[0].last_name.as_deref(), Some("Doe"));
    }

    #[tokio::test]
    async fn transport_failure_aborts_without_writes() {
        let store = Arc::new(MemStore::default());
        let reconciler = Reconciler::new(Arc::new(FailingSource), store.clone());

        let err = reconciler.run(SyncSettings::default()).await.unwrap_err();
        assert!(matches!(err, Error::BackendMessage(_)));
        assert!(store.applied_plans.lock().unwrap().is_empty());
    }
}
