//! Completion statistics against the staff roster.
//!
//! The roster snapshot synced from the staff directory defines who must
//! acknowledge; local user accounts only serve to connect a roster entry to
//! the acknowledgment records filed under that account.
//!
//! # Reconciliation
//!
//! 1. Index local users by external directory id and by lowercased email
//!    ([`RosterIndex`]).
//! 2. For each candidate document, load the records for its current version.
//! 3. Resolve every roster entry (external id first, email second) and
//!    split the roster into acknowledged and not-acknowledged entries.
//! 4. `percentage = round(acknowledged / roster_size * 100, 2)`, or `0`
//!    for an empty roster.
//!
//! Every roster entry counts on its own, even when two entries resolve to
//! the same local account.
//!
//! # Access
//!
//! All entry points take a [`StatsAccess`] token. Obtaining one for a
//! request caller checks that the caller's local account is ADMIN or EDITOR.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AckError, AckResult};
use crate::models::{AcknowledgmentRecord, Caller, Document, StaffRosterEntry, User};
use crate::store::{AckStore, DocumentFilter};

/// Hard ceiling for any user list or document list size.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Proof that the holder may read completion statistics.
#[derive(Debug, Clone)]
pub struct StatsAccess {
    granted_to: Option<String>,
}

impl StatsAccess {
    /// Grant access to a request caller whose local role is ADMIN or EDITOR.
    pub async fn for_caller<S: AckStore + ?Sized>(
        store: &S,
        caller: &Caller,
    ) -> AckResult<StatsAccess> {
        let user = store.find_user_by_email(caller.email()).await?;
        match user {
            Some(u) if u.role.can_view_stats() => Ok(StatsAccess {
                granted_to: Some(u.id),
            }),
            Some(u) => Err(AckError::Forbidden {
                reason: format!("role {} cannot view acknowledgment statistics", u.role),
            }),
            None => Err(AckError::Forbidden {
                reason: "caller has no local account".to_string(),
            }),
        }
    }

    /// Local operator access (command line, maintenance jobs).
    pub fn operator() -> StatsAccess {
        StatsAccess { granted_to: None }
    }

    /// Local user id the access was granted to, `None` for operator access.
    pub fn granted_to(&self) -> Option<&str> {
        self.granted_to.as_deref()
    }
}

/// Lookup from roster entries to local users.
pub struct RosterIndex<'a> {
    by_external_id: HashMap<&'a str, &'a User>,
    by_email: HashMap<String, &'a User>,
}

impl<'a> RosterIndex<'a> {
    /// The first user seen for a key keeps it.
    pub fn new(users: &'a [User]) -> Self {
        let mut by_external_id = HashMap::new();
        let mut by_email = HashMap::new();
        for user in users {
            if let Some(ext) = user.external_id.as_deref().filter(|e| !e.is_empty()) {
                by_external_id.entry(ext).or_insert(user);
            }
            by_email
                .entry(user.email.trim().to_lowercase())
                .or_insert(user);
        }
        RosterIndex {
            by_external_id,
            by_email,
        }
    }

    pub fn resolve(&self, entry: &StaffRosterEntry) -> Option<&'a User> {
        self.by_external_id
            .get(entry.external_id.as_str())
            .or_else(|| self.by_email.get(&entry.email.trim().to_lowercase()))
            .copied()
    }
}

/// `round(part / total * 100, 2)`, or `0` when `total` is zero.
pub fn completion_percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Whole days from `since` to `at`, never negative.
pub fn whole_days_between(since: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    (at - since).num_days().max(0)
}

/// A roster entry and the local account it resolved to, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterUser {
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub user_id: Option<String>,
}

/// A roster entry with an acknowledgment of the current version on file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgedUser {
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub user_id: String,
    pub acknowledgment_id: String,
    pub acknowledged_at: DateTime<Utc>,
    pub days_since_required: i64,
}

/// One document's roster split.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub acknowledged: Vec<AcknowledgedUser>,
    pub not_acknowledged: Vec<RosterUser>,
}

impl Reconciliation {
    pub fn roster_size(&self) -> usize {
        self.acknowledged.len() + self.not_acknowledged.len()
    }

    pub fn percentage(&self) -> f64 {
        completion_percentage(self.acknowledged.len(), self.roster_size())
    }
}

/// Split `roster` by whether each entry's local account acknowledged the
/// current version of `doc`. `records` must already be restricted to that
/// version.
pub fn reconcile(
    doc: &Document,
    roster: &[StaffRosterEntry],
    index: &RosterIndex<'_>,
    records: &[AcknowledgmentRecord],
) -> Reconciliation {
    let by_user: HashMap<&str, &AcknowledgmentRecord> = records
        .iter()
        .filter(|r| r.document_id == doc.id && r.document_version == doc.version)
        .map(|r| (r.user_id.as_str(), r))
        .collect();
    let required_since = doc.required_since();

    let mut result = Reconciliation::default();
    for entry in roster {
        let user = index.resolve(entry);
        let record = user.and_then(|u| by_user.get(u.id.as_str()).copied());
        match (user, record) {
            (Some(user), Some(record)) => result.acknowledged.push(AcknowledgedUser {
                external_id: entry.external_id.clone(),
                email: entry.email.clone(),
                display_name: entry.display_name.clone(),
                user_id: user.id.clone(),
                acknowledgment_id: record.id.clone(),
                acknowledged_at: record.acknowledged_at,
                days_since_required: whole_days_between(required_since, record.acknowledged_at),
            }),
            _ => result.not_acknowledged.push(RosterUser {
                external_id: entry.external_id.clone(),
                email: entry.email.clone(),
                display_name: entry.display_name.clone(),
                user_id: user.map(|u| u.id.clone()),
            }),
        }
    }

    result.acknowledged.sort_by(|a, b| {
        b.acknowledged_at
            .cmp(&a.acknowledged_at)
            .then_with(|| a.email.cmp(&b.email))
    });
    result.not_acknowledged.sort_by(|a, b| {
        sort_name(a)
            .cmp(&sort_name(b))
            .then_with(|| a.email.cmp(&b.email))
    });
    result
}

fn sort_name(user: &RosterUser) -> String {
    user.display_name
        .as_deref()
        .unwrap_or(&user.email)
        .to_lowercase()
}

/// Filter for [`completion_stats`].
#[derive(Debug, Clone, Default)]
pub struct StatsFilter {
    /// Restrict to a single document.
    pub document_id: Option<String>,
    /// Maximum number of documents, clamped to `[1, MAX_PAGE_SIZE]`.
    pub limit: Option<u32>,
    /// Include the per-user lists, not just the counts.
    pub include_users: bool,
}

/// Per-document completion figures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub document_id: String,
    pub title: String,
    pub version: String,
    pub required_since: DateTime<Utc>,
    pub acknowledged_count: usize,
    pub not_acknowledged_count: usize,
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_users: Option<Vec<AcknowledgedUser>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_acknowledged_users: Option<Vec<RosterUser>>,
}

/// Organization-wide totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_documents: usize,
    pub total_users: usize,
    pub total_acknowledgments: usize,
    pub overall_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    /// When the roster was last synced; `None` if it never was.
    pub data_as_of: Option<DateTime<Utc>>,
    pub documents: Vec<DocumentStats>,
    pub summary: StatsSummary,
}

async fn staff_users<S: AckStore + ?Sized>(store: &S) -> AckResult<Vec<User>> {
    let mut users = store.list_users().await?;
    users.retain(|u| u.role.is_staff_equivalent());
    Ok(users)
}

/// Compute completion statistics for approved documents.
pub async fn completion_stats<S: AckStore + ?Sized>(
    store: &S,
    _access: &StatsAccess,
    filter: &StatsFilter,
) -> AckResult<StatsReport> {
    let snapshot = store.roster_snapshot().await?;
    let users = staff_users(store).await?;
    let index = RosterIndex::new(&users);

    let mut candidates = match filter.document_id.as_deref() {
        Some(id) => {
            let doc = store
                .get_document(id)
                .await?
                .ok_or_else(|| AckError::not_found("document", id))?;
            vec![doc]
        }
        None => store.list_documents(&DocumentFilter::approved()).await?,
    };
    if let Some(limit) = filter.limit {
        candidates.truncate(limit.clamp(1, MAX_PAGE_SIZE) as usize);
    }

    let mut documents = Vec::with_capacity(candidates.len());
    let mut total_acknowledgments = 0;
    for doc in &candidates {
        let records = store.acknowledgments_for_version(&doc.id, &doc.version).await?;
        let split = reconcile(doc, &snapshot.entries, &index, &records);
        total_acknowledgments += split.acknowledged.len();

        let percentage = split.percentage();
        let acknowledged_count = split.acknowledged.len();
        let not_acknowledged_count = split.not_acknowledged.len();
        let (acknowledged_users, not_acknowledged_users) = if filter.include_users {
            (Some(split.acknowledged), Some(split.not_acknowledged))
        } else {
            (None, None)
        };

        documents.push(DocumentStats {
            document_id: doc.id.clone(),
            title: doc.title.clone(),
            version: doc.version.clone(),
            required_since: doc.required_since(),
            acknowledged_count,
            not_acknowledged_count,
            percentage,
            acknowledged_users,
            not_acknowledged_users,
        });
    }

    let total_users = snapshot.entries.len();
    Ok(StatsReport {
        data_as_of: snapshot.last_synced_at,
        summary: StatsSummary {
            total_documents: documents.len(),
            total_users,
            total_acknowledgments,
            overall_percentage: completion_percentage(
                total_acknowledgments,
                documents.len() * total_users,
            ),
        },
        documents,
    })
}

/// Requested page of a user list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// 1-indexed page (values below 1 become 1) and a page size clamped to
    /// `[1, MAX_PAGE_SIZE]`, defaulting to [`DEFAULT_PAGE_SIZE`].
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        Self::with_default(page, page_size, DEFAULT_PAGE_SIZE)
    }

    pub fn with_default(page: Option<i64>, page_size: Option<i64>, default_size: u32) -> Self {
        let page = page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
        let page_size = page_size
            .unwrap_or(default_size as i64)
            .clamp(1, MAX_PAGE_SIZE as i64) as u32;
        PageRequest { page, page_size }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }

    /// The slice of `items` this page covers.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset().min(items.len());
        let end = (start + self.page_size as usize).min(items.len());
        &items[start..end]
    }

    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size as usize)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub page: u32,
    pub page_size: u32,
    pub acknowledged_total: usize,
    pub acknowledged_pages: usize,
    pub not_acknowledged_total: usize,
    pub not_acknowledged_pages: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetail {
    pub document: Document,
    pub data_as_of: Option<DateTime<Utc>>,
    pub required_since: DateTime<Utc>,
    pub acknowledged_count: usize,
    pub not_acknowledged_count: usize,
    pub percentage: f64,
    pub acknowledged_users: Vec<AcknowledgedUser>,
    pub not_acknowledged_users: Vec<RosterUser>,
    pub pagination: PaginationInfo,
}

/// Roster reconciliation for one document with independently paginated
/// user lists.
pub async fn document_detail<S: AckStore + ?Sized>(
    store: &S,
    _access: &StatsAccess,
    document_id: &str,
    page: PageRequest,
) -> AckResult<DocumentDetail> {
    let doc = store
        .get_document(document_id)
        .await?
        .ok_or_else(|| AckError::not_found("document", document_id))?;

    let snapshot = store.roster_snapshot().await?;
    let users = staff_users(store).await?;
    let index = RosterIndex::new(&users);
    let records = store.acknowledgments_for_version(&doc.id, &doc.version).await?;
    let split = reconcile(&doc, &snapshot.entries, &index, &records);

    let acknowledged_total = split.acknowledged.len();
    let not_acknowledged_total = split.not_acknowledged.len();

    Ok(DocumentDetail {
        data_as_of: snapshot.last_synced_at,
        required_since: doc.required_since(),
        acknowledged_count: acknowledged_total,
        not_acknowledged_count: not_acknowledged_total,
        percentage: split.percentage(),
        acknowledged_users: page.slice(&split.acknowledged).to_vec(),
        not_acknowledged_users: page.slice(&split.not_acknowledged).to_vec(),
        pagination: PaginationInfo {
            page: page.page,
            page_size: page.page_size,
            acknowledged_total,
            acknowledged_pages: page.total_pages(acknowledged_total),
            not_acknowledged_total,
            not_acknowledged_pages: page.total_pages(not_acknowledged_total),
        },
        document: doc,
    })
}
