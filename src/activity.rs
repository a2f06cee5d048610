//! Activity log pagination.
//!
//! Activity records are written elsewhere; the gateway only reads them, in
//! strict reverse-chronological order, 25 to a page. Row numbers are a global
//! rank across the whole log (page 2 starts at 26), so the dashboard can show
//! a continuous numbering while paging.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::uri::PathResolver;

/// Records per page.
pub const PAGE_SIZE: u64 = 25;

/// Timestamp format used by the dashboard (`17 Mar 2024 09:41`).
const TIME_FORMAT: &str = "%d %b %Y %H:%M";

/// One persisted activity event. Immutable once written; the gateway never
/// mutates or deletes records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Content hash of the event.
    pub hash: String,
    /// Originating identity (e.g. the modem's subscriber id).
    pub origin: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    pub data: String,
    pub status: String,
    pub time: DateTime<Utc>,
}

/// Fetch window passed to the store. Offsets are derived from a page number
/// already clamped to >= 1, so they are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub offset: u64,
    pub limit: u64,
}

/// The store failed to serve a read.
#[derive(Debug, Error)]
#[error("activity store: {0}")]
pub struct StoreError(pub String);

/// Read surface of the activity store.
///
/// `count` and `find_all` are two independent reads; a record appended
/// between them can skew `count` versus the items by at most one. Accepted.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn count(&self) -> Result<u64, StoreError>;

    /// Fetch up to `window.limit` records ordered strictly descending by
    /// time, skipping `window.offset`.
    async fn find_all(&self, window: FetchWindow) -> Result<Vec<ActivityRecord>, StoreError>;
}

/// A row as rendered to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityItem {
    /// Global rank, `offset + 1` onward.
    pub nr: u64,
    pub hash: String,
    pub origin: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    pub data: String,
    pub status: String,
    pub time: String,
}

/// One page of activity plus its pagination links.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityPage {
    pub count: u64,
    pub items: Vec<ActivityItem>,
    pub pages: Pages,
}

/// Fetch and shape one page of the activity log.
///
/// `page` is clamped to >= 1; callers may pass whatever the URL produced.
pub async fn page(
    store: &dyn ActivityStore,
    page: u64,
    resolver: &PathResolver,
) -> Result<ActivityPage, StoreError> {
    let page = page.max(1);
    let count = store.count().await?;
    let offset = (page - 1) * PAGE_SIZE;
    let records = store
        .find_all(FetchWindow {
            offset,
            limit: PAGE_SIZE,
        })
        .await?;

    let items = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| ActivityItem {
            nr: offset + 1 + i as u64,
            hash: record.hash,
            origin: record.origin,
            kind: record.kind,
            address: record.address,
            data: record.data,
            status: record.status,
            time: record.time.format(TIME_FORMAT).to_string(),
        })
        .collect();

    Ok(ActivityPage {
        count,
        items,
        pages: pager(count, PAGE_SIZE, page, resolver),
    })
}

/// Pagination link structure for the dashboard.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pages {
    pub page: u64,
    pub page_count: u64,
    pub links: Vec<PageLink>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageLink {
    pub page: u64,
    pub url: String,
    pub current: bool,
}

/// How many numbered links to show around the current page.
const PAGER_WINDOW: u64 = 7;

/// Build pagination links from `(count, page_size, page)`.
///
/// Shows a window of up to [`PAGER_WINDOW`] numbered links centered on the
/// current page. An empty log yields a single page with one link.
pub fn pager(count: u64, page_size: u64, page: u64, resolver: &PathResolver) -> Pages {
    let page_count = (count.div_ceil(page_size)).max(1);
    let page = page.clamp(1, page_count);

    let half = PAGER_WINDOW / 2;
    let first = if page > half { page - half } else { 1 };
    let last = (first + PAGER_WINDOW - 1).min(page_count);
    let first = if last >= PAGER_WINDOW { last - PAGER_WINDOW + 1 } else { 1 };

    let links = (first..=last)
        .map(|n| PageLink {
            page: n,
            url: resolver.resolve(&format!("/activity/{}", n)),
            current: n == page,
        })
        .collect();

    Pages {
        page,
        page_count,
        links,
    }
}

/// In-memory activity store. Backs tests and the standalone binary; a real
/// deployment points the gateway at the pool's database instead.
#[derive(Clone, Default)]
pub struct MemoryActivityStore {
    records: Arc<RwLock<Vec<ActivityRecord>>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(&self, record: ActivityRecord) {
        self.records.write().push(record);
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.read().len() as u64)
    }

    async fn find_all(&self, window: FetchWindow) -> Result<Vec<ActivityRecord>, StoreError> {
        let mut records = self.records.read().clone();
        records.sort_by(|a, b| b.time.cmp(&a.time));
        Ok(records
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect())
    }
}
