// Export history - Recently downloaded reports, newest first
use crate::domain::error::ExportError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

const MAX_TITLE: usize = 255;
const MAX_SRC: usize = 1024;
const MAX_FORMAT: usize = 20;
const MAX_DASHBOARD: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRecord {
    pub id: u64,
    pub title: String,
    pub src: String,
    pub format: String,
    pub dashboard: String,
    pub created_at: DateTime<Utc>,
}

/// Body of a log request. Every field is optional and blank values take
/// the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewExport {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub dashboard: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub exports: Vec<ExportRecord>,
    pub pagination: Pagination,
}

fn field(value: Option<String>, default: &str, max: usize, name: &str) -> Result<String, ExportError> {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.chars().count() > max {
        return Err(ExportError::invalid(format!("{} exceeds {} characters", name, max)));
    }
    Ok(if value.is_empty() { default.to_string() } else { value })
}

struct Ledger {
    next_id: u64,
    records: VecDeque<ExportRecord>,
}

/// Bounded in-memory ledger; the oldest entry is evicted once `capacity`
/// is reached.
pub struct ExportHistory {
    capacity: usize,
    ledger: RwLock<Ledger>,
}

impl ExportHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ledger: RwLock::new(Ledger {
                next_id: 1,
                records: VecDeque::with_capacity(capacity.min(1024)),
            }),
        }
    }

    pub fn record(&self, entry: NewExport) -> Result<ExportRecord, ExportError> {
        let title = field(entry.title, "Untitled Report", MAX_TITLE, "title")?;
        let src = field(entry.src, "", MAX_SRC, "src")?;
        let format = field(entry.format, "unknown", MAX_FORMAT, "format")?.to_lowercase();
        let dashboard = field(entry.dashboard, "general", MAX_DASHBOARD, "dashboard")?;

        let mut ledger = self.ledger.write();
        let record = ExportRecord {
            id: ledger.next_id,
            title,
            src,
            format,
            dashboard,
            created_at: Utc::now(),
        };
        ledger.next_id += 1;
        ledger.records.push_front(record.clone());
        if ledger.records.len() > self.capacity {
            if let Some(evicted) = ledger.records.pop_back() {
                tracing::debug!(id = evicted.id, "evicted oldest export record");
            }
        }
        tracing::info!(id = record.id, format = %record.format, dashboard = %record.dashboard, "logged export");
        Ok(record)
    }

    /// One page of records whose title contains `search` (case-insensitive).
    /// `limit` is clamped to 1..=200 and `page` to at least 1.
    pub fn recent(&self, query: &HistoryQuery) -> HistoryPage {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) as usize;
        let page = query.page.unwrap_or(1).max(1) as usize;
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let ledger = self.ledger.read();
        let matching: Vec<&ExportRecord> = ledger
            .records
            .iter()
            .filter(|r| needle.as_ref().is_none_or(|n| r.title.to_lowercase().contains(n.as_str())))
            .collect();
        let total = matching.len();
        let offset = (page - 1).saturating_mul(limit);
        let exports = matching.into_iter().skip(offset).take(limit).cloned().collect();

        HistoryPage {
            exports,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: total.div_ceil(limit),
                has_next: offset.saturating_add(limit) < total,
                has_prev: page > 1,
            },
        }
    }

    pub fn remove(&self, id: u64) -> Option<ExportRecord> {
        let mut ledger = self.ledger.write();
        let index = ledger.records.iter().position(|r| r.id == id)?;
        ledger.records.remove(index)
    }

    pub fn stored(&self) -> usize {
        self.ledger.read().records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> NewExport {
        NewExport {
            title: Some(title.to_string()),
            src: Some(format!("/exports/{}.pdf", title)),
            format: Some("PDF".to_string()),
            dashboard: Some("risks".to_string()),
        }
    }

    fn query(limit: Option<i64>, page: Option<i64>, search: Option<&str>) -> HistoryQuery {
        HistoryQuery {
            limit,
            page,
            search: search.map(str::to_string),
        }
    }

    #[test]
    fn test_blank_fields_take_defaults() {
        let history = ExportHistory::new(10);
        let record = history
            .record(NewExport {
                title: Some("   ".to_string()),
                ..NewExport::default()
            })
            .unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.title, "Untitled Report");
        assert_eq!(record.src, "");
        assert_eq!(record.format, "unknown");
        assert_eq!(record.dashboard, "general");

        let pdf = history.record(entry("Q1 Risks")).unwrap();
        assert_eq!(pdf.id, 2);
        assert_eq!(pdf.format, "pdf");
    }

    #[test]
    fn test_overlong_title_is_rejected() {
        let history = ExportHistory::new(10);
        let err = history.record(entry(&"x".repeat(256))).unwrap_err();
        assert!(matches!(err, ExportError::InvalidRequest(_)));
        assert_eq!(history.stored(), 0);
    }

    #[test]
    fn test_recent_is_newest_first_and_paginated() {
        let history = ExportHistory::new(100);
        for i in 1..=5 {
            history.record(entry(&format!("Report {}", i))).unwrap();
        }

        let first = history.recent(&query(Some(2), None, None));
        let titles: Vec<&str> = first.exports.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Report 5", "Report 4"]);
        assert_eq!(
            first.pagination,
            Pagination {
                page: 1,
                limit: 2,
                total: 5,
                total_pages: 3,
                has_next: true,
                has_prev: false,
            }
        );

        let last = history.recent(&query(Some(2), Some(3), None));
        assert_eq!(last.exports.len(), 1);
        assert_eq!(last.exports[0].title, "Report 1");
        assert!(!last.pagination.has_next);
        assert!(last.pagination.has_prev);

        let beyond = history.recent(&query(Some(2), Some(9), None));
        assert!(beyond.exports.is_empty());
    }

    #[test]
    fn test_limits_are_clamped() {
        let history = ExportHistory::new(10);
        history.record(entry("a")).unwrap();
        assert_eq!(history.recent(&query(Some(0), Some(-3), None)).pagination.limit, 1);
        assert_eq!(history.recent(&query(Some(0), Some(-3), None)).pagination.page, 1);
        assert_eq!(history.recent(&query(Some(5000), None, None)).pagination.limit, 200);
        assert_eq!(history.recent(&HistoryQuery::default()).pagination.limit, 50);

        let empty = ExportHistory::new(10).recent(&HistoryQuery::default());
        assert_eq!(empty.pagination.total_pages, 0);
        assert!(!empty.pagination.has_next);
    }

    #[test]
    fn test_search_matches_title_case_insensitively() {
        let history = ExportHistory::new(10);
        history.record(entry("Risks Q1")).unwrap();
        history.record(entry("Controls Q1")).unwrap();
        history.record(entry("risks q2")).unwrap();

        let page = history.recent(&query(None, None, Some("  RISKS ")));
        let titles: Vec<&str> = page.exports.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["risks q2", "Risks Q1"]);
        assert_eq!(page.pagination.total, 2);
    }

    #[test]
    fn test_capacity_evicts_oldest_and_remove() {
        let history = ExportHistory::new(2);
        let first = history.record(entry("one")).unwrap();
        let second = history.record(entry("two")).unwrap();
        history.record(entry("three")).unwrap();
        assert_eq!(history.stored(), 2);
        assert!(history.remove(first.id).is_none());

        assert_eq!(history.remove(second.id).map(|r| r.title), Some("two".to_string()));
        assert!(history.remove(second.id).is_none());
        assert_eq!(history.stored(), 1);
    }
}
