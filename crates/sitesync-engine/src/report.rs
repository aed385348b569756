//! Run report and statistics.
//!
//! Every decision the engine takes appends exactly one event to the run's
//! report. The report is append-only and renderable as tabular rows; the
//! statistics aggregate counts by area and change kind.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reconciliation domain an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportArea {
    /// User/role reconciliation.
    User,
    /// Group existence reconciliation.
    Group,
    /// Group-membership reconciliation.
    Membership,
    /// Content ownership remapping.
    Ownership,
    /// Configuration-level observations (e.g. pattern matched nothing).
    Config,
}

impl ReportArea {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportArea::User => "user",
            ReportArea::Group => "group",
            ReportArea::Membership => "membership",
            ReportArea::Ownership => "ownership",
            ReportArea::Config => "config",
        }
    }
}

impl fmt::Display for ReportArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of modification an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Entity created on the site.
    Added,
    /// Entity corrected in place.
    Modified,
    /// Entity deleted from the site.
    Removed,
    /// User demoted to the unlicensed role.
    Unlicensed,
    /// Discrepancy observed, no mutation attempted (report-only policy).
    Reported,
    /// Mutation attempted and refused or failed.
    Error,
}

impl ChangeKind {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
            ChangeKind::Unlicensed => "unlicensed",
            ChangeKind::Reported => "reported",
            ChangeKind::Error => "error",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEvent {
    /// Reconciliation domain.
    pub area: ReportArea,
    /// Entity name the decision concerns.
    pub entity: String,
    /// Kind of modification.
    pub kind: ChangeKind,
    /// Value before the change, where applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// Value after the change, where applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Free-form note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// When the decision was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ReportEvent {
    /// Create a new event.
    pub fn new(area: ReportArea, entity: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            area,
            entity: entity.into(),
            kind,
            before: None,
            after: None,
            note: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach a before value.
    #[must_use]
    pub fn with_before(mut self, before: impl Into<String>) -> Self {
        self.before = Some(before.into());
        self
    }

    /// Attach an after value.
    #[must_use]
    pub fn with_after(mut self, after: impl Into<String>) -> Self {
        self.after = Some(after.into());
        self
    }

    /// Attach a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Whether this event records a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == ChangeKind::Error
    }
}

/// Counts accumulated over a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Events broken down by `area.kind`.
    #[serde(default)]
    pub events_by_kind: HashMap<String, u32>,
    /// Entities examined and found already in sync (no event emitted).
    #[serde(default)]
    pub in_sync: u32,
    /// Failure events.
    #[serde(default)]
    pub errors: u32,
    /// Total duration in seconds.
    #[serde(default)]
    pub duration_seconds: u64,
}

impl RunStatistics {
    /// Create new empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for one area/kind combination.
    #[must_use]
    pub fn count(&self, area: ReportArea, kind: ChangeKind) -> u32 {
        self.events_by_kind
            .get(&format!("{area}.{kind}"))
            .copied()
            .unwrap_or(0)
    }

    /// Merge with another statistics instance.
    pub fn merge(&mut self, other: &RunStatistics) {
        for (key, value) in &other.events_by_kind {
            *self.events_by_kind.entry(key.clone()).or_insert(0) += value;
        }
        self.in_sync += other.in_sync;
        self.errors += other.errors;
    }

    fn record(&mut self, event: &ReportEvent) {
        *self
            .events_by_kind
            .entry(format!("{}.{}", event.area, event.kind))
            .or_insert(0) += 1;
        if event.is_error() {
            self.errors += 1;
        }
    }
}

/// Append-only log of every decision taken during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Events in the order they were recorded.
    pub events: Vec<ReportEvent>,
    /// Aggregated counts.
    pub statistics: RunStatistics,
}

impl RunReport {
    /// Create an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event, updating statistics.
    pub fn push(&mut self, event: ReportEvent) {
        self.statistics.record(&event);
        self.events.push(event);
    }

    /// Count an entity examined and found already in sync.
    pub fn note_in_sync(&mut self) {
        self.statistics.in_sync += 1;
    }

    /// Events for one area.
    pub fn events_for(&self, area: ReportArea) -> impl Iterator<Item = &ReportEvent> {
        self.events.iter().filter(move |e| e.area == area)
    }

    /// Column headers matching [`RunReport::to_rows`].
    #[must_use]
    pub fn header() -> [&'static str; 6] {
        ["area", "entity", "kind", "before", "after", "note"]
    }

    /// Render events as tabular rows (for CSV or console output).
    #[must_use]
    pub fn to_rows(&self) -> Vec<[String; 6]> {
        self.events
            .iter()
            .map(|e| {
                [
                    e.area.to_string(),
                    e.entity.clone(),
                    e.kind.to_string(),
                    e.before.clone().unwrap_or_default(),
                    e.after.clone().unwrap_or_default(),
                    e.note.clone().unwrap_or_default(),
                ]
            })
            .collect()
    }
}
