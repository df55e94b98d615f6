//! The dedup engine: repeated scan-and-merge until the active set is stable.
//!
//! One merge per iteration, full rescan after each. A merge changes the
//! canonical record's citation set and observation window, so pair decisions
//! are never reused across merges. The scan order is deterministic, which
//! makes the merge sequence reproducible for a given record set regardless
//! of storage order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use skywatch_common::{IncidentRecord, SourceDirectory};
use skywatch_store::IncidentStore;

use crate::config::DedupConfig;
use crate::evidence;
use crate::matcher::{self, MalformedRecord};
use crate::merge;
use crate::reparent;

// ---------------------------------------------------------------------------
// Run outcome types
// ---------------------------------------------------------------------------

/// Reason recorded on every merge log entry.
pub const MERGE_REASON_PROXIMITY: &str = "proximity+asset_type";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    /// No merge-eligible pair remains.
    Converged,
    /// The per-run merge bound was hit with eligible pairs left. The next
    /// run resumes from persisted state.
    IterationCapReached,
    /// The cancel flag was raised between iterations.
    Cancelled,
}

impl std::fmt::Display for ConvergenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvergenceStatus::Converged => write!(f, "converged"),
            ConvergenceStatus::IterationCapReached => write!(f, "iteration_cap_reached"),
            ConvergenceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One applied merge, in application order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeLogEntry {
    pub canonical_id: Uuid,
    pub absorbed_id: Uuid,
    /// Title of the deleted record, kept for the audit trail.
    pub absorbed_title: String,
    pub reason: String,
    pub distance_meters: f64,
}

/// Counters for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupStats {
    pub records_scanned: u32,
    pub merges_applied: u32,
    pub citations_moved: u32,
    pub citations_skipped: u32,
    pub citations_synthesized: u32,
    pub records_malformed: u32,
    pub invariant_violations: u32,
    pub records_remaining: u32,
    pub status: ConvergenceStatus,
}

impl Default for DedupStats {
    fn default() -> Self {
        Self {
            records_scanned: 0,
            merges_applied: 0,
            citations_moved: 0,
            citations_skipped: 0,
            citations_synthesized: 0,
            records_malformed: 0,
            invariant_violations: 0,
            records_remaining: 0,
            status: ConvergenceStatus::Converged,
        }
    }
}

impl std::fmt::Display for DedupStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Dedup Complete ===")?;
        writeln!(f, "Records scanned:       {}", self.records_scanned)?;
        writeln!(f, "Merges applied:        {}", self.merges_applied)?;
        writeln!(f, "Citations moved:       {}", self.citations_moved)?;
        writeln!(f, "Citations skipped:     {}", self.citations_skipped)?;
        writeln!(f, "Citations synthesized: {}", self.citations_synthesized)?;
        writeln!(f, "Records malformed:     {}", self.records_malformed)?;
        writeln!(f, "Invariant violations:  {}", self.invariant_violations)?;
        writeln!(f, "Records remaining:     {}", self.records_remaining)?;
        writeln!(f, "Status:                {}", self.status)?;
        Ok(())
    }
}

/// Everything a run produced: the post-run record set, the merge log, and
/// per-record reports.
#[derive(Debug)]
pub struct DedupOutcome {
    pub records: Vec<IncidentRecord>,
    pub merge_log: Vec<MergeLogEntry>,
    pub malformed: Vec<MalformedRecord>,
    pub violations: Vec<String>,
    pub stats: DedupStats,
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation handle, checked between merge iterations. A
/// cancelled run stops cleanly: applied merges stay applied, nothing is left
/// half-done.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct DedupEngine<S> {
    store: S,
    config: DedupConfig,
}

impl<S: IncidentStore> DedupEngine<S> {
    pub fn new(store: S, config: DedupConfig) -> Self {
        Self { store, config }
    }

    /// Run scan-and-merge to convergence, the iteration cap, or cancellation.
    ///
    /// Each applied merge is persisted atomically before the next scan, so an
    /// interrupted run leaves the store consistent and a later run finishes
    /// the job.
    pub async fn run(&self, cancel: &CancelFlag) -> Result<DedupOutcome> {
        let mut active = self.store.load_incidents().await?;
        let mut directory = SourceDirectory::new(self.store.load_sources().await?);

        let mut stats = DedupStats {
            records_scanned: active.len() as u32,
            ..Default::default()
        };

        let (_, malformed) = matcher::screen_records(&active);
        for report in &malformed {
            warn!(id = %report.id, reason = %report.reason, "Record excluded from matching");
        }
        stats.records_malformed = malformed.len() as u32;

        let mut merge_log: Vec<MergeLogEntry> = Vec::new();
        let mut violations: Vec<String> = Vec::new();
        let mut skip: HashSet<(Uuid, Uuid)> = HashSet::new();

        let status = loop {
            if cancel.is_cancelled() {
                info!(merges = merge_log.len(), "Dedup run cancelled");
                break ConvergenceStatus::Cancelled;
            }

            let (candidates, _) = matcher::screen_records(&active);
            debug!(candidates = candidates.len(), "Scanning for duplicate pair");
            let Some(pair) = matcher::find_next_merge_pair(&candidates, &self.config.radii, &skip)
            else {
                break ConvergenceStatus::Converged;
            };

            if merge_log.len() >= self.config.max_iterations {
                warn!(
                    cap = self.config.max_iterations,
                    "Merge cap hit with eligible pairs left; next run resumes"
                );
                break ConvergenceStatus::IterationCapReached;
            }

            let first = record_by_id(&active, pair.first)?;
            let second = record_by_id(&active, pair.second)?;

            let decision = match merge::resolve(first, second) {
                Ok(decision) => decision,
                Err(err) => {
                    warn!(first = %pair.first, second = %pair.second, %err, "Skipping pair");
                    violations.push(err.to_string());
                    skip.insert((pair.first, pair.second));
                    continue;
                }
            };

            let mut canonical = decision.canonical.clone();
            let absorbed = decision.absorbed.clone();

            merge::merge_fields(&mut canonical, &absorbed);
            let (reparent_stats, new_source) =
                reparent::reparent_sources(&mut canonical, &absorbed, &mut directory, &self.config);
            canonical.evidence_score =
                evidence::merged_score(canonical.evidence_score, &canonical.sources, &directory);

            // A freshly created provenance outlet must exist before the
            // citation row that references it.
            if let Some(source) = &new_source {
                self.store.upsert_source(source).await?;
            }
            self.store.apply_merge(&canonical, absorbed.id).await?;

            info!(
                canonical = %canonical.id,
                absorbed = %absorbed.id,
                distance_m = pair.distance_meters,
                moved = reparent_stats.moved,
                skipped = reparent_stats.skipped,
                score = canonical.evidence_score,
                "Merged duplicate incident"
            );

            active.retain(|r| r.id != absorbed.id);
            if let Some(slot) = active.iter_mut().find(|r| r.id == canonical.id) {
                *slot = canonical.clone();
            }

            stats.citations_moved += reparent_stats.moved;
            stats.citations_skipped += reparent_stats.skipped;
            if reparent_stats.synthesized {
                stats.citations_synthesized += 1;
            }

            merge_log.push(MergeLogEntry {
                canonical_id: canonical.id,
                absorbed_id: absorbed.id,
                absorbed_title: absorbed.title.clone(),
                reason: MERGE_REASON_PROXIMITY.to_string(),
                distance_meters: pair.distance_meters,
            });
        };

        stats.merges_applied = merge_log.len() as u32;
        stats.invariant_violations = violations.len() as u32;
        stats.records_remaining = active.len() as u32;
        stats.status = status;

        info!(
            merges = stats.merges_applied,
            remaining = stats.records_remaining,
            status = %status,
            "Dedup run finished"
        );

        Ok(DedupOutcome {
            records: active,
            merge_log,
            malformed,
            violations,
            stats,
        })
    }
}

fn record_by_id(records: &[IncidentRecord], id: Uuid) -> Result<&IncidentRecord> {
    records
        .iter()
        .find(|r| r.id == id)
        .ok_or_else(|| anyhow::anyhow!("matched record {id} vanished from the active set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_roundtrip() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        let shared = flag.clone();
        shared.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn merge_log_entry_serializes_for_audit() {
        let entry = MergeLogEntry {
            canonical_id: Uuid::from_u128(1),
            absorbed_id: Uuid::from_u128(2),
            absorbed_title: "Second report".to_string(),
            reason: MERGE_REASON_PROXIMITY.to_string(),
            distance_meters: 12.5,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["reason"], "proximity+asset_type");
        assert_eq!(json["distance_meters"], 12.5);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ConvergenceStatus::IterationCapReached).unwrap();
        assert_eq!(json, "\"iteration_cap_reached\"");
    }
}
