//! Citation reparenting.
//!
//! When a record is absorbed its evidence must not vanish with it: citations
//! move to the canonical record, and an absorbed record with no citations
//! leaves a synthesized provenance citation behind so the merge stays
//! visible on the surviving record.

use std::cmp::Reverse;

use uuid::Uuid;

use skywatch_common::{IncidentRecord, Source, SourceCitation, SourceDirectory, SourceType};

use crate::config::DedupConfig;

/// Counters for one reparenting pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReparentStats {
    pub moved: u32,
    pub skipped: u32,
    pub synthesized: bool,
}

/// Stable provenance URL for an absorbed record. Derived from the record id,
/// so re-running the same merge can recognize the citation it already left.
pub fn provenance_url(absorbed_id: Uuid) -> String {
    format!("urn:skywatch:incident:{absorbed_id}")
}

/// Move the absorbed record's citations onto the canonical record.
///
/// A citation whose URL the canonical record already carries is dropped (the
/// canonical copy wins). An absorbed record with no citations gets a
/// synthesized provenance citation instead; its outlet is resolved through
/// the directory by (domain, type) identity, and a newly created outlet is
/// returned so the caller can persist it before the citation row lands.
/// The combined list is re-sorted by trust weight desc, then published_at
/// desc with undated citations last; the sort is stable, so ties keep
/// insertion order.
pub fn reparent_sources(
    canonical: &mut IncidentRecord,
    absorbed: &IncidentRecord,
    directory: &mut SourceDirectory,
    config: &DedupConfig,
) -> (ReparentStats, Option<Source>) {
    let mut stats = ReparentStats::default();
    let mut created = None;

    if absorbed.sources.is_empty() {
        let url = provenance_url(absorbed.id);
        if !canonical.has_citation_url(&url) {
            let (source_id, new_source) =
                directory.ensure(&config.provenance_domain, SourceType::Other, 1);
            created = new_source;
            let quote = if absorbed.narrative.is_empty() {
                absorbed.title.clone()
            } else {
                absorbed.narrative.clone()
            };
            canonical.sources.push(SourceCitation {
                id: Uuid::new_v4(),
                source_id,
                url,
                title: Some(absorbed.title.clone()),
                quote: Some(quote),
                published_at: Some(absorbed.first_seen_at),
            });
            stats.synthesized = true;
        }
    } else {
        for citation in &absorbed.sources {
            if canonical.has_citation_url(&citation.url) {
                stats.skipped += 1;
            } else {
                canonical.sources.push(citation.clone());
                stats.moved += 1;
            }
        }
    }

    sort_citations(&mut canonical.sources, directory);
    (stats, created)
}

/// Trust weight desc, then published_at desc with undated last.
pub fn sort_citations(citations: &mut [SourceCitation], directory: &SourceDirectory) {
    citations.sort_by_key(|c| {
        (
            Reverse(directory.trust_weight(c.source_id)),
            Reverse(c.published_at),
        )
    });
}
