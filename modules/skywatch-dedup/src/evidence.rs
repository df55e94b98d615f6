//! Evidence scoring over a record's citation set.

use std::collections::HashSet;

use uuid::Uuid;

use skywatch_common::{SourceCitation, SourceDirectory};

/// Score a citation set from scratch:
///
/// - 4: at least one official outlet (police, military, aviation, NOTAM)
/// - 3: two or more distinct outlets
/// - 2: exactly one outlet
/// - 1: nothing attached
///
/// Distinctness counts outlets (`source_id`), not citation rows: five
/// articles from one newspaper are still a single voice.
pub fn score_citations(citations: &[SourceCitation], directory: &SourceDirectory) -> u8 {
    if citations
        .iter()
        .any(|c| directory.is_official(c.source_id))
    {
        return 4;
    }
    let distinct: HashSet<Uuid> = citations.iter().map(|c| c.source_id).collect();
    match distinct.len() {
        0 => 1,
        1 => 2,
        _ => 3,
    }
}

/// Post-merge score: recomputed over the combined citation set, but never
/// lower than the score the canonical record walked in with.
pub fn merged_score(current: u8, citations: &[SourceCitation], directory: &SourceDirectory) -> u8 {
    current.max(score_citations(citations, directory)).min(4)
}
