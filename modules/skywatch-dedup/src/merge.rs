//! Canonical selection and field-level merge semantics.

use skywatch_common::{IncidentRecord, SkywatchError};

/// The two roles in a merge. The canonical record survives; the absorbed one
/// is deleted after its citations move over.
#[derive(Debug)]
pub struct MergeDecision<'a> {
    pub canonical: &'a IncidentRecord,
    pub absorbed: &'a IncidentRecord,
}

/// Decide which of a matched pair survives: the earlier `occurred_at` wins,
/// ties break to the smaller id.
///
/// Matching already guarantees a shared asset type and present timestamps;
/// both are re-checked so a bad pair surfaces as an InvariantViolation the
/// caller can log and skip instead of corrupting the set.
pub fn resolve<'a>(
    a: &'a IncidentRecord,
    b: &'a IncidentRecord,
) -> Result<MergeDecision<'a>, SkywatchError> {
    if a.asset_type != b.asset_type {
        return Err(SkywatchError::InvariantViolation(format!(
            "records {} and {} disagree on asset type ({} vs {})",
            a.id, b.id, a.asset_type, b.asset_type
        )));
    }
    let (Some(occurred_a), Some(occurred_b)) = (a.occurred_at, b.occurred_at) else {
        return Err(SkywatchError::InvariantViolation(format!(
            "records {} and {} reached merge without occurred_at",
            a.id, b.id
        )));
    };

    if (occurred_a, a.id) <= (occurred_b, b.id) {
        Ok(MergeDecision {
            canonical: a,
            absorbed: b,
        })
    } else {
        Ok(MergeDecision {
            canonical: b,
            absorbed: a,
        })
    }
}

/// Fold the absorbed record's observation window into the canonical record:
/// `first_seen_at` takes the min, `last_seen_at` the max, `occurred_at` the
/// earliest known. Every other field keeps the canonical value.
pub fn merge_fields(canonical: &mut IncidentRecord, absorbed: &IncidentRecord) {
    canonical.first_seen_at = canonical.first_seen_at.min(absorbed.first_seen_at);
    canonical.last_seen_at = canonical.last_seen_at.max(absorbed.last_seen_at);
    canonical.occurred_at = match (canonical.occurred_at, absorbed.occurred_at) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
}
