pub mod config;
pub mod engine;
pub mod evidence;
pub mod geokey;
pub mod matcher;
pub mod merge;
pub mod reparent;

pub use config::{DedupConfig, RadiusTable};
pub use engine::{
    CancelFlag, ConvergenceStatus, DedupEngine, DedupOutcome, DedupStats, MergeLogEntry,
    MERGE_REASON_PROXIMITY,
};
pub use geokey::GeoKey;
pub use matcher::{MalformedReason, MalformedRecord, MatchedPair};
