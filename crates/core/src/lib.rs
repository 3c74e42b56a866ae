pub mod audit;
pub mod config;
pub mod doctrine;
pub mod domain;
pub mod errors;
pub mod evidence;
pub mod fallback;
pub mod snapshot;
pub mod stats;

pub use doctrine::{
    check_season_sanity, patch_decision_if_needed, scan_forbidden_terms, DecisionPatch,
    ForbiddenScan, PatchReason, SeasonSanity, ValidationOutcome,
};
pub use domain::conclusion::Conclusion;
pub use domain::records::{InputCostChange, RawActivityRecord, RawInvoice, RawQuote, RecordBundle};
pub use domain::snapshot::{Band, ConfidenceLevel, Snapshot};
pub use errors::{DoctrineViolation, InferenceError, SnapshotError};
pub use evidence::{
    deterministic_evidence_patch, list_evidence_leaf_candidates, validate_evidence_signals,
    EvidenceIndex, EvidenceLeafCandidate,
};
pub use fallback::insufficient_evidence_conclusion;
pub use snapshot::{build_snapshot, SnapshotBuilder};
