//! Decision Runtime - turns a Snapshot into one grounded Conclusion
//!
//! This crate wraps the external text generator and never trusts its output:
//! - Sends the Snapshot with the Conclusion contract to the generator
//! - Validates the candidate (schema, evidence grounding, forbidden vocabulary)
//! - Repairs it once by asking for a rewrite, then by patching evidence
//! - Falls back to a deterministic Conclusion when repair is not possible
//!
//! # Flow
//!
//! 1. **Primary** (`prompts`, `llm`) - one generator call with the Snapshot
//! 2. **Guardrails** (`guardrails`) - tagged verdict: valid, rewrite, patch, fallback
//! 3. **Repair** (`runtime`) - a single rewrite call, then the evidence patch
//! 4. **Finish** (`runtime`) - season confidence cap and decision text patch
//!
//! # Key Types
//!
//! - `DecisionRuntime` - orchestrator entry point (`infer_decision`)
//! - `ConclusionGenerator` - pluggable generator trait (mock or subprocess)
//! - `InferenceDiagnostics` - which stage produced the result and why
//!
//! # Safety Principle
//!
//! The generator only proposes wording. Every number it cites must already
//! exist in the Snapshot, and a request always ends in a valid Conclusion
//! unless the generator has no credential.

pub mod diagnostics;
pub mod guardrails;
pub mod llm;
pub mod mock;
pub mod prompts;
pub mod runtime;

pub use diagnostics::{InferenceDiagnostics, InferenceStage};
pub use llm::{CommandGenerator, ConclusionGenerator, GeneratorOutput};
pub use mock::MockGenerator;
pub use runtime::{DecisionRuntime, InferenceResult};
