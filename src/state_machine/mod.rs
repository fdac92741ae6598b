// Status state machine for the report/offer lifecycle.
//
// Validates and enforces allowed transitions; the transition table in
// `machine` is the single source of truth for status movement across the
// whole core.

pub mod machine;
pub mod states;

pub use machine::{apply, apply_persisted, can_transition, TransitionOutcome};
pub use states::OfferStatus;
