//! # ht-mfc
//!
//! The multi-fidelity iteration controller: a time-boxed loop around an
//! opaque bracket-iteration primitive. Each [`iterate`] call runs a few
//! brackets inside its budget slice, merges the returned candidates into
//! the shared incumbent/history state, and performs best-effort cleanup of
//! transient model artifacts.
//!
//! The successive-halving rung bookkeeping itself lives behind
//! [`BracketRunner`]; this crate only rations budget, advances the
//! round-robin bracket cursor, and keeps the incumbent monotone.
//!
//! [`iterate`]: MultiFidelityController::iterate

mod controller;

pub use controller::{
    BracketRunner, CleanupPolicy, EvalKey, IterationOutcome, MfcOptions,
    MultiFidelityController, PipelineStage,
};
