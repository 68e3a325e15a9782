//! Verification outcome types.
//!
//! Every stage of the pipeline reports failures as `StepError` values tagged
//! with the stage that produced them.  `VerificationResult` is the final,
//! serializable outcome; it is successful exactly when no errors were
//! collected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The pipeline stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VerificationStep {
    Structure,
    HashChain,
    StateHash,
    Signature,
    Replay,
}

impl VerificationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStep::Structure => "Structure",
            VerificationStep::HashChain => "HashChain",
            VerificationStep::StateHash => "StateHash",
            VerificationStep::Signature => "Signature",
            VerificationStep::Replay => "Replay",
        }
    }
}

impl fmt::Display for VerificationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failure reported by one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub step: VerificationStep,
    pub message: String,
}

impl StepError {
    pub fn new(step: VerificationStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.step, self.message)
    }
}

/// The final outcome of one verification run.
///
/// Serializes as `{ "success": bool, "errors": [{ "step", "message" }] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// True only if `errors` is empty.
    pub success: bool,
    /// Failures in the order the pipeline produced them.
    pub errors: Vec<StepError>,
}

impl VerificationResult {
    /// Build a result, deriving `success` from the error list.
    pub fn from_errors(errors: Vec<StepError>) -> Self {
        Self {
            success: errors.is_empty(),
            errors,
        }
    }

    /// Errors produced by one stage.
    pub fn errors_for(&self, step: VerificationStep) -> impl Iterator<Item = &StepError> {
        self.errors.iter().filter(move |e| e.step == step)
    }
}

/// The outcome of replaying an audit log against a live runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// True only if `errors` is empty.
    pub success: bool,
    /// Entries for which a runtime call succeeded.
    pub entries_replayed: usize,
    /// One message per diverging or failing entry, in log order.
    pub errors: Vec<String>,
}

impl ReplayReport {
    pub fn new(entries_replayed: usize, errors: Vec<String>) -> Self {
        Self {
            success: errors.is_empty(),
            entries_replayed,
            errors,
        }
    }
}
