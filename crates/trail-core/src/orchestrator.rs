//! The verification orchestrator: runs every stage over one audit log.
//!
//! Pipeline order is fixed:
//!
//!   Structure → HashChain → StateHash → Signature → Replay (optional)
//!
//! Every stage appends its failures to one ordered error list.  With
//! `fail_fast` the orchestrator returns right after the first stage that
//! produced an error; otherwise all stages run and the report contains the
//! failures of every stage.  Fail-fast never changes *what* a stage reports
//! for the entries it already processed.
//!
//! A stage that cannot run at all (replay on a malformed identity, a panic
//! inside a pluggable stage, cancellation) contributes one terminal error
//! tagged with that stage.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use trail_audit::{verify_chain, verify_state_hash};
use trail_contracts::{
    audit::AuditLog,
    error::TrailResult,
    report::{StepError, VerificationResult, VerificationStep},
};

use crate::cancel::CancellationToken;
use crate::source::load_audit;
use crate::traits::{Replayer, SignatureVerifier, StructureValidator, Transport};

/// Stage order.  Replay is last so that it only ever runs over a log whose
/// integrity checks have already been reported.
const PIPELINE: [VerificationStep; 5] = [
    VerificationStep::Structure,
    VerificationStep::HashChain,
    VerificationStep::StateHash,
    VerificationStep::Signature,
    VerificationStep::Replay,
];

/// Per-run options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Stop after the first stage that reports an error.
    pub fail_fast: bool,
    /// Protocol sources to replay against; replay is skipped when `None`.
    pub sources: Option<PathBuf>,
}

/// Composes the verification stages into one pipeline.
///
/// The orchestrator owns the pluggable stages; the audit log is borrowed
/// read-only for the duration of one `verify()` call.
pub struct Orchestrator {
    structure: Box<dyn StructureValidator>,
    signatures: Box<dyn SignatureVerifier>,
    replayer: Option<Box<dyn Replayer>>,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Create an orchestrator without a replay stage.
    pub fn new(
        structure: Box<dyn StructureValidator>,
        signatures: Box<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            structure,
            signatures,
            replayer: None,
            cancel: CancellationToken::default(),
        }
    }

    /// Attach the replay stage.  It runs only when `VerifyOptions::sources`
    /// is set.
    pub fn with_replayer(mut self, replayer: Box<dyn Replayer>) -> Self {
        self.replayer = Some(replayer);
        self
    }

    /// Share a cancellation token with the caller.  Once cancelled, the next
    /// stage records a terminal error instead of running.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Load the audit document at `source` and verify it.
    ///
    /// # Errors
    ///
    /// Returns `Err` only when the document cannot be loaded or parsed.
    /// Verification failures are reported in the `VerificationResult`.
    pub fn verify_source(
        &self,
        source: &str,
        transport: &dyn Transport,
        options: &VerifyOptions,
    ) -> TrailResult<VerificationResult> {
        let log = load_audit(source, transport)?;
        Ok(self.verify(&log, options))
    }

    /// Run the pipeline over `log`.
    pub fn verify(&self, log: &AuditLog, options: &VerifyOptions) -> VerificationResult {
        let replay_enabled = options.sources.is_some() && self.replayer.is_some();
        let mut errors: Vec<StepError> = Vec::new();

        info!(
            entries = log.entries.len(),
            fail_fast = options.fail_fast,
            replay = replay_enabled,
            "verification starting"
        );

        for step in PIPELINE {
            if step == VerificationStep::Replay && !replay_enabled {
                debug!("replay not requested; skipping");
                break;
            }
            if self.cancel.is_cancelled() {
                warn!(%step, "verification cancelled");
                errors.push(StepError::new(step, "verification cancelled before this stage"));
                break;
            }

            let stage_errors = run_contained(step, || self.run_stage(step, log, options));
            debug!(%step, failures = stage_errors.len(), "stage complete");

            let failed = !stage_errors.is_empty();
            errors.extend(stage_errors);

            if failed && options.fail_fast {
                info!(%step, "fail-fast: skipping remaining stages");
                break;
            }
        }

        let result = VerificationResult::from_errors(errors);
        info!(
            success = result.success,
            failures = result.errors.len(),
            "verification complete"
        );
        result
    }

    fn run_stage(
        &self,
        step: VerificationStep,
        log: &AuditLog,
        options: &VerifyOptions,
    ) -> Vec<StepError> {
        match step {
            VerificationStep::Structure => self.structure.validate(log),
            VerificationStep::HashChain => verify_chain(&log.entries),
            VerificationStep::StateHash => verify_state_hash(log),
            VerificationStep::Signature => self
                .signatures
                .verify_signatures(&log.entries, options.fail_fast),
            VerificationStep::Replay => {
                let (Some(replayer), Some(sources)) = (&self.replayer, &options.sources) else {
                    return Vec::new();
                };
                match replayer.replay(log, sources) {
                    Ok(report) => {
                        info!(
                            replayed = report.entries_replayed,
                            failures = report.errors.len(),
                            "replay finished"
                        );
                        report
                            .errors
                            .into_iter()
                            .map(|message| StepError::new(VerificationStep::Replay, message))
                            .collect()
                    }
                    Err(e) => vec![StepError::new(
                        VerificationStep::Replay,
                        format!("replay aborted: {e}"),
                    )],
                }
            }
        }
    }
}

/// Run one stage, converting a panic into a single terminal error.
fn run_contained(
    step: VerificationStep,
    stage: impl FnOnce() -> Vec<StepError>,
) -> Vec<StepError> {
    match catch_unwind(AssertUnwindSafe(stage)) {
        Ok(errors) => errors,
        Err(payload) => {
            let message = format!(
                "{step} stage failed unexpectedly: {}",
                panic_message(payload.as_ref())
            );
            warn!(%step, %message, "stage panicked");
            vec![StepError::new(step, message)]
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
