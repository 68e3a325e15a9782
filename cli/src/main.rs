//! `trail`: verify an NPL audit trail from a file or URL.
//!
//! Runs the structure, hash-chain, state-hash and signature checks, and
//! replays the trail against a live runtime when NPL sources are given.
//!
//! Usage:
//!   trail verify --audit audit.json
//!   trail verify --audit https://host/audit.json --sources ./npl --json
//!   trail verify --audit audit.json --did-scheme http --did-host-override localhost:8080
//!
//! Exit codes: 0 verified, 65 verification failures, 1 anything else.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use trail_contracts::{
    error::{TrailError, TrailResult},
    report::VerificationResult,
};
use trail_core::settings::{is_truthy, ENV_VERBOSE};
use trail_core::traits::Transport;
use trail_core::transport::HttpTransport;
use trail_core::{CancellationToken, Orchestrator, VerifierSettings, VerifyOptions};
use trail_did::WebDidResolver;
use trail_replay::ReplayEngine;
use trail_verify::{JwsSignatureVerifier, SchemaStructureValidator};

const EXIT_OK: i32 = 0;
/// `EX_DATAERR`: the audit was read but did not verify.
const EXIT_VERIFICATION_FAILED: i32 = 65;
const EXIT_ERROR: i32 = 1;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Verifier for NPL protocol audit trails.
#[derive(Parser, Debug)]
#[command(
    name = "trail",
    version,
    about = "Verify NPL protocol audit trails",
    long_about = "Checks an audit trail's structure, hash chain, final state hash and\n\
                  entry signatures, and optionally replays it against a live runtime."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify one audit trail.
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Audit JSON file path or http(s) URL.
    #[arg(long, value_name = "FILE_OR_URL")]
    audit: String,

    /// Directory of NPL sources; enables replay.
    #[arg(long, value_name = "PATH")]
    sources: Option<PathBuf>,

    /// Scheme used to fetch did:web documents.
    #[arg(long, value_name = "SCHEME", value_parser = ["http", "https"])]
    did_scheme: Option<String>,

    /// Fetch every DID document from this host[:port] instead.
    #[arg(long, value_name = "HOST")]
    did_host_override: Option<String>,

    /// Stop after the first stage that reports an error.
    #[arg(long)]
    fail_fast: bool,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,

    /// Skip replay even when sources are given.
    #[arg(long)]
    no_replay: bool,

    /// TOML settings file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Base URL of the runtime used for replay.
    #[arg(long, value_name = "URL")]
    replay_base_url: Option<String>,

    /// Debug logging on stderr.
    #[arg(long)]
    verbose: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(usage_exit_code(&e));
        }
    };
    let Command::Verify(args) = cli.command;

    let verbose =
        args.verbose || std::env::var(ENV_VERBOSE).map(|v| is_truthy(&v)).unwrap_or(false);
    init_logging(verbose);

    let outcome = run(&args);
    if let Ok(result) = &outcome {
        if args.json {
            match serde_json::to_string_pretty(result) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("error: failed to render result: {e}");
                    std::process::exit(EXIT_ERROR);
                }
            }
        } else {
            print!("{}", render_human(result));
        }
    }
    if let Err(e) = &outcome {
        eprintln!("{}", render_error(e));
    }
    std::process::exit(exit_code(&outcome));
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

// ── Pipeline wiring ───────────────────────────────────────────────────────────

/// Defaults, then the TOML file, then the environment, then flags.
fn resolve_settings(args: &VerifyArgs) -> TrailResult<VerifierSettings> {
    let mut settings = match &args.config {
        Some(path) => VerifierSettings::from_file(path)?,
        None => VerifierSettings::default(),
    };
    settings.apply_env();

    if args.fail_fast {
        settings.fail_fast = true;
    }
    if let Some(scheme) = &args.did_scheme {
        settings.did.scheme = scheme.clone();
    }
    if let Some(host) = &args.did_host_override {
        settings.did.host_override = Some(host.clone());
    }
    if let Some(url) = &args.replay_base_url {
        settings.replay.base_url = url.clone();
    }
    if args.no_replay {
        settings.replay.enabled = false;
    }
    settings.validate()?;
    Ok(settings)
}

fn run(args: &VerifyArgs) -> TrailResult<VerificationResult> {
    let settings = resolve_settings(args)?;
    debug!(?settings, "resolved settings");

    // No signal hook: Ctrl-C ends the process; HTTP timeouts bound each call.
    let cancel = CancellationToken::new();
    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new(&settings.http, cancel.clone())?);
    let resolver = Arc::new(WebDidResolver::new(Arc::clone(&transport), &settings.did));

    let mut orchestrator = Orchestrator::new(
        Box::new(SchemaStructureValidator::new()?),
        Box::new(JwsSignatureVerifier::new(resolver)),
    )
    .with_cancellation(cancel);
    if settings.replay.enabled {
        orchestrator = orchestrator.with_replayer(Box::new(ReplayEngine::from_settings(
            Arc::clone(&transport),
            &settings.replay,
        )));
    }

    let options = VerifyOptions {
        fail_fast: settings.fail_fast,
        sources: args.sources.clone().filter(|_| settings.replay.enabled),
    };
    info!(audit = %args.audit, replay = options.sources.is_some(), "verifying audit trail");
    orchestrator.verify_source(&args.audit, transport.as_ref(), &options)
}

// ── Reporting ─────────────────────────────────────────────────────────────────

fn exit_code(outcome: &TrailResult<VerificationResult>) -> i32 {
    match outcome {
        Ok(result) if result.success => EXIT_OK,
        Ok(_) => EXIT_VERIFICATION_FAILED,
        Err(_) => EXIT_ERROR,
    }
}

/// `--help` and `--version` succeed; every other parse failure is a general
/// error.
fn usage_exit_code(error: &clap::Error) -> i32 {
    if error.use_stderr() {
        EXIT_ERROR
    } else {
        EXIT_OK
    }
}

fn render_human(result: &VerificationResult) -> String {
    if result.success {
        return "✓ verified\n".to_string();
    }
    let count = result.errors.len();
    let mut out = format!(
        "✗ verification failed ({count} error{})\n",
        if count == 1 { "" } else { "s" }
    );
    for error in &result.errors {
        out.push_str(&format!("  {error}\n"));
    }
    out
}

/// The error followed by its cause chain, one cause per line.
fn render_error(error: &TrailError) -> String {
    let mut out = format!("error: {error}");
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        out.push_str(&format!("\n  caused by: {cause}"));
        source = std::error::Error::source(cause);
    }
    out
}

#[cfg(test)]
mod tests {
    use trail_contracts::report::{StepError, VerificationStep};

    use super::*;

    fn parse(args: &[&str]) -> VerifyArgs {
        let argv = std::iter::once("trail").chain(args.iter().copied());
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Verify(args) => args,
        }
    }

    fn failed() -> VerificationResult {
        VerificationResult::from_errors(vec![
            StepError::new(VerificationStep::HashChain, "entry 1: previous hash mismatch"),
            StepError::new(VerificationStep::Signature, "entry 2 (x): bad signature"),
        ])
    }

    // ── Argument parsing ──────────────────────────────────────────────────────

    #[test]
    fn verify_accepts_every_flag() {
        let args = parse(&[
            "verify",
            "--audit",
            "audit.json",
            "--sources",
            "npl",
            "--did-scheme",
            "http",
            "--did-host-override",
            "localhost:8080",
            "--fail-fast",
            "--json",
            "--no-replay",
            "--replay-base-url",
            "http://localhost:9000",
            "--verbose",
        ]);
        assert_eq!(args.audit, "audit.json");
        assert_eq!(args.sources, Some(PathBuf::from("npl")));
        assert_eq!(args.did_scheme.as_deref(), Some("http"));
        assert_eq!(args.did_host_override.as_deref(), Some("localhost:8080"));
        assert!(args.fail_fast && args.json && args.no_replay && args.verbose);
    }

    #[test]
    fn audit_is_required_and_scheme_is_checked() {
        assert!(Cli::try_parse_from(["trail", "verify"]).is_err());
        assert!(
            Cli::try_parse_from(["trail", "verify", "--audit", "a.json", "--did-scheme", "ftp"])
                .is_err()
        );
    }

    #[test]
    fn usage_errors_share_the_general_error_code() {
        let missing = Cli::try_parse_from(["trail", "verify"]).unwrap_err();
        assert_eq!(usage_exit_code(&missing), EXIT_ERROR);
        let unknown =
            Cli::try_parse_from(["trail", "verify", "--audit", "a", "--bogus"]).unwrap_err();
        assert_eq!(usage_exit_code(&unknown), EXIT_ERROR);

        let help = Cli::try_parse_from(["trail", "--help"]).unwrap_err();
        assert_eq!(usage_exit_code(&help), EXIT_OK);
        let version = Cli::try_parse_from(["trail", "--version"]).unwrap_err();
        assert_eq!(usage_exit_code(&version), EXIT_OK);
    }

    // ── Settings precedence ───────────────────────────────────────────────────

    #[test]
    fn flags_override_the_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trail.toml");
        std::fs::write(
            &path,
            "fail_fast = false\n[did]\nscheme = \"https\"\nhost_override = \"a:1\"\n\
             [replay]\nbase_url = \"http://file:1\"\n",
        )
        .unwrap();
        let path = path.to_string_lossy().into_owned();

        let args = parse(&[
            "verify",
            "--audit",
            "x.json",
            "--config",
            &path,
            "--fail-fast",
            "--did-scheme",
            "http",
            "--replay-base-url",
            "http://flag:2",
            "--no-replay",
        ]);
        let settings = resolve_settings(&args).unwrap();
        assert!(settings.fail_fast);
        assert_eq!(settings.did.scheme, "http");
        assert_eq!(settings.did.host_override.as_deref(), Some("a:1"));
        assert_eq!(settings.replay.base_url, "http://flag:2");
        assert!(!settings.replay.enabled);
    }

    #[test]
    fn unreadable_settings_file_is_config_error() {
        let args = parse(&["verify", "--audit", "x.json", "--config", "/nonexistent/trail.toml"]);
        assert!(matches!(
            resolve_settings(&args),
            Err(TrailError::Config { .. })
        ));
    }

    // ── Reporting ─────────────────────────────────────────────────────────────

    #[test]
    fn exit_codes_separate_failures_from_errors() {
        assert_eq!(exit_code(&Ok(VerificationResult::from_errors(Vec::new()))), 0);
        assert_eq!(exit_code(&Ok(failed())), 65);
        assert_eq!(exit_code(&Err(TrailError::Cancelled)), 1);
    }

    #[test]
    fn human_report_lists_each_step_error() {
        assert_eq!(
            render_human(&VerificationResult::from_errors(Vec::new())),
            "✓ verified\n"
        );
        assert_eq!(
            render_human(&failed()),
            "✗ verification failed (2 errors)\n  \
             [HashChain] entry 1: previous hash mismatch\n  \
             [Signature] entry 2 (x): bad signature\n"
        );
    }

    #[test]
    fn json_report_uses_step_names() {
        let json = serde_json::to_value(failed()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errors"][0]["step"], "HashChain");
        assert_eq!(json["errors"][1]["message"], "entry 2 (x): bad signature");
    }

    #[test]
    fn error_rendering_starts_with_the_error() {
        let rendered = render_error(&TrailError::Config {
            reason: "bad".to_string(),
        });
        assert!(rendered.starts_with("error: "));
        assert!(rendered.contains("bad"));
    }
}
