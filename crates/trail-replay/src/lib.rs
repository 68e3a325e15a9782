//! # trail-replay
//!
//! Re-executes an audit log against a live protocol runtime and checks that
//! every recorded state hash is reproduced.
//!
//! - [`config`]: party credentials from `npl.yml` / `npl.yaml`
//! - [`tokens`]: password-grant exchange and token trial order
//! - [`hints`]: which party likely owns an action, from `.npl` sources
//! - [`normalize`]: parameter typing and live-id normalization
//! - [`engine`]: the `Replayer` implementation

pub mod config;
pub mod engine;
pub mod hints;
pub mod normalize;
pub mod tokens;

pub use engine::ReplayEngine;
