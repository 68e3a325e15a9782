//! # trail-fixtures
//!
//! Test support for the trail workspace.  Nothing here touches the network
//! or a random number generator:
//!
//! - [`TestSigner`]: Ed25519 keys from fixed seeds, JWS signing of entries
//! - [`AuditLogBuilder`]: linked, signed audit logs from state templates
//! - [`StaticDidResolver`], [`RecordingTransport`]: fakes for the DID and
//!   HTTP seams
//! - [`FakeRuntime`]: a scripted protocol runtime for replay tests

pub mod builder;
pub mod fakes;
pub mod runtime;
pub mod signer;

pub use builder::{default_identity, instantiate, AuditLogBuilder, ID_PLACEHOLDER};
pub use fakes::{RecordingTransport, StaticDidResolver};
pub use runtime::FakeRuntime;
pub use signer::{TestSigner, ISSUER_DID, ISSUER_SEED, OTHER_SEED};

/// State templates after each entry of [`sample_log`], with `{{id}}`
/// placeholders for the instance id.
pub fn sample_states() -> Vec<serde_json::Value> {
    use serde_json::json;

    let actions = json!({ "pay": "http://localhost:12000/npl/demo/Iou/{{id}}/pay" });
    vec![
        json!({
            "@id": ID_PLACEHOLDER,
            "@parties": { "issuer": {}, "payee": {} },
            "@actions": actions,
            "forAmount": 100,
            "paid": 0
        }),
        json!({
            "@id": ID_PLACEHOLDER,
            "@parties": { "issuer": {}, "payee": {} },
            "@actions": actions,
            "forAmount": 100,
            "paid": 40
        }),
        json!({
            "@id": ID_PLACEHOLDER,
            "@parties": { "issuer": {}, "payee": {} },
            "@actions": {},
            "forAmount": 100,
            "paid": 100
        }),
    ]
}

/// A three-entry log (constructor, `pay`, `forgive`) signed by
/// [`TestSigner::issuer`], whose states are [`sample_states`].
pub fn sample_log() -> trail_contracts::audit::AuditLog {
    use serde_json::json;

    let mut states = sample_states().into_iter();
    let mut next = || states.next().unwrap_or_default();
    AuditLogBuilder::new(TestSigner::issuer())
        .constructor(json!({ "forAmount": 100 }), next())
        .permission("pay", json!({ "amount": 40 }), next())
        .permission("forgive", json!({}), next())
        .build()
}
