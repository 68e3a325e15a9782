//! # trail-did
//!
//! `did:web` resolution for the signature stage.  Only the `web` method is
//! supported; documents are fetched over the shared `Transport` and cached
//! for the life of the resolver.

pub mod resolver;
pub mod url;

pub use resolver::WebDidResolver;
pub use url::did_web_url;
