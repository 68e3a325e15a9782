//! Protocol identity parsed from an audit entry id.
//!
//! Entry ids have the shape
//! `urn:npl:{host}/npl/{packagePath}/{protocolName}/{uuid}[#index]`, where
//! `packagePath` may itself span several `/`-separated segments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TrailError, TrailResult};

const URN_PREFIX: &str = "urn:npl:";

/// The (host, package, protocol, instance) tuple addressing one protocol
/// instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolIdentity {
    pub host: String,
    pub package_path: String,
    pub protocol_name: String,
    pub protocol_id: Uuid,
    /// The `#index` fragment, when the id carried one.
    pub index: Option<u64>,
}

impl ProtocolIdentity {
    /// Parse an entry id.  Returns `MalformedIdentity` naming the offending
    /// id when any component is missing or invalid.
    pub fn parse(id: &str) -> TrailResult<Self> {
        let malformed = |reason: &str| TrailError::MalformedIdentity {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let rest = id
            .strip_prefix(URN_PREFIX)
            .ok_or_else(|| malformed("expected 'urn:npl:' prefix"))?;

        let (path, fragment) = match rest.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (rest, None),
        };

        let index = fragment
            .map(|f| {
                f.parse::<u64>()
                    .map_err(|_| malformed("fragment is not an entry index"))
            })
            .transpose()?;

        let segments: Vec<&str> = path.split('/').collect();
        // host, "npl", at least one package segment, protocol name, uuid
        if segments.len() < 5 {
            return Err(malformed(
                "expected {host}/npl/{package}/{protocol}/{uuid}",
            ));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(malformed("empty path segment"));
        }
        if segments[1] != "npl" {
            return Err(malformed("expected 'npl' after host"));
        }

        let n = segments.len();
        let protocol_id = Uuid::parse_str(segments[n - 1])
            .map_err(|e| malformed(&format!("invalid protocol uuid: {e}")))?;

        Ok(Self {
            host: segments[0].to_string(),
            package_path: segments[2..n - 2].join("/"),
            protocol_name: segments[n - 2].to_string(),
            protocol_id,
            index,
        })
    }

    /// `/npl/{packagePath}/{protocolName}`, the runtime's route prefix for
    /// this protocol type.
    pub fn route(&self) -> String {
        format!("/npl/{}/{}", self.package_path, self.protocol_name)
    }
}

impl FromStr for ProtocolIdentity {
    type Err = TrailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ProtocolIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{URN_PREFIX}{}{}/{}",
            self.host,
            self.route(),
            self.protocol_id
        )?;
        if let Some(index) = self.index {
            write!(f, "#{index}")?;
        }
        Ok(())
    }
}
