use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Write};
use std::net::SocketAddr;

/// Registry key for an agent.
///
/// Once a session has identified itself this is the lowercase-hex rendering
/// of the stable instance uid bytes; until then it is the session's remote
/// address. Comparing the hex renderings is equivalent to comparing the uid
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Key for an identified agent.
    pub fn from_instance_uid(uid: &[u8]) -> Self {
        let hex = uid.iter().fold(String::new(), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        });
        Self(hex)
    }

    /// Temporary key for a session that has not identified yet.
    pub fn provisional(remote_addr: &SocketAddr) -> Self {
        Self(remote_addr.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AgentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
