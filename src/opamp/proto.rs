//! Subset of the agent-session wire messages this backend reads and writes.
//!
//! Field tags follow the upstream protocol definition so frames interoperate
//! with stock agents; fields the backend never touches are left undeclared
//! and skipped by prost on decode.

use std::collections::HashMap;

/// Server capability bits advertised on [`ServerToAgent::capabilities`].
pub const SERVER_CAPABILITY_ACCEPTS_STATUS: u64 = 0x0000_0001;
pub const SERVER_CAPABILITY_OFFERS_REMOTE_CONFIG: u64 = 0x0000_0002;
pub const SERVER_CAPABILITY_ACCEPTS_EFFECTIVE_CONFIG: u64 = 0x0000_0004;

/// Flag asking the agent to re-send its full status, effective
/// configuration included.
pub const SERVER_FLAG_REPORT_FULL_STATE: u64 = 0x0000_0001;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentToServer {
    #[prost(bytes = "vec", tag = "1")]
    pub instance_uid: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub sequence_num: u64,
    #[prost(uint64, tag = "4")]
    pub capabilities: u64,
    #[prost(message, optional, tag = "6")]
    pub effective_config: Option<EffectiveConfig>,
    #[prost(message, optional, tag = "9")]
    pub agent_disconnect: Option<AgentDisconnect>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerToAgent {
    #[prost(bytes = "vec", tag = "1")]
    pub instance_uid: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub remote_config: Option<AgentRemoteConfig>,
    #[prost(uint64, tag = "6")]
    pub flags: u64,
    #[prost(uint64, tag = "7")]
    pub capabilities: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EffectiveConfig {
    #[prost(message, optional, tag = "1")]
    pub config_map: Option<AgentConfigMap>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentConfigMap {
    #[prost(map = "string, message", tag = "1")]
    pub config_map: HashMap<String, AgentConfigFile>,
}

impl AgentConfigMap {
    /// Single-entry map, the shape every push uses.
    pub fn single(name: &str, body: &str, content_type: &str) -> Self {
        let mut config_map = HashMap::new();
        config_map.insert(
            name.to_string(),
            AgentConfigFile {
                body: body.as_bytes().to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Self { config_map }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentConfigFile {
    #[prost(bytes = "vec", tag = "1")]
    pub body: Vec<u8>,
    #[prost(string, tag = "2")]
    pub content_type: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentRemoteConfig {
    #[prost(message, optional, tag = "1")]
    pub config: Option<AgentConfigMap>,
    #[prost(bytes = "vec", tag = "2")]
    pub config_hash: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentDisconnect {}
