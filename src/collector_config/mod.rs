//! Parsing and rewriting of collector configuration documents.
//!
//! The one mutation this backend performs is setting
//! `service.telemetry.logs.level`; everything else in the document is
//! carried through untouched modulo re-emission. Pushed documents are
//! content-addressed with SHA-256 over the exact bytes sent.

pub mod log_level;

pub use log_level::{InvalidLogLevel, LogLevel};

use ring::digest;
use serde_yaml::{Mapping, Value};
use std::fmt::{Display, Formatter, Write};
use thiserror::Error;

/// Configuration handed to agents that have never reported nor been sent
/// anything; the only source of truth for a freshly discovered agent.
pub const DEFAULT_COLLECTOR_CONFIG: &str = r#"receivers:
  otlp:
    protocols:
      grpc:
        endpoint: 0.0.0.0:4317
      http:
        endpoint: 0.0.0.0:4318
processors:
  batch: {}
exporters:
  otlphttp:
    endpoint: http://localhost:4318
extensions:
  opamp:
    server:
      ws:
        endpoint: ws://localhost:4320/v1/opamp
service:
  extensions: [opamp]
  pipelines:
    traces:
      receivers: [otlp]
      processors: [batch]
      exporters: [otlphttp]
  telemetry:
    logs:
      level: info
"#;

const LOG_LEVEL_PATH: [&str; 3] = ["service", "telemetry", "logs"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("parsing configuration document: `{0}`")]
    Parse(#[from] serde_yaml::Error),

    #[error("configuration document is not a mapping")]
    NotAMapping,
}

/// Content address of a configuration document. Renders as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigHash([u8; 32]);

impl ConfigHash {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl Display for ConfigHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let hex = self.0.iter().fold(String::new(), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        });
        f.write_str(&hex)
    }
}

/// SHA-256 over the exact bytes that go on the wire. Always computed from
/// the post-transform document, never the input.
pub fn hash(doc: &[u8]) -> ConfigHash {
    let digest = digest::digest(&digest::SHA256, doc);
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_ref());
    ConfigHash(out)
}

/// Re-emits `doc` with `service.telemetry.logs.level` set to `level`.
///
/// Intermediate mappings are created when absent, and a non-mapping value
/// sitting on the path is replaced by one. An empty document counts as an
/// empty mapping; a scalar or sequence root does not parse as a
/// configuration. Emission is deterministic, so applying the same level
/// twice yields identical bytes.
pub fn update_log_level(doc: &str, level: LogLevel) -> Result<String, ConfigError> {
    let mut root = match serde_yaml::from_str::<Value>(doc)? {
        Value::Null => Value::Mapping(Mapping::new()),
        value @ Value::Mapping(_) => value,
        _ => return Err(ConfigError::NotAMapping),
    };

    let mut node = root.as_mapping_mut().ok_or(ConfigError::NotAMapping)?;
    for key in LOG_LEVEL_PATH {
        let slot = node
            .entry(Value::from(key))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if !slot.is_mapping() {
            *slot = Value::Mapping(Mapping::new());
        }
        node = slot.as_mapping_mut().ok_or(ConfigError::NotAMapping)?;
    }
    node.insert(Value::from("level"), Value::from(level.as_str()));

    Ok(serde_yaml::to_string(&root)?)
}

/// Reads `service.telemetry.logs.level` if the document has one.
pub fn log_level_of(doc: &str) -> Option<String> {
    let root: Value = serde_yaml::from_str(doc).ok()?;
    let logs = LOG_LEVEL_PATH
        .iter()
        .try_fold(&root, |node, key| node.get(*key))?;
    logs.get("level")?.as_str().map(str::to_string)
}
