//! Orchestration layer between the admin API, the registry, and the live
//! agent sessions.

pub mod error;

pub use error::ControlPlaneError;

use crate::collector_config::{self, LogLevel, DEFAULT_COLLECTOR_CONFIG};
use crate::opamp::proto::{
    AgentConfigMap, AgentRemoteConfig, ServerToAgent, SERVER_CAPABILITY_ACCEPTS_EFFECTIVE_CONFIG,
    SERVER_CAPABILITY_OFFERS_REMOTE_CONFIG, SERVER_FLAG_REPORT_FULL_STATE,
};
use crate::registry::{AgentId, AgentRecord, AgentRegistry};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Map key and media type used for every pushed configuration document.
const CONFIG_MAP_ENTRY: &str = "collector";
const CONFIG_CONTENT_TYPE: &str = "text/yaml";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSummary {
    pub agent_id: AgentId,
    pub ip_address: String,
    /// `"active"` for as long as the record exists.
    pub status: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Where a resolved configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Effective,
    LastSent,
    Default,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentConfigReport {
    pub agent_id: AgentId,
    pub source: ConfigSource,
    pub current_config: String,
    pub effective_config: String,
    pub last_sent_config: String,
    pub resolved_log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentDiagnostics {
    pub agent_id: AgentId,
    pub ip_address: String,
    pub location: String,
    pub connection_alive: bool,
    pub effective_config_bytes: usize,
    pub last_sent_config_bytes: usize,
}

/// Owns the registry on behalf of the admin API and drives pushes down the
/// live sessions. Built once at bootstrap and shared as app data.
pub struct ControlPlane {
    registry: Arc<AgentRegistry>,
    global_log_level: RwLock<LogLevel>,
}

impl ControlPlane {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            global_log_level: RwLock::new(LogLevel::Info),
        }
    }

    /// Level of the last fleet-wide broadcast; starts at `info`.
    pub fn global_log_level(&self) -> LogLevel {
        *self
            .global_log_level
            .read()
            .expect("global log level lock poisoned")
    }

    pub fn list_agents(&self) -> Vec<AgentSummary> {
        self.registry
            .list_all()
            .into_iter()
            .map(|record| AgentSummary {
                agent_id: record.id,
                ip_address: record.ip,
                status: "active".to_string(),
            })
            .collect()
    }

    pub fn update_labels(
        &self,
        id: &AgentId,
        ip: Option<&str>,
        location: Option<&str>,
    ) -> Result<(), ControlPlaneError> {
        self.registry
            .set_labels(id, ip, location)
            .map_err(|_| ControlPlaneError::NotFound(id.to_string()))
    }

    /// Best configuration currently known for the agent: what it reports as
    /// active, else what was last sent, else the default document.
    pub fn resolve_current_for(
        &self,
        id: &AgentId,
    ) -> Result<(String, ConfigSource), ControlPlaneError> {
        let record = self
            .registry
            .get(id)
            .ok_or_else(|| ControlPlaneError::NotFound(id.to_string()))?;
        Ok(Self::resolve_record(&record))
    }

    fn resolve_record(record: &AgentRecord) -> (String, ConfigSource) {
        if !record.effective_config.is_empty() {
            (record.effective_config.clone(), ConfigSource::Effective)
        } else if !record.last_sent_config.is_empty() {
            (record.last_sent_config.clone(), ConfigSource::LastSent)
        } else {
            (DEFAULT_COLLECTOR_CONFIG.to_string(), ConfigSource::Default)
        }
    }

    /// Pushes a re-levelled configuration document to one agent.
    ///
    /// Registry locks are held only around the lookup and the last-sent
    /// write, never across the send. The last-sent document is recorded
    /// before the send so a later report can be compared against what we
    /// believe reached the agent; a failed send does not roll it back.
    pub async fn apply_log_level(
        &self,
        id: &AgentId,
        level: LogLevel,
    ) -> Result<(), ControlPlaneError> {
        let record = self
            .registry
            .get(id)
            .ok_or_else(|| ControlPlaneError::NotFound(id.to_string()))?;
        if !record.connection.is_alive() {
            return Err(ControlPlaneError::BadConnection(id.to_string()));
        }

        let (current, source) = Self::resolve_record(&record);
        let updated = collector_config::update_log_level(&current, level)
            .map_err(|err| ControlPlaneError::ParseFailed(id.to_string(), err.to_string()))?;
        let hash = collector_config::hash(updated.as_bytes());

        self.registry
            .set_last_sent_config(id, &updated)
            .map_err(|_| ControlPlaneError::NotFound(id.to_string()))?;

        let msg = ServerToAgent {
            remote_config: Some(AgentRemoteConfig {
                config: Some(AgentConfigMap::single(
                    CONFIG_MAP_ENTRY,
                    &updated,
                    CONFIG_CONTENT_TYPE,
                )),
                config_hash: hash.to_vec(),
            }),
            capabilities: SERVER_CAPABILITY_OFFERS_REMOTE_CONFIG,
            ..Default::default()
        };
        record
            .connection
            .send(msg)
            .await
            .map_err(|err| ControlPlaneError::SendFailed(id.to_string(), err.to_string()))?;

        info!(
            agent_id = %id,
            log_level = %level,
            config_hash = %hash,
            base = ?source,
            "remote configuration pushed"
        );
        Ok(())
    }

    /// Applies the level to every known agent. Partial failure is expected
    /// and counted, never fatal.
    pub async fn broadcast_log_level(&self, level: LogLevel) -> BroadcastOutcome {
        *self
            .global_log_level
            .write()
            .expect("global log level lock poisoned") = level;

        let ids = self.registry.list_ids();
        let mut outcome = BroadcastOutcome {
            total: ids.len(),
            ..Default::default()
        };
        for id in ids {
            match self.apply_log_level(&id, level).await {
                Ok(()) => outcome.updated += 1,
                Err(err) => {
                    warn!(agent_id = %id, error = %err, "log level broadcast skipped agent");
                    outcome.failed += 1;
                }
            }
        }
        info!(
            log_level = %level,
            total = outcome.total,
            updated = outcome.updated,
            failed = outcome.failed,
            "log level broadcast finished"
        );
        outcome
    }

    /// Prompts a stale agent to report its effective configuration.
    pub async fn request_agent_config(&self, id: &AgentId) -> Result<(), ControlPlaneError> {
        let record = self
            .registry
            .get(id)
            .ok_or_else(|| ControlPlaneError::NotFound(id.to_string()))?;
        if !record.connection.is_alive() {
            return Err(ControlPlaneError::BadConnection(id.to_string()));
        }

        let msg = ServerToAgent {
            capabilities: SERVER_CAPABILITY_ACCEPTS_EFFECTIVE_CONFIG,
            flags: SERVER_FLAG_REPORT_FULL_STATE,
            ..Default::default()
        };
        record
            .connection
            .send(msg)
            .await
            .map_err(|err| ControlPlaneError::SendFailed(id.to_string(), err.to_string()))?;

        debug!(agent_id = %id, "effective configuration requested");
        Ok(())
    }

    pub fn agent_config_report(&self, id: &AgentId) -> Result<AgentConfigReport, ControlPlaneError> {
        let record = self
            .registry
            .get(id)
            .ok_or_else(|| ControlPlaneError::NotFound(id.to_string()))?;
        let (current, source) = Self::resolve_record(&record);
        let resolved_log_level = collector_config::log_level_of(&current);

        Ok(AgentConfigReport {
            agent_id: record.id,
            source,
            current_config: current,
            effective_config: record.effective_config,
            last_sent_config: record.last_sent_config,
            resolved_log_level,
        })
    }

    pub fn diagnostics(&self) -> Vec<AgentDiagnostics> {
        self.registry
            .list_all()
            .into_iter()
            .map(|record| AgentDiagnostics {
                connection_alive: record.connection.is_alive(),
                effective_config_bytes: record.effective_config.len(),
                last_sent_config_bytes: record.last_sent_config.len(),
                agent_id: record.id,
                ip_address: record.ip,
                location: record.location,
            })
            .collect()
    }
}
