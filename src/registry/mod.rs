pub mod agent_id;
pub mod connection;

pub use agent_id::AgentId;
pub use connection::{AgentConnection, SendError};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

/// One live agent and everything the backend knows about it.
#[derive(Clone)]
pub struct AgentRecord {
    pub id: AgentId,
    pub ip: String,
    pub location: String,
    /// Most recent configuration document pushed to the agent; empty until
    /// the first push.
    pub last_sent_config: String,
    /// Most recent configuration the agent reported as active; empty until
    /// the agent reports one.
    pub effective_config: String,
    pub connection: Arc<dyn AgentConnection>,
}

impl AgentRecord {
    pub fn new(id: AgentId, ip: impl Into<String>, connection: Arc<dyn AgentConnection>) -> Self {
        Self {
            id,
            ip: ip.into(),
            location: String::new(),
            last_sent_config: String::new(),
            effective_config: String::new(),
            connection,
        }
    }
}

#[derive(Error, Debug)]
#[error("agent {0} not found")]
pub struct UnknownAgent(pub AgentId);

/// Live registry of agents, the only shared-mutable state in the backend.
///
/// Reader-writer discipline: snapshots go through the read lock, every field
/// mutation through the write lock. No operation does I/O under either.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<AgentId, AgentRecord>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces. A record already present under the id is
    /// displaced; its connection stays open, closing it is the session
    /// owner's job.
    pub fn register(&self, record: AgentRecord) {
        let id = record.id.clone();
        let mut agents = self.agents.write().expect("agent registry lock poisoned");
        if agents.insert(id.clone(), record).is_some() {
            debug!(agent_id = %id, "replacing existing agent registration");
        }
    }

    /// Removes the record; returns whether something was present.
    pub fn deregister(&self, id: &AgentId) -> bool {
        let mut agents = self.agents.write().expect("agent registry lock poisoned");
        let removed = agents.remove(id).is_some();
        if removed {
            debug!(agent_id = %id, "agent deregistered");
        } else {
            warn!(agent_id = %id, "attempted to deregister unknown agent");
        }
        removed
    }

    /// Snapshot of one record. Mutations go through the registry setters,
    /// never through the returned copy.
    pub fn get(&self, id: &AgentId) -> Option<AgentRecord> {
        self.agents
            .read()
            .expect("agent registry lock poisoned")
            .get(id)
            .cloned()
    }

    /// Snapshot of all records; order is unspecified.
    pub fn list_all(&self) -> Vec<AgentRecord> {
        self.agents
            .read()
            .expect("agent registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn list_ids(&self) -> Vec<AgentId> {
        self.agents
            .read()
            .expect("agent registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn set_last_sent_config(&self, id: &AgentId, doc: &str) -> Result<(), UnknownAgent> {
        self.with_record(id, |record| record.last_sent_config = doc.to_string())
    }

    pub fn set_effective_config(&self, id: &AgentId, doc: &str) -> Result<(), UnknownAgent> {
        self.with_record(id, |record| record.effective_config = doc.to_string())
    }

    pub fn set_labels(
        &self,
        id: &AgentId,
        ip: Option<&str>,
        location: Option<&str>,
    ) -> Result<(), UnknownAgent> {
        self.with_record(id, |record| {
            if let Some(ip) = ip {
                record.ip = ip.to_string();
            }
            if let Some(location) = location {
                record.location = location.to_string();
            }
        })
    }

    fn with_record(
        &self,
        id: &AgentId,
        update: impl FnOnce(&mut AgentRecord),
    ) -> Result<(), UnknownAgent> {
        let mut agents = self.agents.write().expect("agent registry lock poisoned");
        match agents.get_mut(id) {
            Some(record) => {
                update(record);
                Ok(())
            }
            None => Err(UnknownAgent(id.clone())),
        }
    }
}
