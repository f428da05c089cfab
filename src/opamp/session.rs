use crate::opamp::proto::{AgentConfigMap, AgentToServer, ServerToAgent};
use crate::registry::{AgentConnection, AgentId, AgentRecord, AgentRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Lifecycle of one agent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Provisional,
    Bound,
    Closed,
}

/// State machine behind a single agent session.
///
/// The session is registered under a provisional key derived from the
/// remote address until the agent's first identified message rebinds it to
/// the stable instance uid. `current_id` changes in exactly one place, that
/// rebind.
pub struct Session {
    remote_addr: SocketAddr,
    current_id: AgentId,
    state: SessionState,
    registry: Arc<AgentRegistry>,
    connection: Arc<dyn AgentConnection>,
}

impl Session {
    pub fn new(
        remote_addr: SocketAddr,
        registry: Arc<AgentRegistry>,
        connection: Arc<dyn AgentConnection>,
    ) -> Self {
        Self {
            remote_addr,
            current_id: AgentId::provisional(&remote_addr),
            state: SessionState::Connecting,
            registry,
            connection,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_id(&self) -> &AgentId {
        &self.current_id
    }

    /// Accepts the session: the agent becomes visible under its provisional
    /// key until it identifies.
    pub fn accept(&mut self) {
        let record = AgentRecord::new(
            self.current_id.clone(),
            self.remote_addr.ip().to_string(),
            self.connection.clone(),
        );
        self.registry.register(record);
        self.state = SessionState::Provisional;
        debug!(agent_id = %self.current_id, "session accepted");
    }

    /// Handles one inbound message and returns the reply. Replies always
    /// echo the inbound instance uid, bare when there is nothing to say.
    pub fn on_message(&mut self, msg: &AgentToServer) -> ServerToAgent {
        if self.state == SessionState::Provisional && !msg.instance_uid.is_empty() {
            self.rebind(&msg.instance_uid);
        }

        if let Some(config_map) = msg
            .effective_config
            .as_ref()
            .and_then(|config| config.config_map.as_ref())
        {
            self.store_effective_config(config_map);
        }

        if msg.agent_disconnect.is_some() {
            // Advisory only; the registration goes away on transport close.
            info!(agent_id = %self.current_id, "agent announced disconnect");
        }

        ServerToAgent {
            instance_uid: msg.instance_uid.clone(),
            ..Default::default()
        }
    }

    /// Transport close: the authoritative end of the registration, whether
    /// or not the session ever identified.
    pub fn close(&mut self) {
        if matches!(self.state, SessionState::Provisional | SessionState::Bound) {
            self.registry.deregister(&self.current_id);
        }
        self.state = SessionState::Closed;
    }

    fn rebind(&mut self, instance_uid: &[u8]) {
        let stable = AgentId::from_instance_uid(instance_uid);
        if stable != self.current_id {
            info!(
                provisional = %self.current_id,
                agent_id = %stable,
                "agent identified, rebinding registration"
            );
            self.registry.deregister(&self.current_id);
            let record = AgentRecord::new(
                stable.clone(),
                self.remote_addr.ip().to_string(),
                self.connection.clone(),
            );
            self.registry.register(record);
            self.current_id = stable;
        }
        self.state = SessionState::Bound;
    }

    fn store_effective_config(&self, config_map: &AgentConfigMap) {
        let Some((entry, file)) = config_map.config_map.iter().next() else {
            return;
        };
        if config_map.config_map.len() > 1 {
            trace!(
                agent_id = %self.current_id,
                "effective config carries multiple entries, keeping the first"
            );
        }

        let body = String::from_utf8_lossy(&file.body);
        match self.registry.set_effective_config(&self.current_id, &body) {
            Ok(()) => debug!(
                agent_id = %self.current_id,
                entry = %entry,
                bytes = file.body.len(),
                "effective config updated"
            ),
            Err(err) => debug!(agent_id = %self.current_id, error = %err, "storing effective config"),
        }
    }
}
