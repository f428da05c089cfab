use crate::opamp::proto::ServerToAgent;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SendError {
    #[error("session closed")]
    Closed,
}

/// Capability to push a server message down a live agent session.
///
/// The transport owns the session socket; the rest of the backend only ever
/// holds this handle and must never close the underlying session. Tests
/// supply fakes.
#[async_trait]
pub trait AgentConnection: Send + Sync {
    async fn send(&self, msg: ServerToAgent) -> Result<(), SendError>;

    /// False once the session's writer is gone; a record whose connection
    /// reports false is on its way out of the registry.
    fn is_alive(&self) -> bool;
}
