use crate::opamp::panic_message;
use crate::opamp::transport::SessionTransport;
use crate::registry::AgentRegistry;
use crate::settings::OpampSettings;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Delay before a crashed transport is rebuilt.
const RESTART_DELAY: Duration = Duration::from_secs(2);

/// Keeps the session transport alive.
///
/// Every round hosts a freshly constructed transport behind a fault
/// barrier; a panic or error is logged and the transport rebuilt after a
/// short delay. The registry lives outside the supervised unit, so agent
/// records survive transport restarts. The shared `stopping` flag
/// suppresses restarts during shutdown.
pub struct TransportSupervisor {
    settings: OpampSettings,
    registry: Arc<AgentRegistry>,
    stopping: Arc<AtomicBool>,
}

impl TransportSupervisor {
    pub fn new(
        settings: OpampSettings,
        registry: Arc<AgentRegistry>,
        stopping: Arc<AtomicBool>,
    ) -> Self {
        Self {
            settings,
            registry,
            stopping,
        }
    }

    pub async fn run(self) {
        loop {
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }

            let transport = SessionTransport::new(self.settings.clone(), self.registry.clone());
            match AssertUnwindSafe(transport.run()).catch_unwind().await {
                Ok(Ok(())) => info!("session transport stopped"),
                Ok(Err(err)) => error!(error = %err, "session transport failed"),
                Err(panic) => error!(
                    panic = panic_message(panic.as_ref()),
                    "session transport panicked"
                ),
            }

            if self.stopping.load(Ordering::SeqCst) {
                info!("shutdown in progress, not restarting session transport");
                break;
            }
            tokio::time::sleep(RESTART_DELAY).await;
        }
    }
}
