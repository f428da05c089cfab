//! Control-plane backend for a fleet of telemetry-collector agents.
//!
//! Agents keep a persistent bidirectional session with the backend
//! ([`opamp`]), announce a stable instance id, and report the configuration
//! they are running. The backend tracks them in an in-memory [`registry`],
//! rewrites configuration documents ([`collector_config`]), and exposes an
//! administrative HTTP surface ([`api`]) that drives the [`control_plane`].

pub mod api;
pub mod collector_config;
pub mod control_plane;
pub mod logging;
pub mod opamp;
pub mod registry;
pub mod run;
pub mod settings;
