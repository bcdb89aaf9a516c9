//! Stream Bridge daemon
//!
//! Control plane for short-lived media transcoder processes. The daemon
//! supervises RTMP-to-RTSP conversions and synthetic test-pattern streams,
//! keeps the companion RTSP routing service alive, and exposes an HTTP/JSON
//! control API for creating, inspecting, and stopping tasks.

pub mod api;
pub mod daemon;
pub mod events;
pub mod probe;
pub mod registry;
pub mod router;
pub mod worker;

pub use stream_bridge_config as config;
pub use stream_bridge_config::Config;

pub use daemon::{Daemon, DaemonError};
pub use events::{EventBus, TaskEvent};
pub use registry::{Registry, RegistryError, TaskKind, TaskRecord, TaskStatus};
pub use router::RouterLauncher;
pub use worker::{WorkerEvent, WorkerHandle};
