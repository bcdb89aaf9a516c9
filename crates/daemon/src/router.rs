//! Launcher for the companion RTSP routing service
//!
//! The routing service serves RTSP independently of the ingest library. The
//! launcher self-heals a missing companion once per request: a single probe,
//! one detached launch, a fixed settle delay, and one re-probe. There is no
//! retry loop, keeping startup latency bounded.

use crate::probe::is_reachable;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use stream_bridge_config::RouterConfig;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// Manages the lifecycle relationship with the companion routing service.
///
/// If the launcher started the service itself, it retains the child handle so
/// `shutdown` can tear the process down with the rest of the system.
pub struct RouterLauncher {
    config: RouterConfig,
    started: Mutex<Option<Child>>,
}

impl RouterLauncher {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            started: Mutex::new(None),
        }
    }

    /// Resolve the platform-dependent executable path for the routing service.
    pub fn executable_path(&self) -> PathBuf {
        let name = if cfg!(windows) {
            format!("{}.exe", self.config.executable_name)
        } else {
            self.config.executable_name.clone()
        };
        PathBuf::from(&self.config.executable_dir).join(name)
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.config.probe_timeout_ms)
    }

    /// Ensure the routing service is reachable, launching it if necessary.
    ///
    /// Probes once and returns `true` immediately if the service is already
    /// listening (never launches a duplicate). Otherwise spawns the executable
    /// detached from any request's lifetime, waits the fixed settle delay, and
    /// re-probes once. Returns `false` without error when the executable is
    /// missing or the service still cannot be reached.
    pub async fn ensure_running(&self) -> bool {
        let host = self.config.host.as_str();
        let port = self.config.rtsp_port;

        if is_reachable(host, port, self.probe_timeout()).await {
            return true;
        }

        let exe = self.executable_path();
        if !exe.exists() {
            tracing::warn!(path = %exe.display(), "routing service executable not found");
            return false;
        }

        tracing::info!(path = %exe.display(), port, "launching routing service");
        let child = match Command::new(&exe)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(error = %e, "failed to launch routing service");
                return false;
            }
        };

        {
            let mut started = self.started.lock().await;
            *started = Some(child);
        }

        // Single settle-and-recheck, by design; no backoff loop.
        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        is_reachable(host, port, self.probe_timeout()).await
    }

    /// Tear down the routing service if this launcher started it.
    ///
    /// Best-effort: failures are logged and never propagate, so teardown of
    /// the rest of the system can continue.
    pub async fn shutdown(&self) {
        let mut started = self.started.lock().await;
        if let Some(mut child) = started.take() {
            tracing::info!("stopping routing service");
            if let Err(e) = child.start_kill() {
                tracing::warn!(error = %e, "failed to kill routing service");
            }
            let _ = child.wait().await;
        }
    }
}
