//! Conversion registry for supervised transcoder tasks
//!
//! The registry owns the map of task records, composes a supervised worker
//! process per task, and records the state each worker derives. Callers only
//! ever receive cloned record snapshots; the underlying process handle never
//! crosses the registry boundary.

use crate::events::{EventBus, TaskEvent};
use crate::router::RouterLauncher;
use crate::worker::{spawn_worker, WorkerError, WorkerEvent, WorkerHandle};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use stream_bridge_config::Config;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// lavfi descriptor used as the synthetic source for test streams
const TEST_PATTERN_SOURCE: &str = "testsrc=size=640x480:rate=30";

/// Error type for registry start operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The conversion source locator was missing or empty
    #[error("sourceUrl is required")]
    MissingSource,

    /// The routing service could not be confirmed reachable after one
    /// launch-and-recheck; no task record was created.
    #[error("RTSP routing service is not reachable")]
    RouterUnavailable,

    /// The worker process could not be started
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Kind of supervised task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Bridges an RTMP endpoint to the RTSP routing service
    Conversion,
    /// Publishes a synthetic test pattern to the RTMP ingest point
    TestStream,
}

/// Status of a supervised task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Worker process is running
    Running,
    /// Worker exited with code 0
    Completed,
    /// Worker exited with a nonzero code
    Failed,
    /// Worker was terminated by explicit request
    Stopped,
}

impl TaskStatus {
    /// Check if the status is terminal (anything but running).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// One timestamped line of worker diagnostic output
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub message: String,
}

/// Snapshot of one supervised unit of work
///
/// Locator strings are stored verbatim, never parsed.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Unique task identifier, never reused while the registry is alive
    pub id: String,
    pub kind: TaskKind,
    /// Display name, test streams only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Where the worker reads from
    pub source_url: String,
    /// Where the worker publishes to
    pub destination_url: String,
    /// RTSP port embedded in the destination, conversions only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtsp_port: Option<u16>,
    pub stream_path: String,
    pub status: TaskStatus,
    /// Unix timestamp (milliseconds) when the task started
    pub started_at: i64,
    /// Unix timestamp (milliseconds) when the task reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Registry-internal task state; the worker handle never leaves this struct.
struct TaskEntry {
    record: TaskRecord,
    logs: VecDeque<LogEntry>,
    handle: Option<WorkerHandle>,
}

/// Get current timestamp in milliseconds since Unix epoch.
fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Build the transcoder argument list for an RTMP-to-RTSP conversion.
///
/// Copies both streams without re-encoding and publishes over RTSP/TCP.
pub fn conversion_args(source_url: &str, destination_url: &str) -> Vec<String> {
    [
        "-i",
        source_url,
        "-c:v",
        "copy",
        "-c:a",
        "copy",
        "-f",
        "rtsp",
        "-rtsp_transport",
        "tcp",
        destination_url,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Build the transcoder argument list for a synthetic test-pattern publisher.
pub fn test_stream_args(ingest_url: &str) -> Vec<String> {
    [
        "-re",
        "-f",
        "lavfi",
        "-i",
        TEST_PATTERN_SOURCE,
        "-c:v",
        "libx264",
        "-profile:v",
        "baseline",
        "-pix_fmt",
        "yuv420p",
        "-preset",
        "ultrafast",
        "-tune",
        "zerolatency",
        "-f",
        "flv",
        ingest_url,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// In-memory store of supervised tasks keyed by identifier.
///
/// All record mutation is serialized through the internal lock; stop requests
/// and exit notifications for the same task may race, and the first terminal
/// transition always wins.
pub struct Registry {
    config: Config,
    launcher: Arc<RouterLauncher>,
    bus: EventBus,
    tasks: Arc<RwLock<HashMap<String, TaskEntry>>>,
}

impl Registry {
    pub fn new(config: Config, launcher: Arc<RouterLauncher>, bus: EventBus) -> Self {
        Self {
            config,
            launcher,
            bus,
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the event bus this registry publishes to.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn allocate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Start an RTMP-to-RTSP conversion task.
    ///
    /// Suspends while the routing service dependency is confirmed (bounded by
    /// one probe timeout plus the settle delay). On dependency failure no
    /// record is created; this is a precondition failure, not a task failure.
    pub async fn start_conversion(
        &self,
        source_url: &str,
        rtsp_port: Option<u16>,
        stream_path: Option<String>,
    ) -> Result<TaskRecord, RegistryError> {
        if source_url.trim().is_empty() {
            return Err(RegistryError::MissingSource);
        }

        if !self.launcher.ensure_running().await {
            return Err(RegistryError::RouterUnavailable);
        }

        let id = Self::allocate_id();
        let port = rtsp_port.unwrap_or(self.config.router.rtsp_port);
        let path = stream_path.unwrap_or_else(|| format!("stream-{}", &id[..8]));
        let destination_url = format!("rtsp://{}:{}/{}", self.config.router.host, port, path);

        let args = conversion_args(source_url, &destination_url);
        let (handle, events) = spawn_worker(&self.config.transcoder.program, &args)?;

        let record = TaskRecord {
            id,
            kind: TaskKind::Conversion,
            name: None,
            source_url: source_url.to_string(),
            destination_url,
            rtsp_port: Some(port),
            stream_path: path,
            status: TaskStatus::Running,
            started_at: current_timestamp_ms(),
            ended_at: None,
            exit_code: None,
        };

        tracing::info!(
            task = %record.id,
            source = %record.source_url,
            destination = %record.destination_url,
            "starting conversion"
        );

        self.insert_and_watch(record.clone(), handle, events).await;
        Ok(record)
    }

    /// Start a test stream publishing a synthetic pattern to the ingest point.
    ///
    /// No dependency check: the ingest service is assumed present and is only
    /// referenced through the locator string.
    pub async fn start_test_stream(
        &self,
        name: Option<String>,
        path: Option<String>,
    ) -> Result<TaskRecord, RegistryError> {
        let id = Self::allocate_id();
        let name = name.unwrap_or_else(|| format!("stream_{}", &id[..8]));
        let path = path.unwrap_or_else(|| format!("live/{}", name));
        let ingest_url = format!(
            "rtmp://{}:{}/{}",
            self.config.ingest.host, self.config.ingest.rtmp_port, path
        );

        let args = test_stream_args(&ingest_url);
        let (handle, events) = spawn_worker(&self.config.transcoder.program, &args)?;

        let record = TaskRecord {
            id,
            kind: TaskKind::TestStream,
            name: Some(name),
            source_url: TEST_PATTERN_SOURCE.to_string(),
            destination_url: ingest_url,
            rtsp_port: None,
            stream_path: path,
            status: TaskStatus::Running,
            started_at: current_timestamp_ms(),
            ended_at: None,
            exit_code: None,
        };

        tracing::info!(task = %record.id, destination = %record.destination_url, "starting test stream");

        self.insert_and_watch(record.clone(), handle, events).await;
        Ok(record)
    }

    /// Insert a record and spawn the watcher that folds worker events into it.
    async fn insert_and_watch(
        &self,
        record: TaskRecord,
        handle: WorkerHandle,
        mut events: mpsc::Receiver<WorkerEvent>,
    ) {
        let id = record.id.clone();
        {
            let mut tasks = self.tasks.write().await;
            tasks.insert(
                id.clone(),
                TaskEntry {
                    record,
                    logs: VecDeque::new(),
                    handle: Some(handle),
                },
            );
        }

        let tasks = Arc::clone(&self.tasks);
        let bus = self.bus.clone();
        let retention = self.config.transcoder.log_retention;

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    WorkerEvent::Stderr(text) => {
                        let timestamp = current_timestamp_ms();
                        let mut map = tasks.write().await;
                        if let Some(entry) = map.get_mut(&id) {
                            // Logs stop at the first terminal transition; no
                            // late writes after teardown.
                            if entry.record.status == TaskStatus::Running {
                                if entry.logs.len() >= retention {
                                    entry.logs.pop_front();
                                }
                                entry.logs.push_back(LogEntry {
                                    timestamp,
                                    message: text.clone(),
                                });
                                bus.publish(TaskEvent::Log {
                                    id: id.clone(),
                                    text,
                                    timestamp,
                                });
                            }
                        }
                    }
                    WorkerEvent::Exited(exit_code) => {
                        let mut map = tasks.write().await;
                        if let Some(entry) = map.get_mut(&id) {
                            // First terminal transition wins: an exit arriving
                            // after an explicit stop must not downgrade the
                            // stopped status.
                            if entry.record.status == TaskStatus::Running {
                                entry.record.status = if exit_code == Some(0) {
                                    TaskStatus::Completed
                                } else {
                                    TaskStatus::Failed
                                };
                                entry.record.ended_at = Some(current_timestamp_ms());
                                entry.record.exit_code = exit_code;
                            }
                            entry.handle = None;
                            let status = entry.record.status;
                            let kind = entry.record.kind;
                            // Test streams are not retained after they end.
                            if kind == TaskKind::TestStream {
                                map.remove(&id);
                            }
                            bus.publish(TaskEvent::Ended {
                                id: id.clone(),
                                exit_code,
                                status,
                            });
                        }
                    }
                }
            }
        });
    }

    /// Stop a task by identifier.
    ///
    /// Returns `false` for an unknown id. Stopping an already-terminal task
    /// returns `true` without any process action. Test-stream records are
    /// removed from the registry on stop; conversions are retained so their
    /// final status and logs stay inspectable.
    pub async fn stop(&self, id: &str) -> bool {
        let mut tasks = self.tasks.write().await;
        let Some(entry) = tasks.get_mut(id) else {
            return false;
        };

        if entry.record.status == TaskStatus::Running {
            if let Some(handle) = entry.handle.take() {
                handle.stop();
            }
            entry.record.status = TaskStatus::Stopped;
            entry.record.ended_at = Some(current_timestamp_ms());
            tracing::info!(task = %id, "task stopped by request");
            self.bus.publish(TaskEvent::Stopped { id: id.to_string() });
        }

        let kind = entry.record.kind;
        if kind == TaskKind::TestStream {
            tasks.remove(id);
        }
        true
    }

    /// Snapshot of all records, ordered by start time for stable listings.
    pub async fn list(&self) -> Vec<TaskRecord> {
        let tasks = self.tasks.read().await;
        let mut records: Vec<TaskRecord> = tasks.values().map(|e| e.record.clone()).collect();
        records.sort_by(|a, b| (a.started_at, &a.id).cmp(&(b.started_at, &b.id)));
        records
    }

    /// Snapshot of conversion records only.
    pub async fn list_conversions(&self) -> Vec<TaskRecord> {
        self.list()
            .await
            .into_iter()
            .filter(|r| r.kind == TaskKind::Conversion)
            .collect()
    }

    /// Snapshot of test-stream records only.
    pub async fn list_streams(&self) -> Vec<TaskRecord> {
        self.list()
            .await
            .into_iter()
            .filter(|r| r.kind == TaskKind::TestStream)
            .collect()
    }

    /// Look up one record by identifier.
    pub async fn get(&self, id: &str) -> Option<TaskRecord> {
        let tasks = self.tasks.read().await;
        tasks.get(id).map(|e| e.record.clone())
    }

    /// Look up the log entries recorded for one task.
    pub async fn get_logs(&self, id: &str) -> Option<Vec<LogEntry>> {
        let tasks = self.tasks.read().await;
        tasks.get(id).map(|e| e.logs.iter().cloned().collect())
    }

    /// Stop every running task and tear down the routing service if this
    /// registry's launcher started it.
    ///
    /// Best-effort: each task is attempted independently, and the teardown is
    /// safe to call during shutdown even when workers have already exited.
    pub async fn stop_all(&self) {
        let running: Vec<String> = {
            let tasks = self.tasks.read().await;
            tasks
                .values()
                .filter(|e| e.record.status == TaskStatus::Running)
                .map(|e| e.record.id.clone())
                .collect()
        };

        for id in running {
            if !self.stop(&id).await {
                tracing::warn!(task = %id, "task vanished during shutdown");
            }
        }

        self.launcher.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    /// Write an executable fixture script standing in for the transcoder.
    fn fake_transcoder(dir: &TempDir, script: &str) -> String {
        let path = dir.path().join("fake-transcoder");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "#!/bin/sh\n{}", script).unwrap();
        drop(f);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    /// Registry whose router dependency probes the given port and whose
    /// launcher can never self-heal (no executable present).
    fn test_registry(program: &str, router_port: u16) -> Registry {
        let mut config = Config::default();
        config.transcoder.program = program.to_string();
        config.router.host = "127.0.0.1".to_string();
        config.router.rtsp_port = router_port;
        config.router.executable_dir = "/nonexistent".to_string();
        config.router.probe_timeout_ms = 200;
        config.router.settle_delay_ms = 10;

        let launcher = Arc::new(RouterLauncher::new(config.router.clone()));
        Registry::new(config, launcher, EventBus::default())
    }

    /// Wait for the `Ended` event of the given task.
    async fn wait_for_ended(
        rx: &mut tokio::sync::broadcast::Receiver<TaskEvent>,
        task_id: &str,
    ) -> (Option<i32>, TaskStatus) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await.unwrap() {
                    TaskEvent::Ended {
                        id,
                        exit_code,
                        status,
                    } if id == task_id => return (exit_code, status),
                    _ => continue,
                }
            }
        })
        .await
        .expect("task should end within the timeout")
    }

    #[tokio::test]
    async fn test_start_test_stream_is_running_and_retrievable() {
        let dir = TempDir::new().unwrap();
        let program = fake_transcoder(&dir, "sleep 30");
        let registry = test_registry(&program, 1);

        let record = registry.start_test_stream(None, None).await.unwrap();

        assert_eq!(record.status, TaskStatus::Running);
        assert_eq!(record.kind, TaskKind::TestStream);
        assert!(record.stream_path.starts_with("live/"));
        assert!(record.destination_url.starts_with("rtmp://"));

        let fetched = registry.get(&record.id).await.unwrap();
        assert_eq!(fetched, record);
        assert_eq!(registry.list_streams().await.len(), 1);

        registry.stop_all().await;
    }

    #[tokio::test]
    async fn test_test_stream_custom_name_and_path() {
        let dir = TempDir::new().unwrap();
        let program = fake_transcoder(&dir, "sleep 30");
        let registry = test_registry(&program, 1);

        let record = registry
            .start_test_stream(Some("cam1".to_string()), Some("live/cam1".to_string()))
            .await
            .unwrap();

        assert_eq!(record.name.as_deref(), Some("cam1"));
        assert_eq!(record.stream_path, "live/cam1");
        assert!(record.destination_url.ends_with("/live/cam1"));

        registry.stop_all().await;
    }

    #[tokio::test]
    async fn test_stop_removes_test_stream_from_listing() {
        let dir = TempDir::new().unwrap();
        let program = fake_transcoder(&dir, "sleep 30");
        let registry = test_registry(&program, 1);

        let record = registry.start_test_stream(None, None).await.unwrap();
        assert!(registry.stop(&record.id).await);

        assert!(registry.get(&record.id).await.is_none());
        assert!(registry.list_streams().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_reports_absent() {
        let dir = TempDir::new().unwrap();
        let program = fake_transcoder(&dir, "sleep 30");
        let registry = test_registry(&program, 1);

        assert!(registry.get("unknown-id").await.is_none());
        assert!(registry.get_logs("unknown-id").await.is_none());
        assert!(!registry.stop("unknown-id").await);
    }

    #[tokio::test]
    async fn test_conversion_fails_without_router() {
        let dir = TempDir::new().unwrap();
        let program = fake_transcoder(&dir, "sleep 30");
        // Grab an ephemeral port with nothing listening on it.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let registry = test_registry(&program, port);

        let result = registry
            .start_conversion("rtmp://localhost/live/cam", None, None)
            .await;

        assert!(matches!(result, Err(RegistryError::RouterUnavailable)));
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_source_rejected_before_dependency_check() {
        let dir = TempDir::new().unwrap();
        let program = fake_transcoder(&dir, "sleep 30");
        let registry = test_registry(&program, 1);

        let result = registry.start_conversion("  ", None, None).await;
        assert!(matches!(result, Err(RegistryError::MissingSource)));
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_conversion_happy_path_and_stop_idempotence() {
        let dir = TempDir::new().unwrap();
        let program = fake_transcoder(&dir, "sleep 30");
        // A live listener stands in for the routing service.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let registry = test_registry(&program, port);

        let record = registry
            .start_conversion("rtmp://localhost/live/cam", None, None)
            .await
            .unwrap();

        assert_eq!(record.status, TaskStatus::Running);
        assert_eq!(record.rtsp_port, Some(port));
        assert!(record
            .destination_url
            .contains(&format!("127.0.0.1:{}/stream-", port)));
        assert!(registry.get(&record.id).await.is_some());

        // Idempotent stop: true both times, status stable, record retained.
        assert!(registry.stop(&record.id).await);
        let after_first = registry.get(&record.id).await.unwrap();
        assert_eq!(after_first.status, TaskStatus::Stopped);
        assert!(after_first.ended_at.is_some());

        assert!(registry.stop(&record.id).await);
        let after_second = registry.get(&record.id).await.unwrap();
        assert_eq!(after_second.status, after_first.status);

        assert_eq!(registry.list_conversions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_worker_records_terminal_status_and_logs() {
        let dir = TempDir::new().unwrap();
        let program = fake_transcoder(&dir, "echo 'connection refused' 1>&2; exit 2");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let registry = test_registry(&program, port);
        let mut events = registry.bus().subscribe();

        let record = registry
            .start_conversion("rtmp://localhost/live/cam", None, None)
            .await
            .unwrap();

        let (exit_code, status) = wait_for_ended(&mut events, &record.id).await;
        assert_eq!(exit_code, Some(2));
        assert_eq!(status, TaskStatus::Failed);

        // Logs are visible no later than the ended event.
        let logs = registry.get_logs(&record.id).await.unwrap();
        assert!(!logs.is_empty());
        assert_eq!(logs[0].message, "connection refused");

        let fetched = registry.get(&record.id).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::Failed);
        assert_eq!(fetched.exit_code, Some(2));
        assert!(fetched.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_completed_worker_records_success() {
        let dir = TempDir::new().unwrap();
        let program = fake_transcoder(&dir, "echo 'done' 1>&2; exit 0");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let registry = test_registry(&program, port);
        let mut events = registry.bus().subscribe();

        let record = registry
            .start_conversion("rtmp://localhost/live/cam", None, None)
            .await
            .unwrap();

        let (exit_code, status) = wait_for_ended(&mut events, &record.id).await;
        assert_eq!(exit_code, Some(0));
        assert_eq!(status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_exit_after_stop_does_not_downgrade_status() {
        let dir = TempDir::new().unwrap();
        // `exec` so the shell does not fork: a forked grandchild would survive
        // the kill and hold the stderr pipe open past the event timeout.
        let program = fake_transcoder(&dir, "exec sleep 30");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let registry = test_registry(&program, port);
        let mut events = registry.bus().subscribe();

        let record = registry
            .start_conversion("rtmp://localhost/live/cam", None, None)
            .await
            .unwrap();

        assert!(registry.stop(&record.id).await);

        // The kill's exit notification lands after the stop was recorded.
        let (exit_code, status) = wait_for_ended(&mut events, &record.id).await;
        assert_eq!(exit_code, None);
        assert_eq!(status, TaskStatus::Stopped);

        let fetched = registry.get(&record.id).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::Stopped);
    }

    #[tokio::test]
    async fn test_stop_all_terminates_everything() {
        let dir = TempDir::new().unwrap();
        let program = fake_transcoder(&dir, "sleep 30");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let registry = test_registry(&program, port);

        registry.start_test_stream(None, None).await.unwrap();
        registry.start_test_stream(None, None).await.unwrap();
        let conversion = registry
            .start_conversion("rtmp://localhost/live/cam", None, None)
            .await
            .unwrap();

        registry.stop_all().await;

        // Test streams are removed; the conversion is retained as stopped.
        assert!(registry.list_streams().await.is_empty());
        let remaining = registry.list().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, conversion.id);
        assert_eq!(remaining[0].status, TaskStatus::Stopped);

        // Safe to call again once everything already ended.
        registry.stop_all().await;
    }

    #[tokio::test]
    async fn test_identifiers_are_unique_across_starts() {
        let dir = TempDir::new().unwrap();
        let program = fake_transcoder(&dir, "sleep 30");
        let registry = test_registry(&program, 1);

        let a = registry.start_test_stream(None, None).await.unwrap();
        let b = registry.start_test_stream(None, None).await.unwrap();
        assert_ne!(a.id, b.id);

        registry.stop_all().await;
    }

    // Strategy for generating URL-ish locator strings
    fn locator_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("rtmp://[a-z0-9.]{1,20}/[a-z0-9/]{1,20}").unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // *For any* source and destination locator, the conversion command
        // SHALL copy both streams and publish over RTSP/TCP to the destination.
        #[test]
        fn prop_conversion_args_completeness(
            source in locator_strategy(),
            port in 1u16..u16::MAX,
            path in "[a-z0-9-]{1,20}",
        ) {
            let destination = format!("rtsp://localhost:{}/{}", port, path);
            let args = conversion_args(&source, &destination);

            let has_pair = |flag: &str, value: &str| {
                args.windows(2).any(|w| w[0] == flag && w[1] == value)
            };

            prop_assert!(has_pair("-i", &source));
            prop_assert!(has_pair("-c:v", "copy"));
            prop_assert!(has_pair("-c:a", "copy"));
            prop_assert!(has_pair("-f", "rtsp"));
            prop_assert!(has_pair("-rtsp_transport", "tcp"));
            prop_assert_eq!(args.last().map(String::as_str), Some(destination.as_str()));
        }

        // *For any* ingest locator, the test-stream command SHALL synthesize a
        // test pattern and publish it as FLV to the ingest point.
        #[test]
        fn prop_test_stream_args_completeness(path in "[a-z0-9/_]{1,30}") {
            let ingest = format!("rtmp://localhost:1935/{}", path);
            let args = test_stream_args(&ingest);

            let has_pair = |flag: &str, value: &str| {
                args.windows(2).any(|w| w[0] == flag && w[1] == value)
            };

            prop_assert_eq!(args.first().map(String::as_str), Some("-re"));
            prop_assert!(has_pair("-f", "lavfi"));
            prop_assert!(has_pair("-i", TEST_PATTERN_SOURCE));
            prop_assert!(has_pair("-c:v", "libx264"));
            prop_assert!(has_pair("-tune", "zerolatency"));
            prop_assert!(has_pair("-f", "flv"));
            prop_assert_eq!(args.last().map(String::as_str), Some(ingest.as_str()));
        }
    }

    #[test]
    fn test_task_status_display() {
        assert_eq!(format!("{}", TaskStatus::Running), "running");
        assert_eq!(format!("{}", TaskStatus::Completed), "completed");
        assert_eq!(format!("{}", TaskStatus::Failed), "failed");
        assert_eq!(format!("{}", TaskStatus::Stopped), "stopped");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Stopped.is_terminal());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = TaskRecord {
            id: "abc".to_string(),
            kind: TaskKind::Conversion,
            name: None,
            source_url: "rtmp://localhost/live/cam".to_string(),
            destination_url: "rtsp://localhost:8554/stream-abc".to_string(),
            rtsp_port: Some(8554),
            stream_path: "stream-abc".to_string(),
            status: TaskStatus::Running,
            started_at: 1,
            ended_at: None,
            exit_code: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sourceUrl"], "rtmp://localhost/live/cam");
        assert_eq!(json["destinationUrl"], "rtsp://localhost:8554/stream-abc");
        assert_eq!(json["rtspPort"], 8554);
        assert_eq!(json["streamPath"], "stream-abc");
        assert_eq!(json["status"], "running");
        assert_eq!(json["kind"], "conversion");
        assert!(json.get("endedAt").is_none());
    }
}
