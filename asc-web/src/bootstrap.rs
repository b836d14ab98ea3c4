//! Startup bootstrap sequence
//!
//! One-time initialization steps run in order before the listener starts.
//! A failing, panicking or timed-out step is recorded in the
//! [`StartupReport`] and the remaining steps still run.

pub mod steps;

pub use steps::{application_sequencer, IdentitySeedStep, NavigationCacheStep};

use asc_core::{AscError, AscResult, ErrorContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn, Instrument};

/// A named unit of startup work. Re-running a step must be safe.
#[async_trait]
pub trait BootstrapStep: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> AscResult<()>;
}

/// Lifecycle of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Succeeded | StepState::Failed)
    }
}

/// Outcome of one step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub state: StepState,
    /// Failure cause when the step failed
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl StepReport {
    fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: StepState::Pending,
            error: None,
            duration_ms: 0,
        }
    }
}

/// Aggregate outcome of a bootstrap run
#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StartupReport {
    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.state == StepState::Succeeded)
    }

    pub fn failed_steps(&self) -> Vec<&StepReport> {
        self.steps
            .iter()
            .filter(|s| s.state == StepState::Failed)
            .collect()
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Runs bootstrap steps sequentially, isolating each step's failure
#[derive(Default)]
pub struct BootstrapSequencer {
    steps: Vec<Box<dyn BootstrapStep>>,
    step_timeout: Option<Duration>,
}

impl BootstrapSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step; steps run in the order they were added
    pub fn add_step<S: BootstrapStep + 'static>(mut self, step: S) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Fail any step that runs longer than `timeout`
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub async fn run(self) -> StartupReport {
        let started_at = Utc::now();
        let mut reports: Vec<StepReport> = self
            .steps
            .iter()
            .map(|s| StepReport::pending(s.name()))
            .collect();

        info!(steps = reports.len(), "Starting bootstrap sequence");

        for (step, report) in self.steps.iter().zip(reports.iter_mut()) {
            let span = info_span!("bootstrap_step", step = %report.name);
            self.run_step(step.as_ref(), report).instrument(span).await;
        }

        let report = StartupReport {
            steps: reports,
            started_at,
            finished_at: Utc::now(),
        };

        if report.all_succeeded() {
            info!("Bootstrap sequence completed");
        } else {
            warn!(
                failed = report.failed_steps().len(),
                "Bootstrap sequence completed with failures"
            );
        }
        report
    }

    async fn run_step(&self, step: &dyn BootstrapStep, report: &mut StepReport) {
        report.state = StepState::Running;
        info!("Running bootstrap step");

        let start = Instant::now();
        let outcome = self.invoke(step).await;
        report.duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                report.state = StepState::Succeeded;
                info!(duration_ms = report.duration_ms, "Bootstrap step succeeded");
            }
            Err(e) => {
                report.state = StepState::Failed;
                report.error = Some(e.to_string());
                e.log();
                warn!(duration_ms = report.duration_ms, "Bootstrap step failed");
            }
        }
    }

    async fn invoke(&self, step: &dyn BootstrapStep) -> AscResult<()> {
        let guarded = AssertUnwindSafe(step.run()).catch_unwind();

        let outcome = match self.step_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(AscError::Timeout {
                        operation: format!("bootstrap step '{}'", step.name()),
                        duration_ms: limit.as_millis() as u64,
                        context: ErrorContext::new("bootstrap").with_operation(step.name()),
                    })
                }
            },
            None => guarded.await,
        };

        outcome.unwrap_or_else(|panic| {
            Err(AscError::Internal {
                message: format!("step panicked: {}", panic_message(panic.as_ref())),
                source: None,
                context: ErrorContext::new("bootstrap").with_operation(step.name()),
            })
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Step that records its invocation and returns a scripted outcome
    struct ScriptedStep {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        behaviour: Behaviour,
    }

    enum Behaviour {
        Succeed,
        Fail,
        Panic,
        Hang,
    }

    impl ScriptedStep {
        fn new(
            name: &'static str,
            log: &Arc<Mutex<Vec<&'static str>>>,
            behaviour: Behaviour,
        ) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                behaviour,
            }
        }
    }

    #[async_trait]
    impl BootstrapStep for ScriptedStep {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self) -> AscResult<()> {
            self.log.lock().unwrap().push(self.name);
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(asc_core::identity_error!(
                    "directory offline",
                    "test",
                    std::io::Error::new(std::io::ErrorKind::NotConnected, "offline")
                )),
                Behaviour::Panic => panic!("boom"),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }
            }
        }
    }

    fn log() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// Formatted tracing output collected in memory
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let log = log();
        let report = BootstrapSequencer::new()
            .add_step(ScriptedStep::new("first", &log, Behaviour::Succeed))
            .add_step(ScriptedStep::new("second", &log, Behaviour::Succeed))
            .run()
            .await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert!(report.all_succeeded());
        assert!(report.steps.iter().all(|s| s.state.is_terminal()));
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_steps() {
        let log = log();
        let report = BootstrapSequencer::new()
            .add_step(ScriptedStep::new("identity_seed", &log, Behaviour::Fail))
            .add_step(ScriptedStep::new("navigation_cache", &log, Behaviour::Succeed))
            .run()
            .await;

        assert_eq!(*log.lock().unwrap(), vec!["identity_seed", "navigation_cache"]);
        assert!(!report.all_succeeded());

        let failed = report.failed_steps();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "identity_seed");
        assert!(failed[0]
            .error
            .as_deref()
            .unwrap()
            .contains("directory offline"));

        let nav = report.step("navigation_cache").unwrap();
        assert_eq!(nav.state, StepState::Succeeded);
        assert!(nav.error.is_none());
    }

    #[tokio::test]
    async fn test_failure_logged_with_error_id_in_step_span() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let log = log();
        BootstrapSequencer::new()
            .add_step(ScriptedStep::new("identity_seed", &log, Behaviour::Fail))
            .run()
            .await;

        let output = logs.contents();
        let line = output
            .lines()
            .find(|line| line.contains("directory offline"))
            .expect("step error logged");
        assert!(line.contains("bootstrap_step"));
        assert!(line.contains("step=identity_seed"));
        assert!(line.contains("error_id="));
    }

    #[tokio::test]
    async fn test_last_step_failure_completes() {
        let log = log();
        let report = BootstrapSequencer::new()
            .add_step(ScriptedStep::new("identity_seed", &log, Behaviour::Succeed))
            .add_step(ScriptedStep::new("navigation_cache", &log, Behaviour::Fail))
            .run()
            .await;

        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[0].state, StepState::Succeeded);
        assert_eq!(report.steps[1].state, StepState::Failed);
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let log = log();
        let report = BootstrapSequencer::new()
            .add_step(ScriptedStep::new("explodes", &log, Behaviour::Panic))
            .add_step(ScriptedStep::new("after", &log, Behaviour::Succeed))
            .run()
            .await;

        let failed = report.step("explodes").unwrap();
        assert_eq!(failed.state, StepState::Failed);
        assert!(failed.error.as_deref().unwrap().contains("boom"));
        assert_eq!(report.step("after").unwrap().state, StepState::Succeeded);
    }

    #[tokio::test]
    async fn test_timeout_marks_step_failed() {
        let log = log();
        let report = BootstrapSequencer::new()
            .with_step_timeout(Some(Duration::from_millis(50)))
            .add_step(ScriptedStep::new("slow", &log, Behaviour::Hang))
            .add_step(ScriptedStep::new("after", &log, Behaviour::Succeed))
            .run()
            .await;

        let slow = report.step("slow").unwrap();
        assert_eq!(slow.state, StepState::Failed);
        assert!(slow.error.as_deref().unwrap().contains("timeout"));
        assert_eq!(report.step("after").unwrap().state, StepState::Succeeded);
    }

    #[tokio::test]
    async fn test_empty_sequence_succeeds() {
        let report = BootstrapSequencer::new().run().await;
        assert!(report.steps.is_empty());
        assert!(report.all_succeeded());
    }

    #[test]
    fn test_report_serializes_states() {
        let report = StartupReport {
            steps: vec![StepReport {
                name: "identity_seed".to_string(),
                state: StepState::Failed,
                error: Some("offline".to_string()),
                duration_ms: 3,
            }],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["steps"][0]["state"], "failed");
        assert_eq!(json["steps"][0]["error"], "offline");
    }
}
