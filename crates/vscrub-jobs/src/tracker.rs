//! Job tracker and engine event driver.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use vscrub_media::{EngineEvent, TranscodeEngine, TranscodeSpec};
use vscrub_models::{Job, JobId, JobState};

use crate::error::JobError;

/// Process-local registry of jobs, keyed by job id.
///
/// All state transitions go through this type under its write lock, so
/// the lifecycle invariants hold regardless of event timing: `running`
/// is entered at most once, progress never decreases, and exactly one
/// terminal transition wins.
#[derive(Default)]
pub struct JobTracker {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending job and start driving the engine's events
    /// into it. Returns a snapshot of the job as registered.
    pub async fn submit(self: &Arc<Self>, job: Job, engine: &dyn TranscodeEngine) -> Job {
        let spec = TranscodeSpec {
            input: job.input_path.clone(),
            output: job.output_path.clone(),
            operation: job.operation,
        };

        let snapshot = job.clone();
        self.jobs
            .write()
            .await
            .insert(job.id.as_str().to_string(), job);

        counter!("vscrub_jobs_submitted_total").increment(1);
        info!(job_id = %snapshot.id, operation = %snapshot.operation, "job submitted");

        let rx = engine.spawn(spec);
        let tracker = Arc::clone(self);
        let id = snapshot.id.clone();
        tokio::spawn(async move {
            tracker.drive(id, rx).await;
        });

        snapshot
    }

    /// Snapshot of a job, visible only to its owner.
    pub async fn get(&self, id: &str, user_id: &str) -> Result<Job, JobError> {
        let jobs = self.jobs.read().await;
        jobs.get(id)
            .filter(|job| job.user_id == user_id)
            .cloned()
            .ok_or(JobError::NotFound)
    }

    /// All of a user's jobs, newest first.
    pub async fn jobs_for_user(&self, user_id: &str) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut out: Vec<Job> = jobs
            .values()
            .filter(|job| job.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Cancel a pending job. A job that has started, finished, or was
    /// already cancelled cannot be cancelled.
    pub async fn cancel(&self, id: &str, user_id: &str) -> Result<Job, JobError> {
        let input_path;
        let output_path;
        let snapshot;
        {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(id)
                .filter(|job| job.user_id == user_id)
                .ok_or(JobError::NotFound)?;

            if job.state != JobState::Pending {
                return Err(JobError::invalid(job.state.as_str(), "be cancelled"));
            }

            job.state = JobState::Cancelled;
            job.completed_at = Some(Utc::now());
            input_path = job.input_path.clone();
            output_path = job.output_path.clone();
            snapshot = job.clone();
        }

        counter!("vscrub_jobs_cancelled_total").increment(1);
        info!(job_id = %id, "job cancelled");
        remove_artifact(&input_path).await;
        // An engine that raced the cancel may have begun the output
        remove_artifact(&output_path).await;
        Ok(snapshot)
    }

    /// Apply engine events in channel order until a terminal event or
    /// the channel closes. Dropping the receiver tells the engine to
    /// stop.
    async fn drive(self: Arc<Self>, id: JobId, mut rx: mpsc::Receiver<EngineEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                EngineEvent::Started => {
                    if self.mark_running(id.as_str()).await.is_err() {
                        // Cancelled between submit and engine start; the
                        // cancel path already removed the input
                        debug!(job_id = %id, "engine started after cancellation, aborting");
                        return;
                    }
                }
                EngineEvent::Progress(pct) => {
                    self.record_progress(id.as_str(), pct).await;
                }
                EngineEvent::Completed => {
                    if let Ok(input) = self.complete(id.as_str()).await {
                        remove_artifact(&input).await;
                    }
                    return;
                }
                EngineEvent::Failed(message) => {
                    if let Ok((input, output)) = self.fail(id.as_str(), message).await {
                        remove_artifact(&input).await;
                        remove_artifact(&output).await;
                    }
                    return;
                }
            }
        }
    }

    async fn mark_running(&self, id: &str) -> Result<(), JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or(JobError::NotFound)?;

        if job.state != JobState::Pending {
            return Err(JobError::invalid(job.state.as_str(), "start"));
        }
        job.state = JobState::Running;
        job.started_at = Some(Utc::now());
        debug!(job_id = %id, "job running");
        Ok(())
    }

    /// Progress only moves forward, and only while running. Stale or
    /// out-of-order ticks are dropped.
    async fn record_progress(&self, id: &str, pct: u8) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(id) {
            if job.state == JobState::Running && pct > job.progress {
                job.progress = pct.min(100);
            }
        }
    }

    /// Returns the input path to clean up. Repeated completion is a
    /// no-op error so the caller skips cleanup the second time.
    async fn complete(&self, id: &str) -> Result<PathBuf, JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or(JobError::NotFound)?;

        match job.state {
            JobState::Running => {
                job.state = JobState::Completed;
                job.progress = 100;
                job.completed_at = Some(Utc::now());
                counter!("vscrub_jobs_completed_total").increment(1);
                info!(job_id = %id, "job completed");
                Ok(job.input_path.clone())
            }
            JobState::Completed => Err(JobError::invalid("completed", "complete again")),
            state => {
                warn!(job_id = %id, %state, "completion event in unexpected state");
                Err(JobError::invalid(state.as_str(), "complete"))
            }
        }
    }

    /// Returns the input and partial output paths to clean up.
    async fn fail(&self, id: &str, message: String) -> Result<(PathBuf, PathBuf), JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or(JobError::NotFound)?;

        match job.state {
            JobState::Running => {
                job.state = JobState::Failed;
                job.error_message = Some(message);
                job.completed_at = Some(Utc::now());
                counter!("vscrub_jobs_failed_total").increment(1);
                warn!(job_id = %id, error = job.error_message.as_deref(), "job failed");
                Ok((job.input_path.clone(), job.output_path.clone()))
            }
            JobState::Failed => Err(JobError::invalid("failed", "fail again")),
            state => {
                warn!(job_id = %id, %state, "failure event in unexpected state");
                Err(JobError::invalid(state.as_str(), "fail"))
            }
        }
    }
}

/// Best-effort artifact removal. A missing file is fine.
async fn remove_artifact(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vscrub_models::Operation;

    /// Engine that replays a fixed script of events.
    struct ScriptedEngine {
        script: Vec<EngineEvent>,
        /// Delay before the first event.
        delay: Duration,
        /// Keep the channel open after the script so the job stays in
        /// whatever state the script left it.
        hold_open: bool,
    }

    impl ScriptedEngine {
        fn new(script: Vec<EngineEvent>) -> Self {
            Self {
                script,
                delay: Duration::ZERO,
                hold_open: false,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn hold_open(mut self) -> Self {
            self.hold_open = true;
            self
        }
    }

    impl TranscodeEngine for ScriptedEngine {
        fn spawn(&self, _spec: TranscodeSpec) -> mpsc::Receiver<EngineEvent> {
            let (tx, rx) = mpsc::channel(64);
            let script = self.script.clone();
            let delay = self.delay;
            let hold_open = self.hold_open;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                for event in script {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                if hold_open {
                    tx.closed().await;
                }
            });
            rx
        }
    }

    fn temp_job(dir: &tempfile::TempDir, user_id: &str) -> Job {
        let input = dir.path().join(format!("{}-in.mp4", uuid_suffix()));
        let output = dir.path().join(format!("{}-out.mp4", uuid_suffix()));
        std::fs::write(&input, b"fake video").unwrap();
        Job::new(user_id, Operation::Custom, input, "clip.mp4", output)
    }

    fn uuid_suffix() -> String {
        JobId::new().as_str().to_string()
    }

    async fn wait_for_state(tracker: &JobTracker, id: &str, user: &str, state: JobState) -> Job {
        for _ in 0..200 {
            let job = tracker.get(id, user).await.unwrap();
            if job.state == state {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job never reached {state}");
    }

    #[tokio::test]
    async fn test_happy_path_completes_and_removes_input() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(JobTracker::new());
        let engine = ScriptedEngine::new(vec![
            EngineEvent::Started,
            EngineEvent::Progress(10),
            EngineEvent::Progress(55),
            EngineEvent::Completed,
        ]);

        let job = tracker.submit(temp_job(&dir, "u1"), &engine).await;
        let done = wait_for_state(&tracker, job.id.as_str(), "u1", JobState::Completed).await;

        assert_eq!(done.progress, 100);
        assert!(done.started_at.is_some());
        assert!(done.completed_at.is_some());
        assert!(!job.input_path.exists(), "input artifact not cleaned up");
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(JobTracker::new());
        let engine = ScriptedEngine::new(vec![
            EngineEvent::Started,
            EngineEvent::Progress(60),
            EngineEvent::Progress(40),
        ])
        .hold_open();

        let job = tracker.submit(temp_job(&dir, "u1"), &engine).await;
        wait_for_state(&tracker, job.id.as_str(), "u1", JobState::Running).await;

        // Give the stale tick time to be (not) applied
        tokio::time::sleep(Duration::from_millis(50)).await;
        let job = tracker.get(job.id.as_str(), "u1").await.unwrap();
        assert_eq!(job.progress, 60);
    }

    #[tokio::test]
    async fn test_failure_records_error_and_removes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(JobTracker::new());
        let engine = ScriptedEngine::new(vec![
            EngineEvent::Started,
            EngineEvent::Progress(30),
            EngineEvent::Failed("encoder exploded".into()),
        ]);

        let submitted = tracker.submit(temp_job(&dir, "u1"), &engine).await;
        // Simulate a partial output left behind by the encoder
        std::fs::write(&submitted.output_path, b"partial").unwrap();

        let job = wait_for_state(&tracker, submitted.id.as_str(), "u1", JobState::Failed).await;

        assert_eq!(job.error_message.as_deref(), Some("encoder exploded"));
        assert_eq!(job.progress, 30);
        assert!(!submitted.input_path.exists());
        assert!(!submitted.output_path.exists());
    }

    #[tokio::test]
    async fn test_cancel_pending_job() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(JobTracker::new());
        // Engine that never gets around to starting
        let engine =
            ScriptedEngine::new(vec![EngineEvent::Started]).with_delay(Duration::from_secs(60));

        let job = tracker.submit(temp_job(&dir, "u1"), &engine).await;
        // An eager engine may have started the output before the cancel
        std::fs::write(&job.output_path, b"partial").unwrap();
        let cancelled = tracker.cancel(job.id.as_str(), "u1").await.unwrap();

        assert_eq!(cancelled.state, JobState::Cancelled);
        assert!(!job.input_path.exists());
        assert!(!job.output_path.exists());

        // Cancelled is terminal
        assert!(matches!(
            tracker.cancel(job.id.as_str(), "u1").await,
            Err(JobError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_running_job_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(JobTracker::new());
        let engine = ScriptedEngine::new(vec![EngineEvent::Started]).hold_open();

        let job = tracker.submit(temp_job(&dir, "u1"), &engine).await;
        wait_for_state(&tracker, job.id.as_str(), "u1", JobState::Running).await;

        assert!(matches!(
            tracker.cancel(job.id.as_str(), "u1").await,
            Err(JobError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_started_after_cancel_does_not_resurrect() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(JobTracker::new());
        let engine =
            ScriptedEngine::new(vec![EngineEvent::Started, EngineEvent::Completed])
                .with_delay(Duration::from_millis(50));

        let job = tracker.submit(temp_job(&dir, "u1"), &engine).await;
        tracker.cancel(job.id.as_str(), "u1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let job = tracker.get(job.id.as_str(), "u1").await.unwrap();
        assert_eq!(job.state, JobState::Cancelled);
    }

    #[tokio::test]
    async fn test_jobs_are_scoped_to_owner() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(JobTracker::new());
        let engine = ScriptedEngine::new(vec![]).hold_open();

        let job = tracker.submit(temp_job(&dir, "u1"), &engine).await;

        assert!(matches!(
            tracker.get(job.id.as_str(), "u2").await,
            Err(JobError::NotFound)
        ));
        assert!(matches!(
            tracker.cancel(job.id.as_str(), "u2").await,
            Err(JobError::NotFound)
        ));
        assert!(tracker.jobs_for_user("u2").await.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(JobTracker::new());
        let engine = ScriptedEngine::new(vec![]).hold_open();

        let first = tracker.submit(temp_job(&dir, "u1"), &engine).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = tracker.submit(temp_job(&dir, "u1"), &engine).await;

        let history = tracker.jobs_for_user("u1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
    }
}
