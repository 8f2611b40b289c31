//! Job scheduler.
//!
//! Callers submit an [`AggregateFlow`] with [`JobScheduler::schedule_job`];
//! a drain loop ([`JobScheduler::process_pending_jobs`]) runs queued jobs one
//! at a time until their flows are exhausted or a stage fails.
//!
//! The stage timeout is checked between `update` calls, so a remote command
//! that is already running always completes. Settled jobs stay queryable
//! until `scheduler.retained_jobs` newer jobs have settled after them.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use ephemera_common::{JobSnapshot, JobStatus};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::application::context::StageContext;
use crate::application::flow::AggregateFlow;
use crate::application::stage::{Stage, StageStatus};
use crate::domain::config::SchedulerConfig;
use crate::domain::error::{JobError, StageError};
use crate::domain::job::JobId;
use crate::domain::queue::BoundedCoalescingQueue;

struct JobEntry {
    snapshot: JobSnapshot,
    /// Taken by the drain loop when the job starts.
    flow: Option<AggregateFlow>,
}

pub struct JobScheduler {
    ctx: StageContext,
    poll_interval: Duration,
    stage_timeout: Duration,
    retained_jobs: usize,
    queue: Mutex<BoundedCoalescingQueue<JobId>>,
    jobs: Mutex<HashMap<JobId, JobEntry>>,
    /// Settled jobs, oldest first.
    settled: Mutex<VecDeque<JobId>>,
    drain: tokio::sync::Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobScheduler {
    #[must_use]
    pub fn new(ctx: StageContext, config: &SchedulerConfig) -> Self {
        Self {
            ctx,
            poll_interval: config.poll_interval(),
            stage_timeout: config.stage_timeout(),
            retained_jobs: config.retained_jobs,
            queue: Mutex::new(BoundedCoalescingQueue::new()),
            jobs: Mutex::new(HashMap::new()),
            settled: Mutex::new(VecDeque::new()),
            drain: tokio::sync::Mutex::new(()),
        }
    }

    /// Register `flow` as a pending job and return immediately.
    ///
    /// When the queue is full the previously queued (not the oldest) job is
    /// displaced and settled as failed.
    pub fn schedule_job(&self, flow: AggregateFlow) -> JobSnapshot {
        let id = JobId::generate();
        let snapshot = JobSnapshot {
            id: id.to_string(),
            status: JobStatus::Pending,
            description: "Queued".to_string(),
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };
        let flows = flow.flow_names().collect::<Vec<_>>().join(" -> ");
        lock(&self.jobs).insert(
            id.clone(),
            JobEntry {
                snapshot: snapshot.clone(),
                flow: Some(flow),
            },
        );
        info!(job_id = %id, %flows, "job scheduled");

        let displaced = lock(&self.queue).enqueue(id);
        if let Some(displaced) = displaced {
            warn!(job_id = %displaced, "job superseded before it started");
            self.finish(&displaced, Err(&JobError::Superseded));
        }
        snapshot
    }

    /// Current view of job `id`. Settled jobs are forgotten once enough newer
    /// ones have settled.
    #[must_use]
    pub fn job(&self, id: &str) -> Option<JobSnapshot> {
        let id = JobId::parse(id)?;
        lock(&self.jobs).get(&id).map(|entry| entry.snapshot.clone())
    }

    /// Number of jobs waiting in the queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Run queued jobs until the queue is empty. Concurrent callers wait for
    /// the active drain to finish.
    pub async fn process_pending_jobs(&self) {
        let _drain = self.drain.lock().await;
        loop {
            let Some(id) = lock(&self.queue).dequeue() else {
                break;
            };
            let flow = lock(&self.jobs).get_mut(&id).and_then(|entry| entry.flow.take());
            let Some(flow) = flow else {
                continue;
            };
            self.update(&id, |s| s.status = JobStatus::InProgress);
            info!(job_id = %id, "job started");
            let result = self.run_job(&id, flow).await;
            self.finish(&id, result.as_ref().map(|_| ()));
        }
    }

    async fn run_job(&self, id: &JobId, mut flow: AggregateFlow) -> Result<(), JobError> {
        let mut stage = flow.initial_stage(&self.ctx)?;
        loop {
            let outcome = self.run_stage(id, &mut stage).await;
            stage.dispose().await;
            outcome?;
            info!(job_id = %id, stage = stage.name(), "stage succeeded");
            match flow.next_stage(&self.ctx, &stage)? {
                Some(next) => stage = next,
                None => return Ok(()),
            }
        }
    }

    async fn run_stage(&self, id: &JobId, stage: &mut Stage) -> Result<(), StageError> {
        let name = stage.name();
        info!(job_id = %id, stage = name, "stage started");
        self.describe(id, stage);
        let started = Instant::now();
        stage.initialize(&self.ctx).await?;
        loop {
            match stage.update(&self.ctx).await? {
                StageStatus::Succeeded => return Ok(()),
                StageStatus::InProgress(_) => {
                    if started.elapsed() >= self.stage_timeout {
                        return Err(StageError::TimedOut {
                            stage: name,
                            secs: self.stage_timeout.as_secs(),
                        });
                    }
                    self.describe(id, stage);
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    fn describe(&self, id: &JobId, stage: &Stage) {
        let description = stage.description().to_string();
        self.update(id, |s| s.description = description);
    }

    fn update(&self, id: &JobId, apply: impl FnOnce(&mut JobSnapshot)) {
        if let Some(entry) = lock(&self.jobs).get_mut(id) {
            apply(&mut entry.snapshot);
        }
    }

    fn finish(&self, id: &JobId, result: Result<(), &JobError>) {
        match result {
            Ok(()) => {
                info!(job_id = %id, "job succeeded");
                self.update(id, |s| {
                    s.status = JobStatus::Succeeded;
                    s.description = "Completed".to_string();
                    s.finished_at = Some(Utc::now());
                });
            }
            Err(err) => {
                warn!(job_id = %id, error = %err, "job failed");
                let message = err.client_message();
                let description = err.to_string();
                self.update(id, |s| {
                    s.status = JobStatus::Failed;
                    s.description = description;
                    s.error = Some(message);
                    s.finished_at = Some(Utc::now());
                });
                if let Some(entry) = lock(&self.jobs).get_mut(id) {
                    entry.flow = None;
                }
            }
        }
        self.retain(id);
    }

    fn retain(&self, id: &JobId) {
        let evicted: Vec<JobId> = {
            let mut settled = lock(&self.settled);
            settled.push_back(id.clone());
            let excess = settled.len().saturating_sub(self.retained_jobs);
            settled.drain(..excess).collect()
        };
        if evicted.is_empty() {
            return;
        }
        let mut jobs = lock(&self.jobs);
        for old in &evicted {
            jobs.remove(old);
        }
        debug!(evicted = evicted.len(), "forgot settled jobs");
    }
}

impl std::fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScheduler")
            .field("poll_interval", &self.poll_interval)
            .field("stage_timeout", &self.stage_timeout)
            .field("retained_jobs", &self.retained_jobs)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
