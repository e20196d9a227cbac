//! Background task scheduling
//!
//! A single mpsc-fed worker runs submissions and refreshes off the request
//! path, and a periodic ticker sweeps the meta store for jobs that still
//! want polling and queues refreshes for them.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use remaster_client::ParameterOverrides;

use crate::services::pipeline;
use crate::AppState;

/// One unit of background work.
#[derive(Debug)]
pub enum Task {
    Submit {
        track_id: Uuid,
        overrides: ParameterOverrides,
        force: bool,
    },
    Refresh {
        track_id: Uuid,
    },
}

impl Task {
    fn describe(&self) -> String {
        match self {
            Task::Submit { track_id, .. } => format!("submit {}", track_id),
            Task::Refresh { track_id } => format!("refresh {}", track_id),
        }
    }
}

/// Cloneable enqueue handle for the mastering worker.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
}

impl TaskQueue {
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<Task>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without waiting. Fails when the queue is full or the
    /// worker has shut down.
    pub fn enqueue(&self, task: Task) -> anyhow::Result<()> {
        self.tx
            .try_send(task)
            .map_err(|e| anyhow::anyhow!("Task queue rejected work: {}", e))
    }
}

/// Spawn the worker that drains the task queue, one task at a time.
pub fn spawn_worker(state: AppState, mut rx: mpsc::Receiver<Task>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Mastering worker started");
        while let Some(task) = rx.recv().await {
            let label = task.describe();
            if let Err(e) = run_task(&state, task).await {
                tracing::error!(task = %label, error = %e, "Background task failed");
                *state.last_error.write().await = Some(format!("{}: {}", label, e));
            }
        }
        tracing::info!("Mastering worker stopped");
    })
}

async fn run_task(state: &AppState, task: Task) -> anyhow::Result<()> {
    match task {
        Task::Submit {
            track_id,
            overrides,
            force,
        } => {
            pipeline::submit(state, track_id, &overrides, force).await?;
        }
        Task::Refresh { track_id } => {
            pipeline::refresh(state, track_id).await?;
        }
    }
    Ok(())
}

/// Spawn the ticker that periodically queues refreshes for every track
/// whose job is still submitted or in poll-error state.
pub fn spawn_poll_ticker(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.scheduler.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval's first tick completes immediately; skip it.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match state.store.entities_wanting_poll().await {
                Ok(track_ids) => {
                    for track_id in track_ids {
                        if let Err(e) = state.queue.enqueue(Task::Refresh { track_id }) {
                            tracing::warn!(%track_id, error = %e, "Skipping scheduled poll");
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Poll sweep query failed");
                }
            }
        }
    })
}
