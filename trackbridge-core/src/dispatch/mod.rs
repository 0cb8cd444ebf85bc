//! Concurrent create/update pipeline
//!
//! Each phase runs two producers, one streaming create drafts and one
//! streaming update drafts. The dispatcher spawns a job per draft as it
//! arrives and, once both streams are closed, waits for every job it spawned.

mod issues;
mod sprints;
mod worklogs;

pub use issues::IssuePhase;
pub use sprints::SprintPhase;
pub use worklogs::WorklogPhase;

use async_trait::async_trait;
use metrics::counter;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Bound on drafts buffered between a producer and the dispatcher
pub const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Sprints,
    Issues,
    Worklogs,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Sprints => "sprints",
            Phase::Issues => "issues",
            Phase::Worklogs => "worklogs",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single job achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The Target was changed
    Synced,
    /// Nothing needed to change
    Unchanged,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub phase: Phase,
    pub spawned: usize,
    pub succeeded: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl DispatchReport {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            spawned: 0,
            succeeded: 0,
            unchanged: 0,
            failed: 0,
        }
    }

    /// Results received, always equal to `spawned` once dispatch returns
    pub fn drained(&self) -> usize {
        self.succeeded + self.unchanged + self.failed
    }

    fn record(&mut self, outcome: JobOutcome) {
        let label = self.phase.as_str();
        match outcome {
            JobOutcome::Synced => {
                self.succeeded += 1;
                counter!("sync.jobs.succeeded", "phase" => label).increment(1);
            }
            JobOutcome::Unchanged => self.unchanged += 1,
            JobOutcome::Failed => {
                self.failed += 1;
                counter!("sync.jobs.failed", "phase" => label).increment(1);
            }
        }
    }
}

/// One entity kind's producers and workers
#[async_trait]
pub trait SyncPhase: Send + Sync + 'static {
    type Create: Send + 'static;
    type Update: Send + 'static;

    fn phase(&self) -> Phase;

    /// Stream drafts for entities missing in the Target; returning closes the stream
    async fn prepare_creates(&self, tx: mpsc::Sender<Self::Create>);

    /// Stream drafts for correlated entities that drifted
    async fn prepare_updates(&self, tx: mpsc::Sender<Self::Update>);

    async fn create(&self, item: Self::Create) -> JobOutcome;

    async fn update(&self, item: Self::Update) -> JobOutcome;
}

/// Start both producers of `worker` and dispatch their drafts
pub async fn run_phase<P: SyncPhase>(worker: Arc<P>) -> DispatchReport {
    let (creates_tx, creates_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (updates_tx, updates_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let producer = worker.clone();
    let creating = tokio::spawn(async move { producer.prepare_creates(creates_tx).await });
    let producer = worker.clone();
    let updating = tokio::spawn(async move { producer.prepare_updates(updates_tx).await });

    let report = dispatch(worker, creates_rx, updates_rx).await;

    for producer in [creating, updating] {
        if let Err(e) = producer.await {
            error!(phase = %report.phase, error = %e, "Producer task failed");
        }
    }
    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Creates,
    Updates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Awaiting,
    OneClosed(Stream),
    BothClosed,
}

impl StreamState {
    fn close(self, stream: Stream) -> Self {
        match self {
            StreamState::Awaiting => StreamState::OneClosed(stream),
            StreamState::OneClosed(_) | StreamState::BothClosed => StreamState::BothClosed,
        }
    }
}

enum Job<C, U> {
    Create(C),
    Update(U),
}

/// Spawn a job per received draft, then drain exactly as many results
pub async fn dispatch<P: SyncPhase>(
    worker: Arc<P>,
    mut creates: mpsc::Receiver<P::Create>,
    mut updates: mpsc::Receiver<P::Update>,
) -> DispatchReport {
    let phase = worker.phase();
    let mut report = DispatchReport::new(phase);
    let mut jobs = JoinSet::new();
    let mut state = StreamState::Awaiting;

    loop {
        let (stream, job) = match state {
            StreamState::BothClosed => break,
            StreamState::Awaiting => tokio::select! {
                item = creates.recv() => (Stream::Creates, item.map(Job::Create)),
                item = updates.recv() => (Stream::Updates, item.map(Job::Update)),
            },
            StreamState::OneClosed(Stream::Creates) => {
                (Stream::Updates, updates.recv().await.map(Job::Update))
            }
            StreamState::OneClosed(Stream::Updates) => {
                (Stream::Creates, creates.recv().await.map(Job::Create))
            }
        };

        let Some(job) = job else {
            debug!(%phase, ?stream, "Draft stream closed");
            state = state.close(stream);
            continue;
        };

        let worker = worker.clone();
        jobs.spawn(async move {
            match job {
                Job::Create(item) => worker.create(item).await,
                Job::Update(item) => worker.update(item).await,
            }
        });
        report.spawned += 1;
        counter!("sync.jobs.spawned", "phase" => phase.as_str()).increment(1);
    }

    if report.spawned > 0 {
        info!(%phase, jobs = report.spawned, "Triggered sync jobs");
    }

    while let Some(joined) = jobs.join_next().await {
        match joined {
            Ok(outcome) => report.record(outcome),
            Err(e) => {
                error!(%phase, error = %e, "Sync job panicked");
                report.record(JobOutcome::Failed);
            }
        }
    }

    if report.spawned == 0 {
        info!(%phase, "Nothing requires synchronization");
    } else {
        info!(
            %phase,
            succeeded = report.succeeded,
            unchanged = report.unchanged,
            failed = report.failed,
            "Phase drained"
        );
    }
    report
}
