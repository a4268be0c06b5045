use log::{debug, info};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::TimingConfig;
use crate::estimator::{MotionEstimator, TickOutcome};
use crate::feedback::FeedbackSink;
use crate::source::{SharedSource, VideoSource};

pub type SharedEstimator = Arc<RwLock<MotionEstimator>>;

/// Drives the estimator with a self-rescheduling sampling task.
///
/// Each activation spawns one task tagged with the estimator's epoch. The task
/// checks at the top of every iteration that its epoch is still the current
/// activation, so stopping is observed at the next wake-up and a quick
/// stop/start never leaves two chains ticking.
pub struct MotionMonitor<S: VideoSource + 'static> {
    estimator: SharedEstimator,
    source: SharedSource<S>,
    sink: Arc<dyn FeedbackSink>,
    timing: TimingConfig,
    task: Option<JoinHandle<()>>,
}

impl<S: VideoSource + 'static> MotionMonitor<S> {
    pub fn new(
        estimator: SharedEstimator,
        source: SharedSource<S>,
        sink: Arc<dyn FeedbackSink>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            estimator,
            source,
            sink,
            timing,
            task: None,
        }
    }

    /// Start sampling. Returns `false` if sampling was already running.
    pub async fn start(&mut self) -> bool {
        let epoch = {
            let mut estimator = self.estimator.write().await;
            if !estimator.start() {
                return false;
            }
            estimator.epoch()
        };

        let task = tokio::spawn(run_sampling(
            Arc::clone(&self.estimator),
            Arc::clone(&self.source),
            Arc::clone(&self.sink),
            self.timing.clone(),
            epoch,
        ));
        self.task = Some(task);
        true
    }

    /// Stop sampling; the running task ends at its next wake-up.
    pub async fn stop(&mut self) {
        self.estimator.write().await.stop();
        self.task = None;
    }

    pub async fn is_active(&self) -> bool {
        self.estimator.read().await.is_active()
    }

    /// Whether the task spawned by the latest `start` is still running.
    pub fn is_sampling(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }

    pub fn estimator(&self) -> &SharedEstimator {
        &self.estimator
    }
}

async fn run_sampling<S: VideoSource + 'static>(
    estimator: SharedEstimator,
    source: SharedSource<S>,
    sink: Arc<dyn FeedbackSink>,
    timing: TimingConfig,
    epoch: u64,
) {
    info!("Motion sampling scheduled (epoch {}, warm-up {:?})", epoch, timing.warmup());
    sleep(timing.warmup()).await;

    loop {
        let delay = {
            let mut estimator = estimator.write().await;
            if !estimator.is_current(epoch) {
                break;
            }

            let mut source = source.write().await;
            match estimator.tick(&mut *source, sink.as_ref()) {
                TickOutcome::Inactive => break,
                TickOutcome::NotReady | TickOutcome::SourceLost => timing.not_ready_backoff(),
                TickOutcome::Primed | TickOutcome::Scored(_) => timing.tick_interval(),
            }
        };

        sleep(delay).await;
    }

    debug!("Motion sampling ended (epoch {})", epoch);
}
