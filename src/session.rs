//! Capture session: wires the video source, the motion monitor and the
//! committer together and reacts to trigger commands.

use anyhow::{Context, Result};
use image::imageops;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::committer::CaptureCommitter;
use crate::config::Config;
use crate::controls::{ControlCommand, ControlInput};
use crate::estimator::{GateDecision, MotionEstimator};
use crate::feedback::FeedbackSink;
use crate::monitor::{MotionMonitor, SharedEstimator};
use crate::source::{FacingMode, SharedSource, VideoSource};

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Captured(PathBuf),
    /// Gate refused: the camera is moving too much
    TooMuchMotion { average: f64, threshold: f64 },
    /// The source lost its frame during the settle delay
    SourceNotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Healthy,
    StreamLost,
    StreamRestored,
}

pub struct CaptureSession<S: VideoSource + 'static, C: CaptureCommitter> {
    config: Config,
    source: SharedSource<S>,
    monitor: MotionMonitor<S>,
    committer: C,
    stream_lost: bool,
    halted: bool,
    photos_taken: usize,
}

impl<S: VideoSource + 'static, C: CaptureCommitter> CaptureSession<S, C> {
    pub fn new(config: Config, source: SharedSource<S>, committer: C, sink: Arc<dyn FeedbackSink>) -> Self {
        let estimator: SharedEstimator = Arc::new(RwLock::new(MotionEstimator::new(&config)));
        let monitor = MotionMonitor::new(estimator, Arc::clone(&source), sink, config.timing.clone());

        Self {
            config,
            source,
            monitor,
            committer,
            stream_lost: false,
            halted: true,
            photos_taken: 0,
        }
    }

    /// Begin motion sampling on the already streaming source.
    pub async fn begin(&mut self) {
        let facing = self.source.read().await.facing();
        info!("Capture session started with {} camera", facing);
        self.halted = false;
        self.monitor.start().await;
    }

    /// Stop motion sampling; the gate falls back to always approving.
    pub async fn halt(&mut self) {
        self.halted = true;
        self.monitor.stop().await;
        info!("Capture session halted after {} photo(s)", self.photos_taken);
    }

    /// Gate a capture request and, if approved, settle and commit the frame.
    pub async fn trigger_capture(&mut self) -> Result<CaptureOutcome> {
        let decision = self.monitor.estimator().read().await.evaluate_gate();

        let settle_delay = match decision {
            GateDecision::Rejected { average, threshold } => {
                warn!("Too much movement ({:.1} > {:.1}), hold the camera steady", average, threshold);
                return Ok(CaptureOutcome::TooMuchMotion { average, threshold });
            }
            GateDecision::Approved { settle_delay } => settle_delay,
        };

        sleep(settle_delay).await;

        let photo = {
            let mut source = self.source.write().await;
            if !source.is_ready() {
                warn!("Video not ready for capture");
                return Ok(CaptureOutcome::SourceNotReady);
            }

            let frame = source.grab_frame().context("Failed to grab frame for capture")?;
            if source.facing().is_mirrored() {
                imageops::flip_horizontal(&frame)
            } else {
                frame
            }
        };

        let path = self.committer.commit(photo).await?;
        self.photos_taken += 1;
        Ok(CaptureOutcome::Captured(path))
    }

    /// Flip between front and back camera, restarting motion sampling cold.
    pub async fn switch_facing(&mut self) -> Result<FacingMode> {
        self.monitor.stop().await;

        let (facing, live) = {
            let mut source = self.source.write().await;
            let facing = source.facing().toggled();
            source.set_facing(facing)
                .with_context(|| format!("Failed to switch to {} camera", facing))?;
            (facing, source.is_live())
        };
        info!("Switched to {} camera", facing);

        // Sampling resumes only on a live stream of a running session; a dead
        // stream is left for the watchdog to restore
        if !live {
            warn!("{} camera stream is not live, motion detection paused", facing);
            self.stream_lost = true;
        } else if !self.halted {
            self.monitor.start().await;
        }
        Ok(facing)
    }

    /// Watchdog check: pause sampling when the stream drops, resume when it returns.
    pub async fn check_stream(&mut self) -> SessionEvent {
        let live = self.source.read().await.is_live();

        if !live && !self.stream_lost {
            error!("Camera stream lost");
            self.stream_lost = true;
            self.monitor.stop().await;
            return SessionEvent::StreamLost;
        }

        if live && self.stream_lost {
            info!("Camera stream restored");
            self.stream_lost = false;
            if !self.halted {
                self.monitor.start().await;
            }
            return SessionEvent::StreamRestored;
        }

        SessionEvent::Healthy
    }

    /// Process trigger commands until `Stop` arrives or the input closes.
    pub async fn run(&mut self, controls: &mut dyn ControlInput) -> Result<()> {
        let mut watchdog = interval(self.config.timing.stream_check());
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        watchdog.tick().await;

        loop {
            tokio::select! {
                command = controls.next_command() => {
                    match command {
                        Some(ControlCommand::Capture) => match self.trigger_capture().await {
                            Ok(CaptureOutcome::Captured(path)) => info!("Captured {}", path.display()),
                            Ok(outcome) => info!("Capture skipped: {:?}", outcome),
                            Err(e) => error!("Capture failed: {:#}", e),
                        },
                        Some(ControlCommand::SwitchFacing) => {
                            if let Err(e) = self.switch_facing().await {
                                error!("{:#}", e);
                            }
                        }
                        Some(ControlCommand::Stop) | None => break,
                    }
                }
                _ = watchdog.tick() => {
                    self.check_stream().await;
                }
            }
        }

        self.halt().await;
        Ok(())
    }

    pub fn estimator(&self) -> &SharedEstimator {
        self.monitor.estimator()
    }

    pub fn source(&self) -> &SharedSource<S> {
        &self.source
    }

    pub fn committer(&self) -> &C {
        &self.committer
    }

    pub fn photos_taken(&self) -> usize {
        self.photos_taken
    }
}
