//! Motion estimator and capture gate.
//!
//! Each tick draws the live source into a small raster, scores it against the
//! previous raster, and pushes the score into a short FIFO history. The mean
//! of that history drives two independent thresholds: a low visual one for the
//! stability indicator and a looser one that actually blocks captures.

use log::{debug, info, trace, warn};
use std::time::Duration;

use crate::config::{Config, MotionConfig};
use crate::error::CaptureError;
use crate::feedback::{FeedbackSink, Stability};
use crate::frame::{FrameSample, Sampling};
use crate::history::MotionHistory;
use crate::source::VideoSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorState {
    Inactive,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionReading {
    pub score: f64,
    pub average: f64,
    pub stability: Stability,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The estimator is stopped; nothing was sampled
    Inactive,
    /// The source has no frame yet; retry after the backoff
    NotReady,
    /// The stream dropped; retry after the backoff until the watchdog stops sampling
    SourceLost,
    /// First raster of an activation was stored, no score yet
    Primed,
    Scored(MotionReading),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    /// Capture may proceed after waiting `settle_delay`
    Approved { settle_delay: Duration },
    /// Too much recent motion
    Rejected { average: f64, threshold: f64 },
}

impl GateDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, GateDecision::Approved { .. })
    }
}

pub struct MotionEstimator {
    config: MotionConfig,
    sampling: Sampling,
    settle_delay: Duration,
    state: EstimatorState,
    epoch: u64,
    previous: Option<FrameSample>,
    history: MotionHistory,
    loss_reported: bool,
}

impl MotionEstimator {
    pub fn new(config: &Config) -> Self {
        Self::with_settings(config.motion.clone(), config.timing.settle_delay())
    }

    pub fn with_settings(config: MotionConfig, settle_delay: Duration) -> Self {
        Self {
            sampling: Sampling::from(&config),
            history: MotionHistory::new(config.history_capacity),
            config,
            settle_delay,
            state: EstimatorState::Inactive,
            epoch: 0,
            previous: None,
            loss_reported: false,
        }
    }

    /// Activate sampling. Returns `false` when already active.
    pub fn start(&mut self) -> bool {
        if self.state == EstimatorState::Active {
            debug!("Motion estimator already active (epoch {})", self.epoch);
            return false;
        }

        self.previous = None;
        self.history.clear();
        self.loss_reported = false;
        self.state = EstimatorState::Active;
        self.epoch += 1;
        info!("Motion estimator started (epoch {})", self.epoch);
        true
    }

    /// Deactivate and forget all motion state so the next start begins cold.
    pub fn stop(&mut self) {
        if self.state == EstimatorState::Active {
            info!("Motion estimator stopped (epoch {})", self.epoch);
        }
        self.state = EstimatorState::Inactive;
        self.previous = None;
        self.history.clear();
    }

    pub fn state(&self) -> EstimatorState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == EstimatorState::Active
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True while the activation identified by `epoch` is still running.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.is_active() && self.epoch == epoch
    }

    /// Whether this activation already logged a lost stream.
    pub fn loss_reported(&self) -> bool {
        self.loss_reported
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    pub fn history(&self) -> &MotionHistory {
        &self.history
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn rolling_average(&self) -> Option<f64> {
        self.history.mean()
    }

    /// Sample the source once and update the motion history.
    pub fn tick(&mut self, source: &mut dyn VideoSource, sink: &dyn FeedbackSink) -> TickOutcome {
        if !self.is_active() {
            return TickOutcome::Inactive;
        }

        if !source.is_ready() {
            trace!("Video source not ready, backing off");
            return TickOutcome::NotReady;
        }

        let raster = match source.draw_into(self.config.raster_width, self.config.raster_height) {
            Ok(raster) => raster,
            Err(CaptureError::SourceLost) => {
                if !self.loss_reported {
                    warn!("Video stream lost, motion sampling waits for it to return");
                    self.loss_reported = true;
                }
                return TickOutcome::SourceLost;
            }
            Err(e) => {
                warn!("Skipping motion sample: {}", e);
                return TickOutcome::NotReady;
            }
        };
        let current = FrameSample::new(raster);

        let outcome = match self.previous.take() {
            Some(previous) => {
                let score = current.motion_since(&previous, &self.sampling);
                self.history.push(score);
                let average = self.history.mean().unwrap_or(score);
                let stability = self.stability_for(average);
                sink.on_stability(stability, average);

                trace!("Motion score {:.2}, average {:.2}", score, average);
                TickOutcome::Scored(MotionReading { score, average, stability })
            }
            None => TickOutcome::Primed,
        };

        self.previous = Some(current);
        outcome
    }

    pub fn stability_for(&self, average: f64) -> Stability {
        if average > self.config.visual_threshold() {
            Stability::Unstable
        } else {
            Stability::Stable
        }
    }

    /// Decide whether a capture may proceed. Never mutates the history.
    pub fn evaluate_gate(&self) -> GateDecision {
        let approved = GateDecision::Approved { settle_delay: self.settle_delay };

        if self.history.len() < self.config.min_history_for_gate {
            return approved;
        }

        let Some(average) = self.history.mean() else {
            return approved;
        };
        let threshold = self.config.block_threshold();

        if average > threshold {
            debug!("Capture gated: motion {:.2} above {:.2}", average, threshold);
            GateDecision::Rejected { average, threshold }
        } else {
            approved
        }
    }

    #[cfg(test)]
    pub(crate) fn seed_history(&mut self, scores: &[f64]) {
        for &score in scores {
            self.history.push(score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureResult;
    use crate::feedback::ChannelFeedback;
    use crate::frame::solid_raster;
    use crate::source::{FacingMode, SyntheticCamera};
    use image::{RgbImage, RgbaImage};
    use std::collections::VecDeque;

    /// Replays a fixed list of solid grey levels; `None` entries report unready.
    struct ScriptedSource {
        frames: VecDeque<Option<u8>>,
        ready: bool,
    }

    impl ScriptedSource {
        fn new(levels: &[Option<u8>]) -> Self {
            let mut source = Self { frames: levels.iter().copied().collect(), ready: true };
            source.ready = matches!(source.frames.front(), Some(Some(_)));
            source
        }

        fn advance(&mut self) -> Option<u8> {
            let level = self.frames.pop_front().flatten();
            self.ready = matches!(self.frames.front(), Some(Some(_)));
            level
        }
    }

    impl VideoSource for ScriptedSource {
        fn dimensions(&self) -> (u32, u32) {
            if self.ready { (640, 480) } else { (0, 0) }
        }

        fn draw_into(&mut self, width: u32, height: u32) -> CaptureResult<RgbaImage> {
            match self.advance() {
                Some(level) => Ok(solid_raster(width, height, [level, level, level])),
                None => Err(CaptureError::SourceNotReady),
            }
        }

        fn grab_frame(&mut self) -> CaptureResult<RgbImage> {
            Err(CaptureError::SourceNotReady)
        }

        fn is_live(&self) -> bool {
            true
        }

        fn facing(&self) -> FacingMode {
            FacingMode::Environment
        }

        fn set_facing(&mut self, _facing: FacingMode) -> CaptureResult<()> {
            Ok(())
        }
    }

    fn estimator() -> MotionEstimator {
        MotionEstimator::new(&Config::default())
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut est = estimator();
        assert!(est.start());
        assert!(!est.start());
        assert_eq!(est.epoch(), 1);
        assert!(est.is_current(1));
    }

    #[test]
    fn test_inactive_tick_does_nothing() {
        let mut est = estimator();
        let mut source = ScriptedSource::new(&[Some(0), Some(255)]);
        let (sink, _rx) = ChannelFeedback::new();
        assert_eq!(est.tick(&mut source, &sink), TickOutcome::Inactive);
        assert!(!est.has_previous());
    }

    #[test]
    fn test_first_tick_primes_then_scores() {
        let mut est = estimator();
        est.start();
        let mut source = ScriptedSource::new(&[Some(0), Some(0), Some(255)]);
        let (sink, mut rx) = ChannelFeedback::new();

        assert_eq!(est.tick(&mut source, &sink), TickOutcome::Primed);
        assert!(est.history().is_empty());

        match est.tick(&mut source, &sink) {
            TickOutcome::Scored(reading) => {
                assert_eq!(reading.score, 0.0);
                assert_eq!(reading.stability, Stability::Stable);
            }
            other => panic!("expected a score, got {:?}", other),
        }

        match est.tick(&mut source, &sink) {
            TickOutcome::Scored(reading) => {
                assert_eq!(reading.score, 765.0);
                assert_eq!(reading.average, 382.5);
                assert_eq!(reading.stability, Stability::Unstable);
            }
            other => panic!("expected a score, got {:?}", other),
        }

        assert_eq!(rx.try_recv().unwrap().stability, Stability::Stable);
        assert_eq!(rx.try_recv().unwrap().stability, Stability::Unstable);
    }

    #[test]
    fn test_unready_source_records_nothing() {
        let mut est = estimator();
        est.start();
        let mut source = ScriptedSource::new(&[None, Some(10)]);
        let (sink, _rx) = ChannelFeedback::new();

        assert_eq!(est.tick(&mut source, &sink), TickOutcome::NotReady);
        assert!(!est.has_previous());
        assert!(est.history().is_empty());
    }

    #[test]
    fn test_lost_stream_is_reported_once_per_activation() {
        let mut est = estimator();
        est.start();
        let mut camera = SyntheticCamera::new(64, 48);
        camera.set_live(false);
        let (sink, _rx) = ChannelFeedback::new();

        assert_eq!(est.tick(&mut camera, &sink), TickOutcome::SourceLost);
        assert!(est.loss_reported());
        assert_eq!(est.tick(&mut camera, &sink), TickOutcome::SourceLost);
        assert!(est.history().is_empty());
        assert!(!est.has_previous());

        est.stop();
        est.start();
        assert!(!est.loss_reported());

        camera.set_live(true);
        assert_eq!(est.tick(&mut camera, &sink), TickOutcome::Primed);
        assert!(!est.loss_reported());
    }

    #[test]
    fn test_history_never_exceeds_capacity() {
        let mut est = estimator();
        est.start();
        let levels: Vec<Option<u8>> = (0..20).map(|i| Some((i * 10) as u8)).collect();
        let mut source = ScriptedSource::new(&levels);
        let (sink, _rx) = ChannelFeedback::new();

        for _ in 0..20 {
            est.tick(&mut source, &sink);
            assert!(est.history().len() <= est.history().capacity());
        }
        assert_eq!(est.history().len(), 6);
    }

    #[test]
    fn test_gate_approves_with_short_history() {
        let mut est = estimator();
        est.start();
        est.seed_history(&[1000.0]);
        assert!(est.evaluate_gate().is_approved());
    }

    #[test]
    fn test_gate_rejects_excessive_motion() {
        let mut est = estimator();
        est.start();
        est.seed_history(&[200.0, 210.0, 195.0, 205.0]);

        match est.evaluate_gate() {
            GateDecision::Rejected { average, threshold } => {
                assert_eq!(average, 202.5);
                assert_eq!(threshold, 160.0);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        // Rejection leaves the history untouched
        assert_eq!(est.history().len(), 4);
    }

    #[test]
    fn test_gate_approves_calm_scene_with_settle_delay() {
        let mut est = estimator();
        est.start();
        est.seed_history(&[10.0, 12.0, 9.0, 11.0]);
        assert_eq!(
            est.evaluate_gate(),
            GateDecision::Approved { settle_delay: Duration::from_millis(200) }
        );
    }

    #[test]
    fn test_gate_boundary_is_inclusive() {
        let mut est = estimator();
        est.start();
        est.seed_history(&[160.0, 160.0, 160.0, 160.0]);
        assert!(est.evaluate_gate().is_approved());
    }

    #[test]
    fn test_visual_threshold() {
        let est = estimator();
        assert_eq!(est.stability_for(87.0), Stability::Stable);
        assert_eq!(est.stability_for(88.0), Stability::Stable);
        assert_eq!(est.stability_for(89.0), Stability::Unstable);
    }

    #[test]
    fn test_restart_begins_cold() {
        let mut est = estimator();
        est.start();
        let mut source = ScriptedSource::new(&[Some(0), Some(200), Some(0), Some(50)]);
        let (sink, _rx) = ChannelFeedback::new();

        est.tick(&mut source, &sink);
        est.tick(&mut source, &sink);
        assert_eq!(est.history().len(), 1);

        est.stop();
        assert!(est.history().is_empty());
        assert!(!est.has_previous());

        assert!(est.start());
        assert_eq!(est.epoch(), 2);
        assert!(!est.is_current(1));
        assert_eq!(est.tick(&mut source, &sink), TickOutcome::Primed);
        assert!(est.history().is_empty());
    }
}
