use std::sync::Mutex;
use tokio::sync::mpsc;

/// Advisory stability signal derived from the rolling motion average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    Stable,
    Unstable,
}

impl Stability {
    pub fn is_unstable(self) -> bool {
        matches!(self, Stability::Unstable)
    }

    /// Text for the capture trigger.
    pub fn prompt(&self) -> &'static str {
        match self {
            Stability::Stable => "Take photo",
            Stability::Unstable => "Stabilizing...",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityReading {
    pub stability: Stability,
    pub average: f64,
}

/// Receives the stability signal at the end of every scored tick.
pub trait FeedbackSink: Send + Sync {
    fn on_stability(&self, stability: Stability, average: f64);
}

/// Forwards every reading over an unbounded channel.
pub struct ChannelFeedback {
    sender: mpsc::UnboundedSender<StabilityReading>,
}

impl ChannelFeedback {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StabilityReading>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl FeedbackSink for ChannelFeedback {
    fn on_stability(&self, stability: Stability, average: f64) {
        // Receiver gone means nobody is rendering; drop the reading
        let _ = self.sender.send(StabilityReading { stability, average });
    }
}

/// Logs transitions at info level and every reading at debug level.
pub struct LogFeedback {
    last: Mutex<Option<Stability>>,
}

impl LogFeedback {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }
}

impl Default for LogFeedback {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackSink for LogFeedback {
    fn on_stability(&self, stability: Stability, average: f64) {
        log::debug!("Motion average {:.2} -> {:?}", average, stability);

        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *last != Some(stability) {
            log::info!("{} (motion {:.2})", stability.prompt(), average);
            *last = Some(stability);
        }
    }
}
