use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    Capture = 1,
    SwitchFacing = 2,
    Stop = 3,
}

impl ControlCommand {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(ControlCommand::Capture),
            2 => Some(ControlCommand::SwitchFacing),
            3 => Some(ControlCommand::Stop),
            _ => None,
        }
    }

    /// Keyboard shortcut used by the interactive demo.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim() {
            "c" | "" => Some(ControlCommand::Capture),
            "f" => Some(ControlCommand::SwitchFacing),
            "q" => Some(ControlCommand::Stop),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ControlCommand::Capture => "Take photo",
            ControlCommand::SwitchFacing => "Switch camera",
            ControlCommand::Stop => "Stop capture",
        }
    }
}

/// Trigger input feeding a capture session.
#[async_trait::async_trait]
pub trait ControlInput: Send {
    async fn next_command(&mut self) -> Option<ControlCommand>;
}

/// In-process trigger panel. Clones share one queue; capture presses inside
/// the debounce window are dropped.
#[derive(Clone)]
pub struct ControlPanel {
    sender: mpsc::UnboundedSender<u8>,
    receiver: Arc<RwLock<mpsc::UnboundedReceiver<u8>>>,
    last_press_times: Arc<RwLock<HashMap<u8, Instant>>>,
    debounce_duration: Duration,
}

impl ControlPanel {
    pub fn new(debounce_duration: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(RwLock::new(receiver)),
            last_press_times: Arc::new(RwLock::new(HashMap::new())),
            debounce_duration,
        }
    }

    /// Queue a command. Returns `false` when it was swallowed by the debounce.
    pub async fn press(&self, command: ControlCommand) -> Result<bool> {
        let id = command as u8;
        let now = Instant::now();

        if command == ControlCommand::Capture {
            let mut times = self.last_press_times.write().await;
            if let Some(&last_time) = times.get(&id) {
                if now.duration_since(last_time) < self.debounce_duration {
                    debug!("Ignoring repeated {} press", command.description());
                    return Ok(false);
                }
            }
            times.insert(id, now);
        }

        self.sender.send(id)
            .context("Failed to queue control command")?;
        info!("Control pressed: {}", command.description());
        Ok(true)
    }

    pub async fn try_next(&self) -> Option<ControlCommand> {
        let mut receiver = self.receiver.write().await;
        receiver.try_recv().ok().and_then(ControlCommand::from_id)
    }
}

#[async_trait::async_trait]
impl ControlInput for ControlPanel {
    async fn next_command(&mut self) -> Option<ControlCommand> {
        let mut receiver = self.receiver.write().await;
        loop {
            let id = receiver.recv().await?;
            if let Some(command) = ControlCommand::from_id(id) {
                return Some(command);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_from_id() {
        assert_eq!(ControlCommand::from_id(1), Some(ControlCommand::Capture));
        assert_eq!(ControlCommand::from_id(3), Some(ControlCommand::Stop));
        assert!(ControlCommand::from_id(0).is_none());
        assert!(ControlCommand::from_id(4).is_none());
    }

    #[test]
    fn test_command_from_key() {
        assert_eq!(ControlCommand::from_key("f\n"), Some(ControlCommand::SwitchFacing));
        assert_eq!(ControlCommand::from_key(""), Some(ControlCommand::Capture));
        assert!(ControlCommand::from_key("x").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_presses_are_debounced() {
        let panel = ControlPanel::new(Duration::from_millis(200));

        assert!(panel.press(ControlCommand::Capture).await.unwrap());
        assert!(!panel.press(ControlCommand::Capture).await.unwrap());

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(panel.press(ControlCommand::Capture).await.unwrap());

        assert_eq!(panel.try_next().await, Some(ControlCommand::Capture));
        assert_eq!(panel.try_next().await, Some(ControlCommand::Capture));
        assert_eq!(panel.try_next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_presses_are_not_debounced() {
        let panel = ControlPanel::new(Duration::from_millis(200));

        assert!(panel.press(ControlCommand::SwitchFacing).await.unwrap());
        assert!(panel.press(ControlCommand::SwitchFacing).await.unwrap());
        assert!(panel.press(ControlCommand::Stop).await.unwrap());

        assert_eq!(panel.try_next().await, Some(ControlCommand::SwitchFacing));
        assert_eq!(panel.try_next().await, Some(ControlCommand::SwitchFacing));
        assert_eq!(panel.try_next().await, Some(ControlCommand::Stop));
        assert_eq!(panel.try_next().await, None);
    }

    #[tokio::test]
    async fn test_clones_share_queue() {
        let mut panel = ControlPanel::new(Duration::from_millis(200));
        let remote = panel.clone();

        remote.press(ControlCommand::Stop).await.unwrap();
        assert_eq!(panel.next_command().await, Some(ControlCommand::Stop));
    }
}
