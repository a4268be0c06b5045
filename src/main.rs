use anyhow::{Context, Result};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;

use steadyshot::{
    CaptureSession, Config, ControlCommand, ControlPanel, DirectoryCommitter, FeedbackSink,
    LogFeedback, SharedSource, SyntheticCamera,
};

const DEMO_SHAKE_PX: u32 = 16;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("📷 Starting steadyshot capture session");

    let config = Config::load()?;
    config.create_directories()?;
    info!(
        "Motion thresholds: indicator {:.1}, capture block {:.1}",
        config.motion.visual_threshold(),
        config.motion.block_threshold()
    );

    // No device camera binding yet; the synthetic camera stands in
    let camera: SharedSource<SyntheticCamera> = Arc::new(RwLock::new(SyntheticCamera::new(1280, 720)));
    let committer = DirectoryCommitter::new(&config.output.photo_dir, config.output.jpeg_quality);
    let sink: Arc<dyn FeedbackSink> = Arc::new(LogFeedback::new());
    let mut panel = ControlPanel::new(config.timing.capture_debounce());

    let mut session = CaptureSession::new(config, Arc::clone(&camera), committer, sink);

    let keyboard_panel = panel.clone();
    tokio::spawn(async move {
        if let Err(e) = read_keyboard(keyboard_panel, camera).await {
            error!("Keyboard input failed: {:#}", e);
        }
    });

    session.begin().await;
    session.run(&mut panel).await?;

    info!("Session finished with {} photo(s)", session.photos_taken());
    Ok(())
}

async fn read_keyboard(panel: ControlPanel, camera: SharedSource<SyntheticCamera>) -> Result<()> {
    info!("Keyboard controls:");
    info!("  c / Enter: Take photo");
    info!("  f: Switch camera");
    info!("  k: Toggle simulated hand shake");
    info!("  q: Quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
        if line.trim() == "k" {
            let mut camera = camera.write().await;
            let shake = if camera.shake() == 0 { DEMO_SHAKE_PX } else { 0 };
            camera.set_shake(shake);
            info!("Simulated shake {}", if shake > 0 { "on" } else { "off" });
            continue;
        }

        match ControlCommand::from_key(&line) {
            Some(ControlCommand::Stop) => break,
            Some(command) => {
                panel.press(command).await?;
            }
            None => warn!("Unknown key: {}", line.trim()),
        }
    }

    // Quit key or closed stdin both end the session
    panel.press(ControlCommand::Stop).await?;
    Ok(())
}
