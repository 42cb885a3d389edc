//! Application entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (defaults on first run or on error).
//! 3. Create the tokio runtime (multi-thread, 2 workers).
//! 4. Probe the capture device; without one there is nothing to do.
//! 5. Spawn one control loop per configured actuator.
//! 6. Build the playback coordinator, job client and task registry.
//! 7. Start the switch bridge and its keyboard listener.
//! 8. Run the orchestrator until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use jellyfish::{
    audio::{CpalCapture, CpalPlayback},
    config::{AppConfig, AppPaths},
    hardware::{FixedSensor, LogActuator, LogLed},
    motion::ActuatorController,
    orchestrator::{Orchestrator, OrchestratorSettings, PlaybackCoordinator},
    switch::{self, parse_key, KeyboardSwitch},
    tasks::{HttpJobApi, TaskRegistry},
};

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("jellyfish starting up");

    // 2. Configuration
    let paths = AppPaths::new();
    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Capture device
    let capture = CpalCapture::from_config(&config.recording);
    let device = capture.probe().context("no usable audio input")?;
    info!("Audio input: {device}");

    // 5. Actuators
    let mut actuators = Vec::with_capacity(config.actuators.len());
    for actuator in &config.actuators {
        let driver = Box::new(LogActuator::new(actuator.name.clone()));
        let controller = ActuatorController::spawn(actuator, config.motion.tick_hz, driver)
            .with_context(|| format!("failed to start actuator {}", actuator.name))?;
        actuators.push(controller);
    }

    // 6. Playback and jobs
    let playback = PlaybackCoordinator::from_config(
        &config,
        Arc::new(CpalPlayback::new()),
        Box::new(LogLed::new()),
        actuators,
    );
    let registry = Arc::new(
        TaskRegistry::new(Arc::new(HttpJobApi::from_config(&config.api)))
            .with_limit(config.api.max_tracked_tasks),
    );
    info!("Job service: {}", config.api.base_url);

    // 7. Switch
    let (bridge, events) = switch::channel(
        config.switch.queue_capacity,
        std::time::Duration::from_millis(config.switch.debounce_ms),
    );
    let key = parse_key(&config.switch.key).unwrap_or_else(|| {
        warn!("Unknown switch key {:?}; using Space", config.switch.key);
        rdev::Key::Space
    });
    let _switch = KeyboardSwitch::start(key, bridge).context("failed to start switch listener")?;

    // 8. Orchestrator
    let recordings_dir = config.recordings_dir(&paths);
    std::fs::create_dir_all(&recordings_dir)
        .with_context(|| format!("cannot create {}", recordings_dir.display()))?;

    let orchestrator = Orchestrator::new(
        OrchestratorSettings::from_config(&config, recordings_dir),
        Arc::new(capture),
        Arc::new(FixedSensor::new(config.sensors)),
        registry,
        Arc::new(playback),
    );

    rt.block_on(orchestrator.run(events, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable ({e}); running until the switch closes");
            std::future::pending::<()>().await;
        }
    }));

    info!("jellyfish stopped");
    Ok(())
}
