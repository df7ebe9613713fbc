mod config;
mod pipeline;
mod sim;
mod status;
mod types;

use std::{
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use config::DemoOptions;
use crossbeam_channel::unbounded;
use pipeline::{EngineBinding, Pipeline, PipelineEvent, SensorSession, start_gesture_engine};
use sim::{SimulatedGestureEngine, SimulatedPlayer, SimulatedSensor, SnapshotSurface};

const DEMO_MEDIA_LENGTH: Duration = Duration::from_secs(180);

fn main() -> Result<()> {
    env_logger::init();

    let options = DemoOptions::parse();
    let config = options.pipeline_config();
    let frame_interval = options.frame_interval();
    let (event_tx, event_rx) = unbounded();

    let mut session = SensorSession::open(SimulatedSensor::new(frame_interval), event_tx.clone())
        .context("failed to open sensor")?;
    let description = session.description();

    let binding = EngineBinding::default();
    let mut engine = start_gesture_engine(
        SimulatedGestureEngine::demo(),
        binding.clone(),
        frame_interval,
        event_tx.clone(),
    );

    let mut pipeline = Pipeline::new(
        &config,
        description,
        SimulatedPlayer::new(DEMO_MEDIA_LENGTH),
        SnapshotSurface::new(description),
        binding,
        Instant::now(),
    );
    let status_rx = pipeline.status_mut().subscribe();
    let status_printer = thread::spawn(move || {
        for text in status_rx.iter() {
            println!("status: {text}");
        }
    });
    pipeline.sensor_opened(session.available_at_open());

    let run_for = frame_interval * u32::try_from(options.frames).unwrap_or(u32::MAX);
    let stopper = thread::spawn(move || {
        thread::sleep(run_for);
        let _ = event_tx.send(PipelineEvent::Shutdown);
    });

    pipeline.run(&event_rx);

    // Engine first, then the sensor readers, then the sensor itself.
    engine.stop();
    session.close();
    let _ = stopper.join();

    if let Some(path) = &options.snapshot {
        pipeline.surface().save_png(path)?;
    }
    log::info!("final status: {}", pipeline.status());
    log::info!("final stats: {:?}", pipeline.stats());
    log::info!("final playback state: {:?}", pipeline.player().state());

    drop(pipeline);
    let _ = status_printer.join();
    Ok(())
}
