use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::Sender;
use thiserror::Error;

use super::{PipelineEvent, frame::FrameReference};
use crate::types::{BodyFrame, DepthFrame, FrameDescription};

// How long the reader waits for an arrival before rechecking the stop flag.
const READER_POLL_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to open sensor: {0}")]
    Open(String),
}

pub enum SensorArrival {
    Depth(FrameReference<DepthFrame>),
    Body(FrameReference<BodyFrame>),
    AvailabilityChanged(bool),
}

impl From<SensorArrival> for PipelineEvent {
    fn from(arrival: SensorArrival) -> Self {
        match arrival {
            SensorArrival::Depth(reference) => PipelineEvent::DepthFrameArrived(reference),
            SensorArrival::Body(reference) => PipelineEvent::BodyFrameArrived(reference),
            SensorArrival::AvailabilityChanged(available) => {
                PipelineEvent::AvailabilityChanged(available)
            }
        }
    }
}

/// The body-sensing camera driver.
pub trait SensorDriver: Send + 'static {
    fn depth_description(&self) -> FrameDescription;
    fn open(&mut self) -> Result<(), SensorError>;
    fn is_available(&self) -> bool;
    /// Waits up to `timeout` for the next frame or availability change.
    fn next_arrival(&mut self, timeout: Duration) -> Option<SensorArrival>;
    fn close(&mut self);
}

/// An open sensor plus the reader thread forwarding its arrivals.
///
/// Closing stops the reader first and closes the sensor only after the
/// reader has let go of it.
#[derive(Debug)]
pub struct SensorSession {
    description: FrameDescription,
    available_at_open: bool,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SensorSession {
    pub fn open<D: SensorDriver>(
        mut driver: D,
        event_tx: Sender<PipelineEvent>,
    ) -> Result<Self, SensorError> {
        // Fail fast before spawning the reader thread.
        driver.open()?;
        let description = driver.depth_description();
        let available_at_open = driver.is_available();
        log::info!(
            "sensor open: depth {}x{}, available: {available_at_open}",
            description.width,
            description.height
        );

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                let Some(arrival) = driver.next_arrival(READER_POLL_TIMEOUT) else {
                    continue;
                };
                if event_tx.send(arrival.into()).is_err() {
                    log::debug!("pipeline gone, stopping sensor reader");
                    break;
                }
            }
            drop(event_tx);
            driver.close();
            log::info!("sensor closed");
        });

        Ok(Self {
            description,
            available_at_open,
            stop,
            handle: Some(handle),
        })
    }

    pub fn description(&self) -> FrameDescription {
        self.description
    }

    pub fn available_at_open(&self) -> bool {
        self.available_at_open
    }

    /// Releases the reader and closes the sensor. Safe to call more than
    /// once.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SensorSession {
    fn drop(&mut self) {
        self.close();
    }
}
