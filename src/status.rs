use crossbeam_channel::{Receiver, Sender, unbounded};

pub const RUNNING_STATUS_TEXT: &str = "Running";
pub const NO_SENSOR_STATUS_TEXT: &str = "No ready Kinect found!";
pub const SENSOR_NOT_AVAILABLE_STATUS_TEXT: &str = "Kinect not available!";

/// Observable status line shown by the presentation layer.
#[derive(Debug, Default)]
pub struct StatusText {
    value: String,
    subscribers: Vec<Sender<String>>,
}

impl StatusText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> &str {
        &self.value
    }

    /// Every later change is delivered on the returned channel.
    pub fn subscribe(&mut self) -> Receiver<String> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Updates the text and notifies subscribers. Setting the current value
    /// again is a no-op and returns false.
    pub fn set(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.value == text {
            return false;
        }
        self.value = text;
        let value = &self.value;
        self.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
        true
    }
}
