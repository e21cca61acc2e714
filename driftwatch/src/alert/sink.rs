//! Alert sinks - where dispatched alerts end up.

use tokio::sync::mpsc;

/// Platform audio / notification output.
///
/// Calls must return immediately; any actual playback happens elsewhere.
pub trait AlertSink: Send + Sync {
    /// Start playing `sound` at `volume`.
    fn play(&self, sound: &str, volume: f64, looping: bool);

    /// Silence every sound started by this sink.
    fn stop_all(&self) {}
}

/// Command emitted by [`ChannelAlertSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum AlertCommand {
    Play {
        sound: String,
        volume: f64,
        looping: bool,
    },
    StopAll,
}

/// Sink that forwards commands over an unbounded channel.
///
/// The receiving side owns the audio device. A dropped receiver turns
/// every call into a no-op.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    tx: mpsc::UnboundedSender<AlertCommand>,
}

impl ChannelAlertSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AlertCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AlertSink for ChannelAlertSink {
    fn play(&self, sound: &str, volume: f64, looping: bool) {
        let _ = self.tx.send(AlertCommand::Play {
            sound: sound.to_string(),
            volume,
            looping,
        });
    }

    fn stop_all(&self) {
        let _ = self.tx.send(AlertCommand::StopAll);
    }
}
