// JSON drive commands over Zenoh

use tracing::{debug, warn};
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::Subscriber;
use zenoh::sample::Sample;

use super::CommandSource;
use crate::messages::DriveCommand;

pub struct ZenohCommandSource {
    subscriber: Subscriber<FifoChannelHandler<Sample>>,
}

impl ZenohCommandSource {
    pub fn new(subscriber: Subscriber<FifoChannelHandler<Sample>>) -> Self {
        Self { subscriber }
    }
}

/// Parse one payload into a command symbol. Malformed payloads are logged and dropped.
pub fn parse_payload(payload: &[u8]) -> Option<u8> {
    match serde_json::from_slice::<DriveCommand>(payload) {
        Ok(cmd) => {
            debug!("Parsed drive command: {:?}", cmd);
            Some(cmd.symbol())
        }
        Err(e) => {
            warn!("Failed to parse command: {}", e);
            None
        }
    }
}

impl CommandSource for ZenohCommandSource {
    fn poll(&mut self) -> Vec<u8> {
        let mut symbols = Vec::new();
        // Drain all pending samples (non-blocking)
        while let Ok(Some(sample)) = self.subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            symbols.extend(parse_payload(&payload));
        }
        symbols
    }
}
