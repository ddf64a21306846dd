// Command transports: where command symbols come from.
//
// Sources are polled once per tick and must never block. A burst collapses to
// its last recognized symbol, so at most one maneuver change happens per tick.

mod network;
mod serial;

pub use network::ZenohCommandSource;
pub use serial::SerialCommandSource;

use crate::interpreter::Command;

/// Non-blocking supplier of raw command symbols
pub trait CommandSource {
    /// Symbols received since the last poll, oldest first
    fn poll(&mut self) -> Vec<u8>;
}

/// Last recognized symbol in a burst. Strafe symbols only count when `extended`.
pub fn coalesce(symbols: &[u8], extended: bool) -> Option<u8> {
    symbols.iter().rev().copied().find(|&symbol| {
        Command::from_symbol(symbol).is_some_and(|command| extended || !command.is_extended())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_keeps_last_symbol() {
        assert_eq!(coalesce(b"ffrb", false), Some(b'b'));
        assert_eq!(coalesce(b"s", false), Some(b's'));
    }

    #[test]
    fn test_trailing_noise_does_not_mask_command() {
        // Serial terminals append line endings
        assert_eq!(coalesce(b"l\r\n", false), Some(b'l'));
    }

    #[test]
    fn test_empty_or_noise_only() {
        assert_eq!(coalesce(b"", false), None);
        assert_eq!(coalesce(b"xyz\n", false), None);
    }

    #[test]
    fn test_strafe_symbols_need_extended_set() {
        assert_eq!(coalesce(b"fq", false), Some(b'f'));
        assert_eq!(coalesce(b"fq", true), Some(b'q'));
    }
}
