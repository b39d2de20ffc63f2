use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crate::transport::Transport;

/// Bits on the wire per character: start, 8 data, parity or second stop, stop.
const BITS_PER_CHAR: u64 = 11;

/// Floor for the inter-frame silence above 19200 baud.
const MIN_FRAME_GAP: Duration = Duration::from_micros(1750);

/// Lowest line speed the default gap tolerates.
const DEFAULT_GAP_BAUD_RATE: u32 = 1200;

/// Timing budgets for collecting a single response.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// How long to wait for the first byte.
    pub response: Duration,
    /// Ceiling, measured from the start of collection, once bytes are arriving.
    pub drain: Duration,
    /// Silence after the last byte that ends the frame.
    pub frame_gap: Duration,
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            response: Duration::from_secs(1),
            drain: Duration::from_secs(3),
            frame_gap: frame_gap_for(DEFAULT_GAP_BAUD_RATE),
            poll_interval: Duration::from_micros(50),
        }
    }
}

impl Timeouts {
    /// Default budgets with the frame gap set to 3.5 character times at `baud_rate`.
    pub fn for_baud_rate(baud_rate: u32) -> Self {
        Self::default().frame_gap(frame_gap_for(baud_rate))
    }

    pub fn response(mut self, response: Duration) -> Self {
        self.response = response;
        self
    }

    pub fn drain(mut self, drain: Duration) -> Self {
        self.drain = drain;
        self
    }

    pub fn frame_gap(mut self, frame_gap: Duration) -> Self {
        self.frame_gap = frame_gap;
        self
    }
}

/// 3.5 character times at `baud_rate`, never below 1.75 ms.
pub fn frame_gap_for(baud_rate: u32) -> Duration {
    let nanos = 3_500_000_000 * BITS_PER_CHAR / u64::from(baud_rate.max(1));
    Duration::from_nanos(nanos).max(MIN_FRAME_GAP)
}

/// Poll `transport` until a response has been drained or a budget runs out.
///
/// Returns whatever was accumulated, possibly nothing. Blocks the calling
/// thread for at most `timeouts.drain`.
pub fn collect<T: Transport + ?Sized>(transport: &mut T, timeouts: &Timeouts) -> io::Result<Vec<u8>> {
    let start = Instant::now();
    let mut buffer = Vec::new();
    let mut last_byte = start;

    loop {
        if buffer.is_empty() {
            if start.elapsed() >= timeouts.response {
                break;
            }
        } else if start.elapsed() >= timeouts.drain || last_byte.elapsed() >= timeouts.frame_gap {
            break;
        }

        match transport.read_byte()? {
            Some(byte) => {
                buffer.push(byte);
                last_byte = Instant::now();
            }
            None => thread::sleep(timeouts.poll_interval),
        }
    }

    Ok(buffer)
}
