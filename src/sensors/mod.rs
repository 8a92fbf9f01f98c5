pub mod line;
pub mod serial;

use std::collections::VecDeque;

use thiserror::Error;

pub use line::{LINE_CAPACITY, LineAssembler, parse_float_prefix};
pub use serial::SerialPort;

#[derive(Debug, Error)]
pub enum SensorError {
    /// The device could not be opened at all
    #[error("can't open port {device}: {source}")]
    OpenFailed {
        device: String,
        #[source]
        source: std::io::Error,
    },

    /// The requested line speed has no platform equivalent
    #[error("unsupported baud rate {baud_rate} for {device}")]
    UnsupportedBaudRate { device: String, baud_rate: u32 },
}

/// Non-blocking supply of raw bytes from a sensor.
///
/// Implementations never block for long and never fail: a device error, an
/// end of stream and "nothing yet" all read as zero bytes. The driver cannot
/// tell a disconnected sensor from a quiet one.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes into `buf`, returning how many arrived.
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }
}

/// A queue of pending bytes, drained front to back. Handy for replaying a
/// captured stream.
impl ByteSource for VecDeque<u8> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.len());
        for (slot, byte) in buf.iter_mut().zip(self.drain(..n)) {
            *slot = byte;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_source_drains_in_order() {
        let mut source: VecDeque<u8> = b"12\n".iter().copied().collect();
        let mut buf = [0u8; 2];

        assert_eq!(source.read(&mut buf), 2);
        assert_eq!(&buf, b"12");
        assert_eq!(source.read(&mut buf), 1);
        assert_eq!(buf[0], b'\n');
        assert_eq!(source.read(&mut buf), 0);
    }
}
