//! Serial channel and clock abstractions.
//!
//! The link logic only needs a non-blocking byte pipe and a monotonic
//! millisecond clock, so both are traits. Implementations exist for std
//! streams here and for a scripted test double in [`crate::testing`].

use std::io::{self, ErrorKind, Read, Write};
use std::time::{Duration, Instant};

/// Upper bound on reads performed by the default [`SerialPort::clear_input`].
const MAX_CLEAR_READS: usize = 64;

/// Byte-level access to the UART connected to the module.
pub trait SerialPort {
    /// Write every byte, blocking until the transmit side accepted them.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read whatever bytes are ready without blocking.
    ///
    /// Returns `Ok(0)` when nothing is available yet.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Discard bytes already waiting on the receive side.
    fn clear_input(&mut self) -> io::Result<()> {
        let mut scratch = [0u8; 64];
        for _ in 0..MAX_CLEAR_READS {
            if self.read_available(&mut scratch)? == 0 {
                break;
            }
        }
        Ok(())
    }
}

/// Monotonic millisecond clock used for every deadline.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;

    /// Pause the caller for roughly `ms` milliseconds.
    fn sleep_ms(&self, ms: u64);
}

/// [`Clock`] backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn sleep_ms(&self, ms: u64) {
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms));
        }
    }
}

/// [`SerialPort`] over any std stream, e.g. a tty opened in non-blocking mode
/// or a `TcpStream` to a serial bridge with a short read timeout.
///
/// `WouldBlock`, `TimedOut` and `Interrupted` reads count as "no bytes yet".
#[derive(Debug)]
pub struct IoSerial<T> {
    inner: T,
}

impl<T> IoSerial<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write> SerialPort for IoSerial<T> {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.inner.flush()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Stream that fails every read with the configured kind.
    struct Failing(ErrorKind);

    impl Read for Failing {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(self.0, "failing"))
        }
    }

    impl Write for Failing {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_io_serial_reads_bytes() {
        let mut serial = IoSerial::new(Cursor::new(b"OK\r\n".to_vec()));
        let mut buf = [0u8; 16];

        assert_eq!(serial.read_available(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"OK\r\n");
        assert_eq!(serial.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_io_serial_would_block_is_empty_read() {
        let mut serial = IoSerial::new(Failing(ErrorKind::WouldBlock));
        let mut buf = [0u8; 8];
        assert_eq!(serial.read_available(&mut buf).unwrap(), 0);

        let mut serial = IoSerial::new(Failing(ErrorKind::TimedOut));
        assert_eq!(serial.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_io_serial_propagates_real_errors() {
        let mut serial = IoSerial::new(Failing(ErrorKind::BrokenPipe));
        let mut buf = [0u8; 8];
        let err = serial.read_available(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_io_serial_write() {
        let mut serial = IoSerial::new(Cursor::new(Vec::new()));
        serial.write_all(b"AT\r\n").unwrap();
        assert_eq!(serial.into_inner().into_inner(), b"AT\r\n");
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now_ms();
        clock.sleep_ms(2);
        assert!(clock.now_ms() >= first);
    }
}
