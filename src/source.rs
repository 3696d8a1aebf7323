//! Byte sources feeding the frame reader.
//!
//! The decoder only ever needs one byte at a time, so a source is anything
//! that can hand out the next byte, report a timeout or disconnect, and be
//! closed. Serial devices and replay files both go through [`ReaderSource`].

use std::io::{self, BufReader, Read};
use std::time::Duration;

use thiserror::Error;

/// Default baud rate for NMEA-0183 receivers.
pub const DEFAULT_BAUD_RATE: u32 = 4800;

/// Default per-read timeout of the serial transport.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Errors raised by a byte source.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("read timed out")]
    Timeout,

    #[error("byte source closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Returns true if the source will never yield another byte.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

/// A blocking source of bytes.
pub trait ByteSource {
    /// Block until the next byte is available.
    fn read_byte(&mut self) -> Result<u8, TransportError>;

    /// Release the underlying transport. Later reads return [`TransportError::Closed`].
    fn close(&mut self);
}

impl<B: ByteSource + ?Sized> ByteSource for Box<B> {
    fn read_byte(&mut self) -> Result<u8, TransportError> {
        (**self).read_byte()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// A [`ByteSource`] over any [`Read`] implementation.
pub struct ReaderSource<R> {
    reader: Option<BufReader<R>>,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(BufReader::new(reader)),
        }
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_byte(&mut self) -> Result<u8, TransportError> {
        let reader = self.reader.as_mut().ok_or(TransportError::Closed)?;
        let mut byte = [0u8; 1];

        loop {
            match reader.read(&mut byte) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(_) => return Ok(byte[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    return Err(TransportError::Timeout);
                }
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

/// A serial GPS device.
pub type SerialSource = ReaderSource<Box<dyn serialport::SerialPort>>;

/// Open a serial device as a byte source.
pub fn open_serial(
    path: &str,
    baud_rate: u32,
    timeout: Duration,
) -> serialport::Result<SerialSource> {
    let port = serialport::new(path, baud_rate).timeout(timeout).open()?;
    Ok(ReaderSource::new(port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct TimingOut;

    impl Read for TimingOut {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
        }
    }

    #[test]
    fn test_reads_bytes_then_closes() {
        let mut source = ReaderSource::new(Cursor::new(b"$G".to_vec()));

        assert_eq!(source.read_byte().unwrap(), b'$');
        assert_eq!(source.read_byte().unwrap(), b'G');

        let err = source.read_byte().unwrap_err();
        assert!(err.is_disconnect());
    }

    #[test]
    fn test_timeout_is_not_a_disconnect() {
        let mut source = ReaderSource::new(TimingOut);
        let err = source.read_byte().unwrap_err();

        assert!(matches!(err, TransportError::Timeout));
        assert!(!err.is_disconnect());
    }

    #[test]
    fn test_close_stops_reads() {
        let mut source = ReaderSource::new(Cursor::new(b"$GPGGA".to_vec()));
        source.close();

        assert!(matches!(source.read_byte(), Err(TransportError::Closed)));
    }
}
