use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Identifier the host event loop uses to watch a transport for readability.
pub type SourceId = i32;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport is not open")]
    NotOpen,

    #[error("Transport closed by the device")]
    Closed,

    #[error("Device accepted no bytes ({remaining} bytes left unsent)")]
    WriteZero { remaining: usize },

    #[error("Expected {expected} byte(s) but read {actual}")]
    ShortRead { expected: usize, actual: usize },
}

impl TransportError {
    /// Read errors that only mean "nothing there right now".
    pub(crate) fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Io(e) if matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
            )
        )
    }
}

/// Byte-level link to the instrument.
///
/// Writes may be short; the wire framer loops until a message is fully out.
pub trait Transport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    fn is_open(&self) -> bool;

    /// Descriptor the host registers for readiness events, if there is one.
    fn fd(&self) -> Option<SourceId>;
}

/// `serialport` backed transport for the MSO-19's FTDI bridge.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    path: String,
    fd: Option<SourceId>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("fd", &self.fd)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl SerialTransport {
    pub const BAUD_RATE: u32 = 460_800;
    /// Bounds the one blocking read the driver performs (trigger status).
    pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

    /// Open the serial port at `path` with the device's fixed line settings.
    pub fn open(path: &str) -> Result<Self, TransportError> {
        log::debug!("Opening MSO-19 on serial port {}", path);
        let builder = serialport::new(path, Self::BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::Software)
            .timeout(Self::READ_TIMEOUT);

        #[cfg(unix)]
        let (port, fd) = {
            use std::os::fd::AsRawFd;
            let native = builder.open_native()?;
            let fd = native.as_raw_fd();
            (Box::new(native) as Box<dyn SerialPort>, Some(fd))
        };
        #[cfg(not(unix))]
        let (port, fd) = (builder.open()?, None);

        let mut transport = Self {
            port: Some(port),
            path: path.to_string(),
            fd,
        };
        transport.flush()?;
        Ok(transport)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Discard anything buffered in either direction.
    pub fn flush(&mut self) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        port.clear(ClearBuffer::All)?;
        Ok(())
    }

    pub fn close(&mut self) {
        if self.port.take().is_some() {
            log::debug!("Closed serial port {}", self.path);
        }
        self.fd = None;
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        let written = port.write(buf)?;
        port.flush()?;
        Ok(written)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        Ok(port.read(buf)?)
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn fd(&self) -> Option<SourceId> {
        self.fd
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::{SourceId, Transport, TransportError};
    use crate::wire::{MSO_FOOT, MSO_HEAD};
    use std::collections::VecDeque;

    /// In-memory transport with scripted reads and controllable writes.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        pub written: Vec<u8>,
        /// Each entry answers one `read` call; an empty entry reads as EOF.
        pub reads: VecDeque<Vec<u8>>,
        /// Largest number of bytes a single `write` call accepts.
        pub write_chunk: Option<usize>,
        /// Zero-based index of the `write` call that fails.
        pub fail_write_call: Option<usize>,
        pub fail_reads: bool,
        pub write_calls: usize,
        pub closed: bool,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_reads<I: IntoIterator<Item = Vec<u8>>>(reads: I) -> Self {
            Self {
                reads: reads.into_iter().collect(),
                ..Self::default()
            }
        }

        pub fn push_read(&mut self, chunk: &[u8]) {
            self.reads.push_back(chunk.to_vec());
        }

        /// Split everything written so far into the op-words of each message.
        pub fn messages(&self) -> Vec<Vec<u16>> {
            let mut messages = Vec::new();
            let mut rest = self.written.as_slice();
            while !rest.is_empty() {
                assert!(rest.starts_with(&MSO_HEAD), "missing header: {rest:02x?}");
                rest = &rest[MSO_HEAD.len()..];
                let mut words = Vec::new();
                while !rest.starts_with(&MSO_FOOT) {
                    words.push(u16::from_be_bytes([rest[0], rest[1]]));
                    rest = &rest[2..];
                }
                rest = &rest[MSO_FOOT.len()..];
                messages.push(words);
            }
            messages
        }

        pub fn clear_written(&mut self) {
            self.written.clear();
        }
    }

    impl Transport for MockTransport {
        fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
            let call = self.write_calls;
            self.write_calls += 1;
            if self.fail_write_call == Some(call) {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "injected write failure",
                )));
            }
            let n = self.write_chunk.map_or(buf.len(), |c| c.min(buf.len()));
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            if self.fail_reads {
                return Err(TransportError::Io(std::io::Error::other(
                    "injected read failure",
                )));
            }
            let Some(mut chunk) = self.reads.pop_front() else {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "no scripted data",
                )));
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.reads.push_front(chunk.split_off(n));
            }
            Ok(n)
        }

        fn is_open(&self) -> bool {
            !self.closed
        }

        fn fd(&self) -> Option<SourceId> {
            (!self.closed).then_some(7)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn test_transient_errors() {
        let io = |kind| TransportError::Io(std::io::Error::new(kind, "x"));
        assert!(io(std::io::ErrorKind::TimedOut).is_transient());
        assert!(io(std::io::ErrorKind::WouldBlock).is_transient());
        assert!(!io(std::io::ErrorKind::BrokenPipe).is_transient());
        assert!(!TransportError::Closed.is_transient());
    }

    #[test]
    fn test_mock_splits_reads_to_buffer_size() {
        let mut transport = MockTransport::with_reads([vec![1, 2, 3, 4, 5]]);
        let mut buf = [0u8; 3];
        assert_eq!(transport.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(transport.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
    }

    #[test]
    fn test_mock_reports_descriptor_while_open() {
        let mut transport = MockTransport::new();
        assert_eq!(transport.fd(), Some(7));
        transport.closed = true;
        assert_eq!(transport.fd(), None);
        assert!(!transport.is_open());
    }
}
