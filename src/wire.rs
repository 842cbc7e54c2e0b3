use crate::error::{MsoError, Result};
use crate::transport::{Transport, TransportError};

/// Every control message starts with `@LDS~`.
pub const MSO_HEAD: [u8; 5] = [0x40, 0x4c, 0x44, 0x53, 0x7e];
pub const MSO_FOOT: [u8; 1] = [0x7e];

/// Build the framed bytes for a sequence of op-words.
pub fn frame_control_message(words: &[u16]) -> Result<Vec<u8>> {
    let size = MSO_HEAD.len() + words.len() * 2 + MSO_FOOT.len();
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| MsoError::Allocation { size })?;

    buf.extend_from_slice(&MSO_HEAD);
    for word in words {
        buf.extend_from_slice(&word.to_be_bytes());
    }
    buf.extend_from_slice(&MSO_FOOT);
    Ok(buf)
}

/// Frame `words` and push the whole message out, looping over short writes.
///
/// Either every byte is written or an error is returned; bytes that already
/// reached the wire before a failure are not reported.
pub fn send_control_message<T: Transport + ?Sized>(transport: &mut T, words: &[u16]) -> Result<()> {
    if !transport.is_open() {
        return Err(TransportError::NotOpen.into());
    }

    let buf = frame_control_message(words)?;
    let mut written = 0;
    while written < buf.len() {
        let n = transport.write(&buf[written..])?;
        if n == 0 {
            return Err(TransportError::WriteZero {
                remaining: buf.len() - written,
            }
            .into());
        }
        written += n;
    }
    log::trace!("Sent control message {:04x?}", words);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{op_word, REG_CTL1, REG_TRIGGER};
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_frame_layout() {
        let buf = frame_control_message(&[0x1234, 0xabcd]).unwrap();
        assert_eq!(
            buf,
            vec![0x40, 0x4c, 0x44, 0x53, 0x7e, 0x12, 0x34, 0xab, 0xcd, 0x7e]
        );
    }

    #[test]
    fn test_empty_message_is_header_and_footer() {
        let buf = frame_control_message(&[]).unwrap();
        assert_eq!(buf.len(), MSO_HEAD.len() + MSO_FOOT.len());
    }

    #[test]
    fn test_send_writes_whole_message() {
        let mut transport = MockTransport::new();
        let words = [op_word(REG_TRIGGER, 0), op_word(REG_CTL1, 0x10)];
        send_control_message(&mut transport, &words).unwrap();
        assert_eq!(transport.write_calls, 1);
        assert_eq!(transport.messages(), vec![words.to_vec()]);
    }

    #[test]
    fn test_send_survives_short_writes() {
        let mut transport = MockTransport::new();
        transport.write_chunk = Some(3);
        let words = [0x4140, 0x4220, 0x3e3f];
        send_control_message(&mut transport, &words).unwrap();
        // 5 header + 6 payload + 1 footer = 12 bytes in chunks of 3
        assert_eq!(transport.write_calls, 4);
        assert_eq!(transport.messages(), vec![words.to_vec()]);
    }

    #[test]
    fn test_failing_partial_write_fails_without_retry() {
        let mut transport = MockTransport::new();
        transport.write_chunk = Some(2);
        transport.fail_write_call = Some(2);
        let result = send_control_message(&mut transport, &[0x4140, 0x4220]);
        assert!(matches!(
            result,
            Err(MsoError::Transport(TransportError::Io(_)))
        ));
        assert_eq!(transport.write_calls, 3);
        assert_eq!(transport.written.len(), 4);
    }

    #[test]
    fn test_zero_length_write_is_an_error() {
        let mut transport = MockTransport::new();
        transport.write_chunk = Some(0);
        let result = send_control_message(&mut transport, &[0x4140]);
        assert!(matches!(
            result,
            Err(MsoError::Transport(TransportError::WriteZero { remaining: 8 }))
        ));
    }

    #[test]
    fn test_closed_transport_is_rejected_before_writing() {
        let mut transport = MockTransport::new();
        transport.closed = true;
        let result = send_control_message(&mut transport, &[0x4140]);
        assert!(matches!(
            result,
            Err(MsoError::Transport(TransportError::NotOpen))
        ));
        assert_eq!(transport.write_calls, 0);
    }
}
