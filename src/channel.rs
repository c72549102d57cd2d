//! Duplex byte-stream seam between the protocol logic and the transport.
//!
//! The core never opens or closes the connection. Anything that is
//! `Read + Write` (a `TcpStream`, an in-memory script in tests) is a channel.
use std::io::{self, ErrorKind, Read, Write};

use crate::error::AbxError;

pub trait Channel {
    /// One blocking read; `Ok(0)` means the peer closed the stream.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Blocking write of the whole frame.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl<T: Read + Write> Channel for T {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.flush()
    }
}

/// Fill `buf` completely, accumulating across short reads.
///
/// Returns `Ok(false)` when the stream ends cleanly before the first byte,
/// [`AbxError::TruncatedRecord`] when it ends after a partial fill.
pub fn read_exact_or_eof<C: Channel + ?Sized>(
    channel: &mut C,
    buf: &mut [u8],
) -> Result<bool, AbxError> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match channel.recv(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(AbxError::TruncatedRecord { received: filled }),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(AbxError::Channel(e)),
        }
    }
    Ok(true)
}


#[cfg(test)]
mod tests {
    use super::mock::{ScriptedChannel, Step};
    use super::*;

    #[test]
    fn accumulates_short_reads() {
        let mut ch = ScriptedChannel::new(vec![
            Step::Data(vec![1, 2]),
            Step::Data(vec![3]),
            Step::Data(vec![4, 5]),
        ]);
        let mut buf = [0u8; 5];
        assert!(read_exact_or_eof(&mut ch, &mut buf).unwrap());
        assert_eq!(buf, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn clean_eof_at_boundary() {
        let mut ch = ScriptedChannel::new(vec![Step::Eof]);
        let mut buf = [0u8; 4];
        assert!(!read_exact_or_eof(&mut ch, &mut buf).unwrap());
    }

    #[test]
    fn eof_mid_buffer_is_truncation() {
        let mut ch = ScriptedChannel::new(vec![Step::Data(vec![9; 3]), Step::Eof]);
        let mut buf = [0u8; 4];
        assert!(matches!(
            read_exact_or_eof(&mut ch, &mut buf),
            Err(AbxError::TruncatedRecord { received: 3 })
        ));
    }

    #[test]
    fn interrupted_is_retried_and_other_errors_surface() {
        let mut ch = ScriptedChannel::new(vec![
            Step::ReadError(ErrorKind::Interrupted),
            Step::Data(vec![7, 7]),
        ]);
        let mut buf = [0u8; 2];
        assert!(read_exact_or_eof(&mut ch, &mut buf).unwrap());

        let mut ch = ScriptedChannel::new(vec![Step::ReadError(ErrorKind::ConnectionReset)]);
        assert!(matches!(read_exact_or_eof(&mut ch, &mut buf), Err(AbxError::Channel(_))));
    }
}
