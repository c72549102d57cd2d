//! Session capture files.
//!
//! Each frame is `[len: u32 LE][crc32: u32 LE][bincode payload]`. A capture
//! starts with a [`CaptureFrame::Header`], then one `Record` frame per
//! exported record in sequence order, then one `Unrecovered` frame per
//! sequence number backfill could not recover.
use std::io::{ErrorKind, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use crc32fast::Hasher as Crc32;

use crate::record::{CaptureFrame, CaptureHeader};
use crate::session::SessionReport;

pub const CAPTURE_VERSION: u16 = 1;

/// Largest payload a reader accepts; guards the allocation before the CRC check.
pub const MAX_FRAME_LEN: usize = 1 << 20;

pub fn now_unix_ns() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

pub fn write_frame<W: Write>(w: &mut W, frame: &CaptureFrame) -> Result<()> {
    let payload = bincode::serialize(frame)?;
    let mut hasher = Crc32::new();
    hasher.update(&payload);
    let crc = hasher.finalize();

    let len = payload.len() as u32;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&crc.to_le_bytes())?;
    w.write_all(&payload)?;
    Ok(())
}

/// Write a whole session report as a capture.
pub fn write_report<W: Write>(w: &mut W, server: &str, report: &SessionReport) -> Result<()> {
    write_frame(w, &CaptureFrame::Header(CaptureHeader {
        version: CAPTURE_VERSION,
        created_unix_ns: now_unix_ns(),
        server: server.to_string(),
        max_sequence: report.max_sequence,
        record_count: report.records.len() as u32,
    }))?;
    for r in &report.records {
        write_frame(w, &CaptureFrame::Record(r.clone()))?;
    }
    for f in &report.unrecovered {
        let frame = CaptureFrame::Unrecovered {
            sequence: f.sequence,
            reason: f.cause.to_string(),
        };
        write_frame(w, &frame)?;
    }
    w.flush()?;
    Ok(())
}

/// Iterates frames until a clean end of file at a frame boundary.
///
/// A file that ends inside a frame, including inside the length prefix, is an
/// error.
pub struct FrameReader<R> {
    inner: R,
    frames: usize,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, frames: 0 }
    }

    pub fn frames_read(&self) -> usize {
        self.frames
    }

    fn read_u32(&mut self) -> std::io::Result<u32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Length prefix, or `None` on end of file before its first byte.
    fn read_len(&mut self) -> Result<Option<usize>> {
        let mut prefix = [0u8; 4];
        loop {
            match self.inner.read(&mut prefix[..1]) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.inner
            .read_exact(&mut prefix[1..])
            .with_context(|| format!("frame {} header", self.frames))?;
        Ok(Some(u32::from_le_bytes(prefix) as usize))
    }

    pub fn next_frame(&mut self) -> Result<Option<CaptureFrame>> {
        let Some(len) = self.read_len()? else {
            return Ok(None);
        };
        if len > MAX_FRAME_LEN {
            bail!("frame {} length {} exceeds {} bytes", self.frames, len, MAX_FRAME_LEN);
        }
        let crc_on_file = self
            .read_u32()
            .with_context(|| format!("frame {} header", self.frames))?;
        let mut payload = vec![0u8; len];
        self.inner
            .read_exact(&mut payload)
            .with_context(|| format!("frame {} payload", self.frames))?;
        let mut hasher = Crc32::new();
        hasher.update(&payload);
        let crc_calc = hasher.finalize();
        if crc_calc != crc_on_file {
            bail!(
                "CRC mismatch at frame {}: file={:#x}, calc={:#x}",
                self.frames,
                crc_on_file,
                crc_calc
            );
        }
        let frame: CaptureFrame = bincode::deserialize(&payload).context("bincode decode")?;
        self.frames += 1;
        Ok(Some(frame))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<CaptureFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
