use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, StdinLock};
use std::path::Path;

use anyhow::{Context, Result, bail};
use dat::process::stream::FrameReader;
use dat::structs::frame::FRAME_SIZE;

enum Source {
    Stdin(StdinLock<'static>),
    File(BufReader<File>),
}

/// Capture input from a file or, for "-", from stdin.
pub struct InputReader {
    source: Source,
    len: Option<u64>,
}

impl InputReader {
    /// Create a new InputReader from a path
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path = input_path.as_ref();

        if path.to_string_lossy() == "-" {
            return Ok(Self {
                source: Source::Stdin(io::stdin().lock()),
                len: None,
            });
        }

        let file = File::open(path).with_context(|| format!("Opening {}", path.display()))?;
        // devices and fifos report no usable length and cannot seek
        let len = file
            .metadata()
            .ok()
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len());

        Ok(Self {
            source: Source::File(BufReader::new(file)),
            len,
        })
    }

    /// Whole frames left in the input, when its size is known.
    pub fn frame_count(&self) -> Option<u64> {
        self.len.map(|len| len / FRAME_SIZE as u64)
    }

    /// Positions the input `frames` frames in and wraps it in a frame reader.
    ///
    /// Regular files are seeked; pipes, fifos and devices are read and the
    /// frames dropped. Stopping
    /// short of the requested position is an error.
    pub fn into_frames(mut self, frames: u64) -> Result<FrameReader<Self>> {
        if frames == 0 {
            return Ok(FrameReader::new(self));
        }

        let offset = frames * FRAME_SIZE as u64;
        let seekable = match (&mut self.source, self.len) {
            (Source::File(file), Some(len)) => {
                if offset > len {
                    bail!("Seek to frame {frames} is past the end of the input ({len} bytes)");
                }
                file.seek(SeekFrom::Start(offset))
                    .with_context(|| format!("Seeking to frame {frames}"))?;
                self.len = Some(len - offset);
                true
            }
            _ => false,
        };

        let mut reader = FrameReader::new(self);
        if !seekable {
            reader
                .discard_frames(frames)
                .with_context(|| format!("Skipping to frame {frames}"))?;
        }
        Ok(reader)
    }
}

impl Read for InputReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.source {
            Source::Stdin(stdin) => stdin.read(buf),
            Source::File(file) => file.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn capture(frames: u8) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        for frame in 0..frames {
            file.write_all(&[frame; FRAME_SIZE])?;
        }
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn seeks_whole_frames() -> Result<()> {
        let file = capture(4)?;
        let input = InputReader::new(file.path())?;
        assert_eq!(input.frame_count(), Some(4));

        let mut reader = input.into_frames(3)?;
        let mut frame = [0; FRAME_SIZE];
        assert!(reader.read_frame(&mut frame)?);
        assert_eq!(frame[0], 3);
        assert!(!reader.read_frame(&mut frame)?);
        Ok(())
    }

    #[test]
    fn seek_past_end_fails() -> Result<()> {
        let file = capture(2)?;
        assert!(InputReader::new(file.path())?.into_frames(2).is_ok());
        assert!(InputReader::new(file.path())?.into_frames(3).is_err());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn fifo_skips_by_reading() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let fifo = dir.path().join("tape.fifo");
        let status = std::process::Command::new("mkfifo").arg(&fifo).status()?;
        assert!(status.success());

        let writer_path = fifo.clone();
        let writer = std::thread::spawn(move || -> io::Result<()> {
            let mut out = std::fs::OpenOptions::new().write(true).open(writer_path)?;
            for frame in 0..3u8 {
                out.write_all(&[frame; FRAME_SIZE])?;
            }
            Ok(())
        });

        let input = InputReader::new(&fifo)?;
        assert_eq!(input.frame_count(), None);

        let mut reader = input.into_frames(1)?;
        let mut frame = [0; FRAME_SIZE];
        assert!(reader.read_frame(&mut frame)?);
        assert_eq!(frame[0], 1);
        assert!(reader.read_frame(&mut frame)?);
        assert_eq!(frame[0], 2);
        assert!(!reader.read_frame(&mut frame)?);

        writer.join().unwrap()?;
        Ok(())
    }

    #[test]
    fn missing_file_fails() {
        assert!(InputReader::new("/nonexistent/tape.dat").is_err());
    }
}
