use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use dat::process::segment::{Track, TrackSink};
use log::{debug, info, warn};

use crate::details::TrackDetails;
use crate::timestamp::{local_system_time, track_path};
use crate::wav::WAVWriter;

const WAV_EXT: &str = "wav";
const DETAILS_EXT: &str = "details";

struct OpenTrack {
    path: PathBuf,
    writer: WAVWriter<File>,
}

/// Writes each kept track as a WAV file with a details sidecar.
pub struct WavTrackSink {
    prefix: String,
    current: Option<OpenTrack>,
    written: Vec<PathBuf>,
}

impl WavTrackSink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            current: None,
            written: Vec::new(),
        }
    }

    /// Paths of the WAV files kept so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn take_current(&mut self) -> Result<OpenTrack> {
        match self.current.take() {
            Some(open) => Ok(open),
            None => bail!("no track file open"),
        }
    }
}

impl TrackSink for WavTrackSink {
    fn open(&mut self, track: &Track) -> Result<()> {
        let path = track_path(&self.prefix, track.first_date, track.number, WAV_EXT);
        let file = File::create(&path).with_context(|| format!("Opening {}", path.display()))?;

        let mut writer = WAVWriter::new(file, track.sampling_frequency, track.channels);
        writer
            .write_header()
            .with_context(|| format!("Writing header to {}", path.display()))?;

        debug!("Opened {}", path.display());
        self.current = Some(OpenTrack { path, writer });
        Ok(())
    }

    fn write(&mut self, samples: &[u8]) -> Result<()> {
        let Some(open) = self.current.as_mut() else {
            bail!("no track file open");
        };
        open.writer
            .write_samples(samples)
            .with_context(|| format!("Writing to {}", open.path.display()))
    }

    fn finish(&mut self, track: &Track) -> Result<()> {
        let OpenTrack { path, mut writer } = self.take_current()?;

        writer
            .finish(track.samples)
            .with_context(|| format!("Rewriting header of {}", path.display()))?;
        debug!(
            "{} bytes of audio in {}",
            writer.data_written(),
            path.display()
        );
        let file = writer.into_inner()?;

        let times = track
            .first_date
            .as_ref()
            .and_then(local_system_time)
            .map(|time| FileTimes::new().set_accessed(time).set_modified(time));
        if let Some(times) = times {
            if let Err(e) = file.set_times(times) {
                warn!("Setting times on {}: {e}", path.display());
            }
        }
        drop(file);

        let final_path = track_path(&self.prefix, track.first_date, track.number, WAV_EXT);
        if final_path != path {
            fs::rename(&path, &final_path).with_context(|| {
                format!("Renaming {} to {}", path.display(), final_path.display())
            })?;
        }

        write_details(&final_path.with_extension(DETAILS_EXT), track, times)?;

        info!("Wrote {}", final_path.display());
        self.written.push(final_path);
        Ok(())
    }

    fn discard(&mut self, _track: &Track) -> Result<()> {
        let OpenTrack { path, writer } = self.take_current()?;
        drop(writer);

        fs::remove_file(&path).with_context(|| format!("Removing {}", path.display()))
    }
}

fn write_details(path: &Path, track: &Track, times: Option<FileTimes>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Opening {}", path.display()))?;
    TrackDetails::from(track)
        .write_to(&file)
        .with_context(|| format!("Writing {}", path.display()))?;

    if let Some(times) = times {
        if let Err(e) = file.set_times(times) {
            warn!("Setting times on {}: {e}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use dat::structs::frame_info::Encoding;
    use tempfile::tempdir;

    fn track(number: usize, first_date: Option<NaiveDateTime>) -> Track {
        Track {
            number,
            channels: 2,
            sampling_frequency: 48000,
            encoding: Encoding::Linear16,
            emphasis: false,
            program_number: Some(3),
            samples: 0,
            first_frame: 0,
            last_frame: 0,
            first_date,
            last_date: first_date,
        }
    }

    fn prefix(dir: &Path) -> String {
        format!("{}/take-", dir.display())
    }

    #[test]
    fn finished_track_has_header_and_details() -> Result<()> {
        let dir = tempdir()?;
        let mut sink = WavTrackSink::new(prefix(dir.path()));
        let mut track = track(0, None);

        sink.open(&track)?;
        sink.write(&[0u8; 5760])?;
        track.samples = 1440;
        track.last_frame = 1;
        sink.finish(&track)?;

        let wav = dir.path().join("take-0.wav");
        let data = fs::read(&wav)?;
        assert_eq!(data.len(), 44 + 5760);
        assert_eq!(&data[40..44], &5760u32.to_le_bytes());

        let details = fs::read_to_string(dir.path().join("take-0.details"))?;
        assert!(details.contains("Samples: 1440"));
        assert!(details.contains("Program_number: 3"));
        assert_eq!(sink.written(), &[wav]);
        Ok(())
    }

    #[test]
    fn named_after_first_date_with_file_time() -> Result<()> {
        let dir = tempdir()?;
        let date = NaiveDate::from_ymd_opt(1999, 12, 31)
            .and_then(|d| d.and_hms_opt(23, 59, 1))
            .unwrap();
        let mut sink = WavTrackSink::new(prefix(dir.path()));
        let track = track(5, Some(date));

        sink.open(&track)?;
        sink.finish(&track)?;

        let wav = dir.path().join("take-1999-12-31-23-59-01.wav");
        let modified = fs::metadata(&wav)?.modified()?;
        assert_eq!(Some(modified), local_system_time(&date));
        assert!(dir.path().join("take-1999-12-31-23-59-01.details").exists());
        Ok(())
    }

    #[test]
    fn late_date_renames_file() -> Result<()> {
        let dir = tempdir()?;
        let mut sink = WavTrackSink::new(prefix(dir.path()));
        let mut track = track(2, None);

        sink.open(&track)?;
        assert!(dir.path().join("take-2.wav").exists());

        track.first_date = NaiveDate::from_ymd_opt(2003, 1, 2).and_then(|d| d.and_hms_opt(3, 4, 5));
        sink.finish(&track)?;

        assert!(!dir.path().join("take-2.wav").exists());
        assert!(dir.path().join("take-2003-01-02-03-04-05.wav").exists());
        Ok(())
    }

    #[test]
    fn discarded_track_is_removed() -> Result<()> {
        let dir = tempdir()?;
        let mut sink = WavTrackSink::new(prefix(dir.path()));
        let track = track(0, None);

        sink.open(&track)?;
        sink.write(&[1u8; 64])?;
        sink.discard(&track)?;

        assert!(!dir.path().join("take-0.wav").exists());
        assert!(sink.written().is_empty());
        Ok(())
    }

    #[test]
    fn write_without_open_fails() {
        let mut sink = WavTrackSink::new("unused-");
        assert!(sink.write(&[0; 4]).is_err());
    }
}
