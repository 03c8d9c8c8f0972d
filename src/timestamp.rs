use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{Local, NaiveDateTime, TimeZone};

/// Formats seconds as `HH:MM:SS.mmm`.
pub fn time_str(sec: f64) -> String {
    let ms = sec * 1000f64;
    let hours = (ms / 3600000f64) as u64;
    let minutes = ((ms % 3600000f64) / 60000f64) as u64;
    let seconds = ((ms % 60000f64) / 1000f64) as u64;
    let milliseconds = (ms % 1000f64) as u64;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

/// Output path for a track: the recording date when known, else the track number.
///
/// The prefix is used verbatim and may contain directories.
pub fn track_path(prefix: &str, date: Option<NaiveDateTime>, number: usize, ext: &str) -> PathBuf {
    let stem = match date {
        Some(date) => date.format("%Y-%m-%d-%H-%M-%S").to_string(),
        None => number.to_string(),
    };
    PathBuf::from(format!("{prefix}{stem}.{ext}"))
}

/// Same layout as C `ctime`, without the trailing newline.
pub fn ctime_str(date: &NaiveDateTime) -> String {
    date.format("%a %b %e %H:%M:%S %Y").to_string()
}

/// Interprets a subcode date as local wall-clock time.
///
/// Returns `None` for times skipped by a daylight saving transition.
pub fn local_system_time(date: &NaiveDateTime) -> Option<SystemTime> {
    Local
        .from_local_datetime(date)
        .earliest()
        .map(SystemTime::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::Path;

    fn date() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(1996, 3, 7)
            .and_then(|d| d.and_hms_opt(9, 5, 2))
            .unwrap()
    }

    #[test]
    fn formats_durations() {
        assert_eq!(time_str(0.0), "00:00:00.000");
        assert_eq!(time_str(3723.5), "01:02:03.500");
        assert_eq!(time_str(360000.0), "100:00:00.000");
    }

    #[test]
    fn names_tracks_by_date_or_number() {
        assert_eq!(
            track_path("out/tape1-", Some(date()), 4, "wav"),
            Path::new("out/tape1-1996-03-07-09-05-02.wav")
        );
        assert_eq!(track_path("", None, 4, "details"), Path::new("4.details"));
    }

    #[test]
    fn ctime_layout() {
        assert_eq!(ctime_str(&date()), "Thu Mar  7 09:05:02 1996");
    }
}
