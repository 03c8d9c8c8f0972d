use std::io::Write;

use anyhow::Result;
use dat::process::segment::Track;
use serde::Serialize;

use crate::timestamp::ctime_str;

const ABSENT: &str = "--";

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Field<T> {
    Value(T),
    Absent(&'static str),
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Field::Absent(ABSENT), Field::Value)
    }
}

/// Sidecar summary written next to each kept track.
#[derive(Debug, Serialize)]
pub struct TrackDetails {
    #[serde(rename = "Sampling frequency")]
    pub sampling_frequency: u32,
    #[serde(rename = "Channels")]
    pub channels: u16,
    #[serde(rename = "Samples")]
    pub samples: u64,
    #[serde(rename = "Quantization")]
    pub quantization: String,
    #[serde(rename = "Emphasis")]
    pub emphasis: &'static str,
    #[serde(rename = "Program_number")]
    pub program_number: Field<u16>,
    #[serde(rename = "First date")]
    pub first_date: Field<String>,
    #[serde(rename = "Last date")]
    pub last_date: Field<String>,
    #[serde(rename = "First frame")]
    pub first_frame: u64,
    #[serde(rename = "Last frame")]
    pub last_frame: u64,
}

impl From<&Track> for TrackDetails {
    fn from(track: &Track) -> Self {
        Self {
            sampling_frequency: track.sampling_frequency,
            channels: track.channels,
            samples: track.samples,
            quantization: track.encoding.to_string(),
            emphasis: if track.emphasis { "pre-emphasis" } else { "none" },
            program_number: track.program_number.into(),
            first_date: track.first_date.as_ref().map(ctime_str).into(),
            last_date: track.last_date.as_ref().map(ctime_str).into(),
            first_frame: track.first_frame,
            last_frame: track.last_frame,
        }
    }
}

impl TrackDetails {
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        serde_yaml_ng::to_writer(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dat::structs::frame_info::Encoding;
    use serde_yaml_ng::Value;

    fn track() -> Track {
        let date = NaiveDate::from_ymd_opt(2001, 9, 30)
            .and_then(|d| d.and_hms_opt(22, 15, 0))
            .unwrap();
        Track {
            number: 0,
            channels: 2,
            sampling_frequency: 44100,
            encoding: Encoding::Linear16,
            emphasis: true,
            program_number: None,
            samples: 44100 * 3,
            first_frame: 12,
            last_frame: 113,
            first_date: Some(date),
            last_date: None,
        }
    }

    #[test]
    fn labels_and_values() -> Result<()> {
        let mut out = Vec::new();
        TrackDetails::from(&track()).write_to(&mut out)?;
        let doc: Value = serde_yaml_ng::from_str(std::str::from_utf8(&out)?)?;

        assert_eq!(doc["Sampling frequency"].as_u64(), Some(44100));
        assert_eq!(doc["Channels"].as_u64(), Some(2));
        assert_eq!(doc["Samples"].as_u64(), Some(132300));
        assert_eq!(doc["Quantization"].as_str(), Some("16-bit linear"));
        assert_eq!(doc["Emphasis"].as_str(), Some("pre-emphasis"));
        assert_eq!(doc["Program_number"].as_str(), Some("--"));
        assert_eq!(doc["First date"].as_str(), Some("Sun Sep 30 22:15:00 2001"));
        assert_eq!(doc["Last date"].as_str(), Some("--"));
        assert_eq!(doc["First frame"].as_u64(), Some(12));
        assert_eq!(doc["Last frame"].as_u64(), Some(113));
        Ok(())
    }

    #[test]
    fn program_number_when_known() {
        let details = TrackDetails::from(&Track {
            program_number: Some(42),
            ..track()
        });
        assert_eq!(details.program_number, Field::Value(42));
    }
}
