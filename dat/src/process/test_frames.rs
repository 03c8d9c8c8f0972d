//! In-memory frame fixtures.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::structs::frame::{
    FRAME_SIZE, FrameBuf, MAINID_OFFSET, PACK_SIZE, PACKS_OFFSET, SUBID_OFFSET,
};
use crate::structs::ids::{CTRL_PRIO, CTRL_START};
use crate::structs::subcode::xor_parity;

const fn bcd(value: u32) -> u8 {
    (((value / 10) % 10) << 4 | (value % 10)) as u8
}

#[derive(Debug, Clone)]
pub struct FrameBuilder {
    frame: FrameBuf,
    channels: u8,
    samplerate: u8,
    emphasis: u8,
    encoding: u8,
    data_id: u8,
    control_id: u8,
    pno: u16,
    interpolate_flags: u8,
}

impl FrameBuilder {
    /// 2ch 48 kHz linear audio frame with no packs.
    pub fn audio() -> Self {
        Self {
            frame: [0; FRAME_SIZE],
            channels: 0,
            samplerate: 0,
            emphasis: 0,
            encoding: 0,
            data_id: 0,
            control_id: 0,
            pno: 0,
            interpolate_flags: 0,
        }
    }

    pub fn channels(mut self, code: u8) -> Self {
        self.channels = code;
        self
    }

    pub fn samplerate(mut self, code: u8) -> Self {
        self.samplerate = code;
        self
    }

    pub fn emphasis(mut self, code: u8) -> Self {
        self.emphasis = code;
        self
    }

    pub fn encoding(mut self, code: u8) -> Self {
        self.encoding = code;
        self
    }

    pub fn data_id(mut self, data_id: u8) -> Self {
        self.data_id = data_id;
        self
    }

    pub fn start(mut self) -> Self {
        self.control_id |= CTRL_PRIO | CTRL_START;
        self
    }

    /// Three program number digits as hex nibbles, e.g. `0x0EE`.
    pub fn program(mut self, hex_pno: u16) -> Self {
        self.pno = hex_pno;
        self
    }

    pub fn interpolate(mut self, flags: u8) -> Self {
        self.interpolate_flags = flags;
        self
    }

    pub fn fill(mut self, value: u8) -> Self {
        self.frame[..PACKS_OFFSET].fill(value);
        self
    }

    /// Stores bytes 0-6 of a pack and appends its parity byte.
    pub fn pack(mut self, index: usize, data: [u8; PACK_SIZE - 1]) -> Self {
        let start = PACKS_OFFSET + index * PACK_SIZE;
        self.frame[start..start + PACK_SIZE - 1].copy_from_slice(&data);
        self.frame[start + PACK_SIZE - 1] = xor_parity(&data);
        self
    }

    pub fn date_pack(self, index: usize, data: [u8; PACK_SIZE - 1]) -> Self {
        self.pack(index, data)
    }

    /// Date pack that decodes to `date_time` under the default hour offset.
    pub fn date(self, date_time: NaiveDateTime) -> Self {
        let weekday = date_time.weekday().num_days_from_sunday() as u8 + 1;
        self.pack(
            0,
            [
                0x50 | weekday,
                bcd(date_time.year() as u32 % 100),
                bcd(date_time.month()),
                bcd(date_time.day()),
                bcd(date_time.hour() + 1),
                bcd(date_time.minute()),
                bcd(date_time.second()),
            ],
        )
    }

    pub fn build(&self) -> FrameBuf {
        let mut frame = self.frame;
        frame[SUBID_OFFSET] = self.data_id | self.control_id << 4;
        frame[SUBID_OFFSET + 1] = ((self.pno >> 8) as u8 & 0x0F) << 4;
        frame[SUBID_OFFSET + 2] = self.pno as u8;
        frame[SUBID_OFFSET + 3] = self.interpolate_flags;
        frame[MAINID_OFFSET] = self.channels | self.samplerate << 2 | self.emphasis << 4;
        frame[MAINID_OFFSET + 1] = self.encoding << 6;
        frame
    }
}
