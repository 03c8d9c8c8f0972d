//! Raw frame layout.
//!
//! A frame is 5822 bytes read from the tape:
//!
//! | Range | Content |
//! |---|---|
//! | `[0, 5760)` | Interleaved sample data |
//! | `[5760, 5816)` | 7 subcode packs of 8 bytes |
//! | `[5816, 5820)` | Sub-id |
//! | `[5820, 5822)` | Main-id |

/// Size of one frame in bytes.
pub const FRAME_SIZE: usize = 5822;

/// Size of the sample region at the start of each frame.
pub const DATA_SIZE: usize = 5760;

pub const PACKS_OFFSET: usize = DATA_SIZE;
pub const N_PACKS: usize = 7;
pub const PACK_SIZE: usize = 8;
pub const SUBID_OFFSET: usize = PACKS_OFFSET + N_PACKS * PACK_SIZE;
pub const SUBID_SIZE: usize = 4;
pub const MAINID_OFFSET: usize = SUBID_OFFSET + SUBID_SIZE;
pub const MAINID_SIZE: usize = 2;

/// Sample bytes carried by a 16-bit linear frame at 48 kHz.
pub const SOUND_DATA_SIZE_48KHZ: usize = DATA_SIZE;
/// Sample bytes carried by a 16-bit linear frame at 44.1 kHz.
pub const SOUND_DATA_SIZE_44_1KHZ: usize = 5292;
/// Sample bytes carried by a 16-bit linear frame at 32 kHz.
pub const SOUND_DATA_SIZE_32KHZ_PCM: usize = 3840;
/// Bytes produced by expanding one 12-bit non-linear frame to 16-bit samples.
pub const SOUND_DATA_SIZE_32KHZ_NONLINEAR_UNPACKED: usize = 7680;

/// Program number marking the end of the recorded area.
pub const PNO_END_OF_TAPE: u16 = 0x0EE;
/// Program number marking blank or lead-in areas.
pub const PNO_BLANK: u16 = 0x0BB;

/// Interpolation flag bits that mark concealed samples.
pub const INTERPOLATE_MASK: u8 = 0x40 | 0x20;

pub type FrameBuf = [u8; FRAME_SIZE];

/// Accessors for the fixed regions of a frame buffer.
pub trait FrameLayout {
    fn pack(&self, index: usize) -> &[u8; PACK_SIZE];
    fn sub_id(&self) -> &[u8; SUBID_SIZE];
    fn main_id(&self) -> &[u8; MAINID_SIZE];
}

impl FrameLayout for FrameBuf {
    fn pack(&self, index: usize) -> &[u8; PACK_SIZE] {
        let start = PACKS_OFFSET + index * PACK_SIZE;
        self[start..start + PACK_SIZE]
            .try_into()
            .expect("pack range is PACK_SIZE bytes")
    }

    fn sub_id(&self) -> &[u8; SUBID_SIZE] {
        self[SUBID_OFFSET..MAINID_OFFSET]
            .try_into()
            .expect("sub-id range is SUBID_SIZE bytes")
    }

    fn main_id(&self) -> &[u8; MAINID_SIZE] {
        self[MAINID_OFFSET..FRAME_SIZE]
            .try_into()
            .expect("main-id range is MAINID_SIZE bytes")
    }
}

#[test]
fn layout_regions_tile_the_frame() {
    assert_eq!(SUBID_OFFSET, 5816);
    assert_eq!(MAINID_OFFSET, 5820);
    assert_eq!(MAINID_OFFSET + MAINID_SIZE, FRAME_SIZE);

    let mut frame: FrameBuf = [0; FRAME_SIZE];
    frame[5760] = 0x51;
    frame[5816] = 0xC0;
    frame[5821] = 0x40;

    assert_eq!(frame.pack(0)[0], 0x51);
    assert_eq!(frame.sub_id()[0], 0xC0);
    assert_eq!(frame.main_id()[1], 0x40);
}
