//! Data structures representing the tape frame format.
//!
//! Contains the fixed frame layout, the main-id and sub-id words, subcode
//! packs and the per-frame metadata built from them.

pub mod frame;
pub mod frame_info;
pub mod ids;
pub mod subcode;
