pub mod command;
pub mod extract;
pub mod info;
pub mod merge;
pub mod progress;
