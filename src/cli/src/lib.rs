//! PixelProps CLI - dry-run spoof decisions against a simulated device.

pub mod commands;
pub mod output;
