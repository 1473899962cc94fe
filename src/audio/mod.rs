//! Audio input: recorder processes and raw PCM decoding.

pub mod capture;
pub mod reader;

pub use capture::{Backend, Capture};
pub use reader::SampleReader;
