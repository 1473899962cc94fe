//! Music activity detection: windowed energy plus hysteresis.

pub mod energy;
pub mod hysteresis;

pub use energy::SampleWindow;
pub use hysteresis::{ClassifierConfig, PlaybackClassifier, Verdict};
