//! The sampling loop: samples in, amp power decisions out.
//!
//! Runs on a single blocking thread. Everything here is synchronous and cheap;
//! the only thing that touches the network is the actuator, and it only spawns.

use std::io::Read;

use tracing::{debug, info};

use crate::activity::{ClassifierConfig, PlaybackClassifier, SampleWindow, Verdict};
use crate::amp::{Actuator, Dispatch, Power};
use crate::audio::SampleReader;

/// What happened on one full window of audio.
#[derive(Debug)]
pub struct Tick {
    pub verdict: Verdict,
    pub dispatch: Dispatch,
}

pub struct Monitor {
    window: SampleWindow,
    classifier: PlaybackClassifier,
    actuator: Actuator,
}

impl Monitor {
    pub fn new(window_samples: usize, classifier: ClassifierConfig, actuator: Actuator) -> Self {
        let window = SampleWindow::new(window_samples);
        let classifier = PlaybackClassifier::new(classifier);
        debug!(
            window_samples = window.capacity(),
            horizon = classifier.window().horizon(),
            "Monitor ready"
        );
        Self {
            window,
            classifier,
            actuator,
        }
    }

    #[cfg(test)]
    pub fn actuator(&self) -> &Actuator {
        &self.actuator
    }

    /// Feed one sample. Returns a tick whenever the window has been refilled.
    pub fn push(&mut self, sample: i16) -> Option<Tick> {
        self.window.push(sample);
        if !self.window.is_ready() {
            return None;
        }

        let verdict = self.classifier.observe(self.window.variance());
        info!(
            variance = verdict.variance,
            playing = verdict.loud,
            consecutive_playing = verdict.consecutive_playing,
            not_playing = verdict.not_playing,
            "Variance sample"
        );

        let dispatch = if verdict.turn_on {
            self.actuator.set_desired_state(Power::On)
        } else if verdict.turn_off {
            self.actuator.set_desired_state(Power::Standby)
        } else {
            Dispatch::default()
        };

        Some(Tick { verdict, dispatch })
    }

    /// Consume samples until the stream fails. Only ever returns an error.
    pub fn run<R: Read>(&mut self, reader: &mut SampleReader<R>) -> anyhow::Result<()> {
        loop {
            let sample = reader.next_sample()?;
            let Some(tick) = self.push(sample) else {
                continue;
            };
            // Actuations are fire-and-forget; dropping the handles detaches them.
            if !tick.dispatch.is_empty() {
                debug!(
                    tasks = tick.dispatch.tasks.len(),
                    playing = tick.verdict.loud,
                    "Actuations dispatched"
                );
            }
        }
    }
}
