//! Debounced play/silence classification.
//!
//! Each variance sample is one "tick" (one window of audio). Turning on needs
//! an unbroken run of loud ticks; turning off needs the quiet counter to
//! accumulate past the idle threshold, and every loud tick pays one back.

/// Hysteresis counters, both bounded to `[0, horizon]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionWindow {
    horizon: u32,
    consecutive_playing: u32,
    not_playing: u32,
}

impl DecisionWindow {
    pub fn new(horizon: u32) -> Self {
        Self {
            horizon,
            consecutive_playing: 0,
            not_playing: 0,
        }
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    #[cfg(test)]
    pub fn consecutive_playing(&self) -> u32 {
        self.consecutive_playing
    }

    #[cfg(test)]
    pub fn not_playing(&self) -> u32 {
        self.not_playing
    }

    fn record(&mut self, loud: bool) {
        if loud {
            self.consecutive_playing = (self.consecutive_playing + 1).min(self.horizon);
            self.not_playing = self.not_playing.saturating_sub(1);
        } else {
            self.consecutive_playing = 0;
            self.not_playing = (self.not_playing + 1).min(self.horizon);
        }
    }
}

/// Thresholds for the classifier, in ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    pub variance_threshold: f64,
    pub playing_ticks: u32,
    pub idle_ticks: u32,
}

/// Result of classifying one variance sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub variance: f64,
    pub loud: bool,
    pub consecutive_playing: u32,
    pub not_playing: u32,
    pub turn_on: bool,
    pub turn_off: bool,
}

#[derive(Debug, Clone)]
pub struct PlaybackClassifier {
    config: ClassifierConfig,
    window: DecisionWindow,
}

impl PlaybackClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let horizon = config.idle_ticks.saturating_add(config.playing_ticks);
        Self {
            config,
            window: DecisionWindow::new(horizon),
        }
    }

    pub fn window(&self) -> &DecisionWindow {
        &self.window
    }

    /// Feed one variance sample and return whether it counted as loud.
    pub fn classify(&mut self, variance: f64) -> bool {
        let loud = variance > self.config.variance_threshold;
        self.window.record(loud);
        loud
    }

    /// Classify and snapshot both predicates in one go.
    pub fn observe(&mut self, variance: f64) -> Verdict {
        let loud = self.classify(variance);
        Verdict {
            variance,
            loud,
            consecutive_playing: self.window.consecutive_playing,
            not_playing: self.window.not_playing,
            turn_on: self.good_to_turn_on(),
            turn_off: self.good_to_turn_off(),
        }
    }

    pub fn good_to_turn_on(&self) -> bool {
        self.window.consecutive_playing >= self.config.playing_ticks
    }

    pub fn good_to_turn_off(&self) -> bool {
        self.window.not_playing >= self.config.idle_ticks
    }
}
