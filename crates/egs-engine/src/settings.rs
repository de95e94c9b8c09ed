//! Engine tuning constants.

/// Timing and synthesis settings shared by buses and channels.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    /// How far ahead of the clock events are submitted (seconds)
    pub lookahead: f64,
    /// Fade applied to sounding voices when a channel is cancelled
    pub voice_fade: f64,
    /// Ramp back to full level when a cancelled bus is resumed
    pub uncancel_ramp: f64,
    /// Cross-fade between old and new output on a song seek
    pub seek_crossfade: f64,
    /// Minimum clock advance when a repeating stream wraps
    pub loop_epsilon: f64,
    /// Fade used when a song is stopped or replaced
    pub stop_fade: f64,
    /// Delay between a play request and the first event
    pub start_delay: f64,
    /// Detune range of a full-scale pitch envelope, each direction (cents)
    pub pitch_range_cents: f32,
    /// Band-pass Q of subtractive voices
    pub sub_filter_q: f32,
    /// Length of the looped noise buffer (seconds)
    pub noise_seconds: f32,
    /// Seed of the noise buffer
    pub noise_seed: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lookahead: 2.0,
            voice_fade: 0.2,
            uncancel_ramp: 0.5,
            seek_crossfade: 0.25,
            loop_epsilon: 0.001,
            stop_fade: 1.0,
            start_delay: 0.05,
            pitch_range_cents: 1200.0,
            sub_filter_q: 1.0,
            noise_seconds: 1.0,
            noise_seed: 0x5eed_0e65,
        }
    }
}
