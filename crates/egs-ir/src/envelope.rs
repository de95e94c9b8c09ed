//! Velocity-interpolated piecewise-linear control curves.
//!
//! An `Envelope` stores two curve variants, one for velocity 0 ("low") and
//! one for velocity 1 ("high"). A note's curve is the linear blend of the
//! two at its velocity. Point times are deltas from the previous point.

use alloc::vec::Vec;

/// Flag bit: an explicit low initial value follows.
pub const FLAG_INITIAL_LOW: u8 = 0x01;
/// Flag bit: high-velocity data is present.
pub const FLAG_HIGH: u8 = 0x02;
/// Flag bit: a sustain point index is present.
pub const FLAG_SUSTAIN: u8 = 0x04;

/// One stored envelope point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnvelopePoint {
    /// Seconds since the previous point at velocity 0
    pub time_low: f32,
    /// Seconds since the previous point at velocity 1
    pub time_high: f32,
    /// Value at velocity 0
    pub value_low: f32,
    /// Value at velocity 1
    pub value_high: f32,
}

/// An absolute-time breakpoint produced by [`Envelope::apply`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Breakpoint {
    /// Absolute time in seconds
    pub t: f64,
    /// Value at `t`
    pub v: f32,
}

/// A decoded envelope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Envelope {
    /// Raw flag byte as stored
    pub flags: u8,
    pub initial_low: f32,
    pub initial_high: f32,
    /// Index into `points` where the curve holds until note-off.
    pub sustain: Option<usize>,
    pub points: Vec<EnvelopePoint>,
}

/// Linear interpolation from `a` to `b` by `t`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

impl Envelope {
    /// A constant envelope with no points.
    pub fn constant(value: f32) -> Self {
        Self {
            flags: FLAG_INITIAL_LOW,
            initial_low: value,
            initial_high: value,
            sustain: None,
            points: Vec::new(),
        }
    }

    /// Whether the high-velocity curve is stored (otherwise velocity is ignored).
    pub fn has_high(&self) -> bool {
        self.flags & FLAG_HIGH != 0
    }

    /// Build flags for the given optional parts.
    pub fn flags_for(initial_low: bool, high: bool, sustain: bool) -> u8 {
        let mut flags = 0;
        if initial_low {
            flags |= FLAG_INITIAL_LOW;
        }
        if high {
            flags |= FLAG_HIGH;
        }
        if sustain {
            flags |= FLAG_SUSTAIN;
        }
        flags
    }

    /// Evaluate the curve for one note.
    ///
    /// Returns breakpoints in absolute seconds, starting at `when`. When the
    /// sustain point is reached before `when + duration`, an extra flat
    /// breakpoint holds its value until `when + duration`, and later points
    /// continue from there.
    pub fn apply(&self, velocity: f32, when: f64, duration: f64) -> Vec<Breakpoint> {
        let vel = if self.has_high() { velocity.clamp(0.0, 1.0) } else { 0.0 };
        let release = when + duration;

        let mut out = Vec::with_capacity(self.points.len() + 2);
        out.push(Breakpoint { t: when, v: lerp(self.initial_low, self.initial_high, vel) });

        let mut t = when;
        for (i, p) in self.points.iter().enumerate() {
            t += lerp(p.time_low, p.time_high, vel).max(0.0) as f64;
            let v = lerp(p.value_low, p.value_high, vel);
            out.push(Breakpoint { t, v });
            if self.sustain == Some(i) && release > t {
                out.push(Breakpoint { t: release, v });
                t = release;
            }
        }
        out
    }

    /// Multiply every value by `factor`.
    pub fn scale(&mut self, factor: f32) {
        self.map_values(|v| v * factor);
    }

    /// Add `offset` to every value.
    pub fn bias(&mut self, offset: f32) {
        self.map_values(|v| v + offset);
    }

    /// Whether every stored value equals `value` (within 1e-6).
    pub fn is_flat_at(&self, value: f32) -> bool {
        let eq = |v: f32| libm::fabsf(v - value) < 1e-6;
        eq(self.initial_low)
            && eq(self.initial_high)
            && self.points.iter().all(|p| eq(p.value_low) && eq(p.value_high))
    }

    fn map_values(&mut self, f: impl Fn(f32) -> f32) {
        self.initial_low = f(self.initial_low);
        self.initial_high = f(self.initial_high);
        for p in &mut self.points {
            p.value_low = f(p.value_low);
            p.value_high = f(p.value_high);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn point(t: f32, v: f32) -> EnvelopePoint {
        EnvelopePoint { time_low: t, time_high: t, value_low: v, value_high: v }
    }

    fn adsr() -> Envelope {
        Envelope {
            flags: Envelope::flags_for(false, false, true),
            initial_low: 0.0,
            initial_high: 0.0,
            sustain: Some(1),
            points: vec![point(0.01, 1.0), point(0.1, 0.5), point(0.2, 0.0)],
        }
    }

    #[test]
    fn flat_envelope_is_single_breakpoint() {
        let env = Envelope::constant(0.75);
        let bps = env.apply(1.0, 2.0, 1.0);
        assert_eq!(bps, vec![Breakpoint { t: 2.0, v: 0.75 }]);
    }

    #[test]
    fn times_accumulate_from_when() {
        let mut env = adsr();
        env.sustain = None;
        let bps = env.apply(0.5, 1.0, 0.0);
        assert_eq!(bps.len(), 4);
        assert!((bps[1].t - 1.01).abs() < 1e-6);
        assert!((bps[2].t - 1.11).abs() < 1e-6);
        assert!((bps[3].t - 1.31).abs() < 1e-6);
    }

    #[test]
    fn sustain_inserts_hold_until_release() {
        let bps = adsr().apply(0.0, 0.0, 1.0);
        // init, attack, decay, hold, release
        assert_eq!(bps.len(), 5);
        assert_eq!(bps[3], Breakpoint { t: 1.0, v: 0.5 });
        assert!((bps[4].t - 1.2).abs() < 1e-6);
        assert_eq!(bps[4].v, 0.0);
    }

    #[test]
    fn sustain_skipped_when_release_already_passed() {
        let bps = adsr().apply(0.0, 0.0, 0.05);
        assert_eq!(bps.len(), 4);
    }

    #[test]
    fn velocity_ignored_without_high_curve() {
        let env = adsr();
        assert_eq!(env.apply(0.0, 0.0, 0.5), env.apply(1.0, 0.0, 0.5));
        assert_eq!(env.apply(0.3, 0.0, 0.5), env.apply(0.9, 0.0, 0.5));
    }

    #[test]
    fn velocity_blends_low_and_high() {
        let env = Envelope {
            flags: Envelope::flags_for(true, true, false),
            initial_low: 0.0,
            initial_high: 1.0,
            sustain: None,
            points: vec![EnvelopePoint {
                time_low: 1.0,
                time_high: 3.0,
                value_low: 0.2,
                value_high: 0.6,
            }],
        };
        let bps = env.apply(0.5, 0.0, 0.0);
        assert_eq!(bps[0].v, 0.5);
        assert!((bps[1].t - 2.0).abs() < 1e-6);
        assert!((bps[1].v - 0.4).abs() < 1e-6);
    }

    #[test]
    fn scale_and_bias_recenters_pitch() {
        let mut env = Envelope::constant(0.5);
        env.points.push(point(0.1, 1.0));
        env.bias(-0.5);
        env.scale(2400.0);
        assert_eq!(env.initial_low, 0.0);
        assert_eq!(env.points[0].value_low, 1200.0);
    }

    #[test]
    fn flat_detection() {
        let mut env = Envelope::constant(0.5);
        env.points.push(point(0.2, 0.5));
        assert!(env.is_flat_at(0.5));
        env.points.push(point(0.2, 0.6));
        assert!(!env.is_flat_at(0.5));
    }
}
