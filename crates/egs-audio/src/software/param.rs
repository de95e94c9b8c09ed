//! Scheduled parameter automation.

/// One scheduled change.
#[derive(Clone, Copy, Debug, PartialEq)]
enum ParamEvent {
    /// Jump to `value` at `time`
    Set { value: f32, time: f64 },
    /// Arrive at `value` at `time`, linearly from the previous event
    Ramp { value: f32, time: f64 },
}

impl ParamEvent {
    fn time(&self) -> f64 {
        match *self {
            ParamEvent::Set { time, .. } | ParamEvent::Ramp { time, .. } => time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            ParamEvent::Set { value, .. } | ParamEvent::Ramp { value, .. } => value,
        }
    }
}

/// A node parameter: a base value plus a time-ordered event list.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct AudioParam {
    base: f32,
    events: Vec<ParamEvent>,
}

impl AudioParam {
    pub fn new(value: f32) -> Self {
        Self { base: value, events: Vec::new() }
    }

    fn insert(&mut self, event: ParamEvent) {
        let at = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(at, event);
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::Set { value, time });
    }

    /// A ramp with nothing before it starts from the value at `now`.
    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64, now: f64) {
        if self.events.is_empty() {
            let current = self.value_at(now);
            self.insert(ParamEvent::Set { value: current, time: now.min(time) });
        }
        self.insert(ParamEvent::Ramp { value, time });
    }

    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    pub fn value_at(&self, time: f64) -> f32 {
        let mut value = self.base;
        let mut from = f64::NEG_INFINITY;
        for event in &self.events {
            if event.time() <= time {
                value = event.value();
                from = event.time();
                continue;
            }
            if let ParamEvent::Ramp { value: target, time: to } = *event {
                if from.is_finite() && to > from {
                    let t = ((time - from) / (to - from)) as f32;
                    value += (target - value) * t;
                }
            }
            break;
        }
        value
    }

    /// Forget events that can no longer affect values at or after `time`.
    pub fn prune(&mut self, time: f64) {
        let past = self.events.partition_point(|e| e.time() <= time);
        if past == 0 {
            return;
        }
        if past == self.events.len() {
            self.base = self.events[past - 1].value();
            self.events.clear();
            return;
        }
        // Keep the last past event as the anchor of any ramp after it.
        self.events.drain(..past - 1);
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_value_without_events() {
        let p = AudioParam::new(0.3);
        assert_eq!(p.value_at(0.0), 0.3);
        assert_eq!(p.value_at(100.0), 0.3);
    }

    #[test]
    fn set_then_ramp_interpolates() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(1.0, 1.0);
        p.linear_ramp_to_value_at_time(0.0, 2.0, 0.0);
        assert_eq!(p.value_at(0.5), 0.0);
        assert_eq!(p.value_at(1.0), 1.0);
        assert!((p.value_at(1.25) - 0.75).abs() < 1e-6);
        assert_eq!(p.value_at(3.0), 0.0);
    }

    #[test]
    fn lone_ramp_starts_from_now() {
        let mut p = AudioParam::new(1.0);
        p.linear_ramp_to_value_at_time(0.0, 2.0, 1.0);
        assert_eq!(p.value_at(1.0), 1.0);
        assert!((p.value_at(1.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn events_stay_ordered() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(2.0, 2.0);
        p.set_value_at_time(1.0, 1.0);
        assert_eq!(p.value_at(1.5), 1.0);
        assert_eq!(p.value_at(2.5), 2.0);
    }

    #[test]
    fn cancel_drops_later_events() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(1.0, 0.0);
        p.linear_ramp_to_value_at_time(0.0, 1.0, 0.0);
        p.cancel_scheduled_values(0.5);
        assert_eq!(p.value_at(0.75), 1.0);
    }

    #[test]
    fn prune_keeps_ramp_anchor() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0);
        p.set_value_at_time(1.0, 1.0);
        p.linear_ramp_to_value_at_time(3.0, 3.0, 0.0);
        p.prune(2.0);
        assert_eq!(p.pending(), 2);
        assert!((p.value_at(2.0) - 2.0).abs() < 1e-6);

        p.prune(5.0);
        assert_eq!(p.pending(), 0);
        assert_eq!(p.value_at(6.0), 3.0);
    }
}
