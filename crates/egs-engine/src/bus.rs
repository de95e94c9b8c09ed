//! Bus: one playing song.
//!
//! A bus owns a document, one channel per configured id, an event cursor
//! position and the shared output gain. `update` is called on a steady tick
//! and schedules every event due before the look-ahead horizon;
//! `signal_pending` tells the owner when the bus can be dropped.

use std::sync::Arc;

use egs_formats::{summarize, EventCursor};
use egs_ir::{Document, Event, NodeId, ParamKind};
use log::{debug, trace, warn};

use crate::context::{AudioContext, GraphError};
use crate::settings::EngineSettings;
use crate::synth::Channel;
use crate::EngineError;

/// Scheduler and lifecycle of one song.
#[derive(Debug)]
pub struct Bus {
    document: Arc<Document>,
    repeat: bool,
    /// Indexed by channel id; `None` for absent or silent channels.
    channels: Vec<Option<Channel>>,
    /// Byte offset of the next undecoded event
    position: usize,
    /// Absolute time the next event is due
    next_event_time: f64,
    /// Absolute time corresponding to song time zero
    start_time: f64,
    /// Sum of delays over one pass of the stream
    length: f64,
    output: NodeId,
    /// Outputs replaced by a seek, with the time their fade completes
    retired: Vec<(NodeId, f64)>,
    cancelled: bool,
    finished_events: bool,
    settings: EngineSettings,
}

impl Bus {
    /// Build the channels and connect a fresh output to the destination.
    ///
    /// The first event is due `start_delay` after the current clock.
    pub fn new<C: AudioContext>(
        document: Arc<Document>,
        repeat: bool,
        ctx: &mut C,
        settings: &EngineSettings,
    ) -> Result<Self, EngineError> {
        let rate = ctx.sample_rate();
        let mut channels: Vec<Option<Channel>> = (0..document.channel_span()).map(|_| None).collect();
        for config in &document.channels {
            channels[config.id as usize] = Channel::new(config, rate, settings)?;
        }

        let destination = ctx.destination();
        let output = ctx.create_gain(1.0)?;
        if let Err(e) = ctx.connect(output, destination) {
            ctx.disconnect(output);
            return Err(e.into());
        }

        let start = ctx.now() + settings.start_delay;
        let length = summarize(&document.events).length;
        debug!(
            "Bus connected: {} channels, {:.3}s per pass, repeat={}",
            channels.iter().flatten().count(),
            length,
            repeat
        );
        Ok(Self {
            document,
            repeat,
            channels,
            position: 0,
            next_event_time: start,
            start_time: start,
            length,
            output,
            retired: Vec::new(),
            cancelled: false,
            finished_events: false,
            settings: settings.clone(),
        })
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether a non-repeating stream has been read to its end.
    pub fn finished_events(&self) -> bool {
        self.finished_events
    }

    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    /// Byte offset of the cursor into the event stream.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn output(&self) -> NodeId {
        self.output
    }

    pub fn channel(&self, id: u8) -> Option<&Channel> {
        self.channels.get(id as usize).and_then(|c| c.as_ref())
    }

    /// Voices alive across all channels.
    pub fn voice_count(&self) -> usize {
        self.channels.iter().flatten().map(Channel::voice_count).sum()
    }

    /// Schedule every event due before `thru`.
    ///
    /// Notes on absent channels are ignored. A note that fails to build is
    /// logged and skipped; the stream carries on.
    pub fn update<C: AudioContext>(&mut self, ctx: &mut C, thru: f64) {
        let document = Arc::clone(&self.document);
        let mut cursor = EventCursor::at(&document.events, self.position);
        let now = ctx.now();

        while !self.finished_events && self.next_event_time < thru {
            match cursor.next_event() {
                Some(Event::Delay { seconds }) => self.next_event_time += seconds,
                Some(Event::Note { channel, note, velocity, duration }) => {
                    let when = self.next_event_time;
                    let Some(target) = self.channels.get_mut(channel as usize).and_then(|c| c.as_mut()) else {
                        continue;
                    };
                    if let Err(e) = target.play_note(ctx, self.output, now, when, note, velocity, duration) {
                        warn!("Dropped note {} on channel {}: {}", note, channel, e);
                    }
                }
                Some(Event::Wheel { .. }) => {}
                Some(Event::Future(bytes)) => trace!("Skipped reserved opcode {:#04x}", bytes.first().copied().unwrap_or(0)),
                None if self.repeat => {
                    cursor.reset();
                    self.next_event_time += self.settings.loop_epsilon;
                    debug!("Bus looped at {:.3}s", self.next_event_time);
                }
                None => {
                    self.finished_events = true;
                    debug!("Bus reached end of events");
                }
            }
        }
        self.position = cursor.position();
    }

    /// Schedule with the configured look-ahead past the current clock.
    pub fn tick<C: AudioContext>(&mut self, ctx: &mut C) {
        let thru = ctx.now() + self.settings.lookahead;
        self.update(ctx, thru);
    }

    /// Reap ended voices and report whether the bus is still alive.
    ///
    /// Returns false once a cancelled bus has faded to silence, or once a
    /// finished stream has no voices left.
    pub fn signal_pending<C: AudioContext>(&mut self, ctx: &mut C) -> bool {
        for channel in self.channels.iter_mut().flatten() {
            channel.reap(ctx);
        }
        self.reap_retired(ctx);

        if self.cancelled && ctx.param_value(self.output, ParamKind::Gain) <= 0.0 {
            debug!("Bus faded out");
            return false;
        }
        if self.finished_events {
            if self.channels.iter().flatten().all(Channel::is_finished) {
                debug!("Bus finished");
                return false;
            }
            for slot in &mut self.channels {
                if slot.as_ref().is_some_and(Channel::is_finished) {
                    *slot = None;
                }
            }
        }
        true
    }

    /// Fade the output to zero over `fade` seconds. Voices keep sounding
    /// under the fade.
    pub fn cancel<C: AudioContext>(&mut self, ctx: &mut C, fade: f64) {
        let now = ctx.now();
        ramp_from_current(ctx, self.output, 0.0, now, now + fade);
        self.cancelled = true;
        debug!("Bus cancelled, fading over {:.3}s", fade);
    }

    /// Undo a cancel that has not yet faded out completely.
    ///
    /// Returns false if the bus was not cancelled or is already silent.
    pub fn uncancel<C: AudioContext>(&mut self, ctx: &mut C) -> bool {
        if !self.cancelled || ctx.param_value(self.output, ParamKind::Gain) <= 0.0 {
            return false;
        }
        let now = ctx.now();
        ramp_from_current(ctx, self.output, 1.0, now, now + self.settings.uncancel_ramp);
        self.cancelled = false;
        true
    }

    /// Seek to `time` seconds of song time.
    ///
    /// The current output fades out and a new one fades in. Channels are
    /// cancelled and the cursor is replayed from the start, skipping notes,
    /// until the delays reach `time`. Repeating songs seek within one loop.
    pub fn set_playhead<C: AudioContext>(&mut self, ctx: &mut C, time: f64) -> Result<(), GraphError> {
        let mut time = time.max(0.0);
        if self.repeat && self.length > 0.0 {
            time %= self.length + self.settings.loop_epsilon;
        }
        let now = ctx.now();
        let fade_end = now + self.settings.seek_crossfade;

        let destination = ctx.destination();
        let output = ctx.create_gain(0.0)?;
        if let Err(e) = ctx.connect(output, destination) {
            ctx.disconnect(output);
            return Err(e);
        }
        ctx.set_value_at_time(output, ParamKind::Gain, 0.0, now);
        ctx.linear_ramp_to_value_at_time(output, ParamKind::Gain, 1.0, fade_end);

        ramp_from_current(ctx, self.output, 0.0, now, fade_end);
        self.retired.push((self.output, fade_end));
        self.output = output;

        let fade = self.settings.voice_fade;
        for channel in self.channels.iter_mut().flatten() {
            channel.cancel(ctx, fade);
        }

        let document = Arc::clone(&self.document);
        let mut cursor = EventCursor::new(&document.events);
        let mut elapsed = 0.0;
        while elapsed < time {
            match cursor.next_event() {
                Some(Event::Delay { seconds }) => elapsed += seconds,
                Some(_) => {}
                None => {
                    elapsed = time;
                    break;
                }
            }
        }

        self.position = cursor.position();
        self.next_event_time = now + (elapsed - time);
        self.start_time = now - time;
        self.finished_events = false;
        self.cancelled = false;
        debug!("Bus seek to {:.3}s", time);
        Ok(())
    }

    /// Seconds of song time at the current clock, wrapped for repeating songs.
    pub fn get_playhead<C: AudioContext>(&self, ctx: &C) -> f64 {
        let elapsed = (ctx.now() - self.start_time).max(0.0);
        let period = self.length + self.settings.loop_epsilon;
        if self.repeat && self.length > 0.0 {
            elapsed % period
        } else {
            elapsed
        }
    }

    /// Disconnect every node this bus created.
    pub fn teardown<C: AudioContext>(&mut self, ctx: &mut C) {
        for channel in self.channels.iter_mut().flatten() {
            channel.teardown(ctx);
        }
        for (node, _) in self.retired.drain(..) {
            ctx.disconnect(node);
        }
        ctx.disconnect(self.output);
    }

    fn reap_retired<C: AudioContext>(&mut self, ctx: &mut C) {
        let now = ctx.now();
        self.retired.retain(|&(node, until)| {
            if until <= now {
                ctx.disconnect(node);
                false
            } else {
                true
            }
        });
    }
}

/// Ramp a gain from wherever it is now to `target` at `end`.
fn ramp_from_current<C: AudioContext>(ctx: &mut C, node: NodeId, target: f32, now: f64, end: f64) {
    let current = ctx.param_value(node, ParamKind::Gain);
    ctx.cancel_scheduled_values(node, ParamKind::Gain, now);
    ctx.set_value_at_time(node, ParamKind::Gain, current, now);
    ctx.linear_ramp_to_value_at_time(node, ParamKind::Gain, target, end);
}
