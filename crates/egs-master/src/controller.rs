//! Song and sound-effect control over any audio context.

use std::collections::BTreeMap;
use std::sync::Arc;

use egs_engine::{AudioContext, Bus, EngineError, EngineSettings, ResourceStore, SoundPool};
use egs_formats::{detect_format, split_egs, FormatError};
use egs_ir::{Document, NodeId, SoundFormat};
use log::{debug, warn};

/// One-shot sounds always come from this sub-index of their resource.
pub const ONE_SHOT_SUB_INDEX: u16 = 0;

/// A one-shot sound currently playing.
struct OneShot {
    source: NodeId,
    gain: NodeId,
}

/// The song currently requested.
struct SongSlot {
    resource_id: u32,
    bus: Bus,
}

/// Owns an audio context, a resource store and everything playing on them.
///
/// Call [`Controller::update`] on a steady tick; it schedules ahead and
/// releases buses and sounds that have finished.
pub struct Controller<C: AudioContext, S: ResourceStore> {
    ctx: C,
    store: S,
    settings: EngineSettings,
    pool: SoundPool,
    /// Decoded songs by resource id
    documents: BTreeMap<u32, Arc<Document>>,
    song: Option<SongSlot>,
    /// Stopped or replaced songs still fading out
    fading: Vec<SongSlot>,
    one_shots: Vec<OneShot>,
}

impl<C: AudioContext, S: ResourceStore> Controller<C, S> {
    pub fn new(ctx: C, store: S, settings: EngineSettings) -> Self {
        Self {
            ctx,
            store,
            pool: SoundPool::new(settings.clone()),
            settings,
            documents: BTreeMap::new(),
            song: None,
            fading: Vec::new(),
            one_shots: Vec::new(),
        }
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    pub fn pool(&self) -> &SoundPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut SoundPool {
        &mut self.pool
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Resource id of the song being played, if any.
    pub fn current_song(&self) -> Option<u32> {
        self.song.as_ref().map(|s| s.resource_id)
    }

    /// Buses alive, fading ones included.
    pub fn bus_count(&self) -> usize {
        self.fading.len() + usize::from(self.song.is_some())
    }

    pub fn one_shot_count(&self) -> usize {
        self.one_shots.len()
    }

    // --- One-shot sounds ---

    /// Play a sound effect once, straight to the destination.
    ///
    /// Resources with no PCM form play nothing.
    pub fn play_one_shot(&mut self, resource_id: u32) -> Result<(), EngineError> {
        let Some(buffer) = self.pool.resolve(&self.ctx, &self.store, resource_id, ONE_SHOT_SUB_INDEX)? else {
            debug!("Sound {} has no PCM form", resource_id);
            return Ok(());
        };
        let now = self.ctx.now();
        let destination = self.ctx.destination();
        let source = self.ctx.create_buffer_source(buffer, false)?;
        let gain = match self.ctx.create_gain(1.0) {
            Ok(gain) => gain,
            Err(e) => {
                self.ctx.disconnect(source);
                return Err(e.into());
            }
        };
        let wired = self.ctx.connect(source, gain).and_then(|_| self.ctx.connect(gain, destination));
        if let Err(e) = wired {
            self.ctx.disconnect(source);
            self.ctx.disconnect(gain);
            return Err(e.into());
        }
        self.ctx.start(source, now);
        self.one_shots.push(OneShot { source, gain });
        Ok(())
    }

    // --- Songs ---

    fn document(&mut self, resource_id: u32) -> Result<Arc<Document>, EngineError> {
        if let Some(document) = self.documents.get(&resource_id) {
            return Ok(Arc::clone(document));
        }
        let bytes = self
            .store
            .blob(resource_id, 0)
            .ok_or(EngineError::MissingResource { resource_id, sub_index: 0 })?;
        let document = match detect_format(&bytes) {
            SoundFormat::Egs => Arc::new(split_egs(&bytes)?),
            format => return Err(FormatError::UnsupportedFormat(format).into()),
        };
        self.documents.insert(resource_id, Arc::clone(&document));
        Ok(document)
    }

    /// Start a song.
    ///
    /// Requesting the song already playing does nothing unless
    /// `force_restart` is set. A song still fading out after a stop is
    /// brought back instead of restarted. Any other current song fades out.
    pub fn play_song(&mut self, resource_id: u32, force_restart: bool, repeat: bool) -> Result<(), EngineError> {
        if !force_restart {
            if self.current_song() == Some(resource_id) {
                return Ok(());
            }
            if let Some(index) = self.fading.iter().rposition(|s| s.resource_id == resource_id) {
                if self.fading[index].bus.uncancel(&mut self.ctx) {
                    self.stop_song();
                    let slot = self.fading.remove(index);
                    debug!("Song {} resumed", resource_id);
                    self.song = Some(slot);
                    return Ok(());
                }
            }
        }

        let document = self.document(resource_id)?;
        let mut bus = Bus::new(document, repeat, &mut self.ctx, &self.settings)?;
        self.stop_song();
        bus.tick(&mut self.ctx);
        debug!("Playing song {} (repeat={})", resource_id, repeat);
        self.song = Some(SongSlot { resource_id, bus });
        Ok(())
    }

    /// Fade out the current song.
    pub fn stop_song(&mut self) {
        if let Some(mut slot) = self.song.take() {
            slot.bus.cancel(&mut self.ctx, self.settings.stop_fade);
            self.fading.push(slot);
        }
    }

    pub fn set_song_playhead(&mut self, seconds: f64) -> Result<(), EngineError> {
        if let Some(slot) = &mut self.song {
            slot.bus.set_playhead(&mut self.ctx, seconds)?;
            slot.bus.tick(&mut self.ctx);
        }
        Ok(())
    }

    /// Song time of the current song, or 0 when nothing plays.
    pub fn get_song_playhead(&self) -> f64 {
        self.song.as_ref().map_or(0.0, |s| s.bus.get_playhead(&self.ctx))
    }

    // --- Tick ---

    /// Schedule ahead on every bus and release whatever has finished.
    pub fn update(&mut self) {
        let ctx = &mut self.ctx;

        if let Some(slot) = &mut self.song {
            slot.bus.tick(ctx);
            if !slot.bus.signal_pending(ctx) {
                debug!("Song {} finished", slot.resource_id);
                slot.bus.teardown(ctx);
                self.song = None;
            }
        }

        self.fading.retain_mut(|slot| {
            slot.bus.tick(ctx);
            if slot.bus.signal_pending(ctx) {
                true
            } else {
                slot.bus.teardown(ctx);
                false
            }
        });

        self.one_shots.retain(|shot| {
            if ctx.has_ended(shot.source) {
                ctx.disconnect(shot.source);
                ctx.disconnect(shot.gain);
                false
            } else {
                true
            }
        });
    }

    /// Stop everything immediately and disconnect all nodes.
    pub fn clear(&mut self) {
        if let Some(mut slot) = self.song.take() {
            slot.bus.teardown(&mut self.ctx);
        }
        for mut slot in self.fading.drain(..) {
            slot.bus.teardown(&mut self.ctx);
        }
        for shot in self.one_shots.drain(..) {
            self.ctx.disconnect(shot.source);
            self.ctx.disconnect(shot.gain);
        }
    }

    /// Forget a resource's decoded song and pooled sounds.
    pub fn remove_resource(&mut self, resource_id: u32) {
        if self.current_song() == Some(resource_id) {
            warn!("Removing resource {} while its song plays", resource_id);
        }
        self.documents.remove(&resource_id);
        self.pool.remove_resource(resource_id);
    }
}
