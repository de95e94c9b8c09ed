//! Sound pool: lazily decoded one-shot sounds.
//!
//! Entries are kept sorted by `(resource_id, sub_index)`. A blob is stored
//! raw when installed or first requested, and replaced in place by its PCM
//! the first time it is resolved.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use egs_formats::{detect_format, load_wav, split_egs, FormatError};
use egs_ir::{PcmBuffer, SoundFormat};
use log::debug;

use crate::context::AudioContext;
use crate::render::render_blob;
use crate::settings::EngineSettings;
use crate::EngineError;

/// Source of raw sound blobs, keyed by resource and sub-index.
pub trait ResourceStore {
    fn blob(&self, resource_id: u32, sub_index: u16) -> Option<Vec<u8>>;
}

impl ResourceStore for HashMap<(u32, u16), Vec<u8>> {
    fn blob(&self, resource_id: u32, sub_index: u16) -> Option<Vec<u8>> {
        self.get(&(resource_id, sub_index)).cloned()
    }
}

impl ResourceStore for BTreeMap<(u32, u16), Vec<u8>> {
    fn blob(&self, resource_id: u32, sub_index: u16) -> Option<Vec<u8>> {
        self.get(&(resource_id, sub_index)).cloned()
    }
}

/// Contents of a pool entry.
#[derive(Clone, Debug, PartialEq)]
pub enum EntryState {
    Raw(Arc<[u8]>),
    Decoded(Arc<PcmBuffer>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PoolEntry {
    pub resource_id: u32,
    pub sub_index: u16,
    pub state: EntryState,
}

impl PoolEntry {
    fn key(&self) -> (u32, u16) {
        (self.resource_id, self.sub_index)
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self.state, EntryState::Decoded(_))
    }
}

/// Sorted registry of one-shot sounds.
#[derive(Debug, Default)]
pub struct SoundPool {
    entries: Vec<PoolEntry>,
    settings: EngineSettings,
}

impl SoundPool {
    pub fn new(settings: EngineSettings) -> Self {
        Self { entries: Vec::new(), settings }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }

    pub fn get(&self, resource_id: u32, sub_index: u16) -> Option<&PoolEntry> {
        self.search(resource_id, sub_index).ok().map(|i| &self.entries[i])
    }

    fn search(&self, resource_id: u32, sub_index: u16) -> Result<usize, usize> {
        self.entries.binary_search_by(|e| e.key().cmp(&(resource_id, sub_index)))
    }

    /// Check a blob's structure and store it raw, replacing any previous entry.
    ///
    /// Blobs that fail to parse, and formats with no PCM form, are rejected.
    pub fn install(&mut self, resource_id: u32, sub_index: u16, bytes: &[u8]) -> Result<(), FormatError> {
        match detect_format(bytes) {
            SoundFormat::Egs => {
                split_egs(bytes)?;
            }
            SoundFormat::Wav => {
                load_wav(bytes)?;
            }
            format => return Err(FormatError::UnsupportedFormat(format)),
        }
        let entry = PoolEntry { resource_id, sub_index, state: EntryState::Raw(Arc::from(bytes)) };
        match self.search(resource_id, sub_index) {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
        Ok(())
    }

    /// Look up a sound, fetching it from `store` on a miss and decoding it
    /// on first use.
    ///
    /// Returns `Ok(None)` for blobs with no PCM form. A failed decode
    /// leaves the entry raw, so a later call retries it.
    pub fn resolve<C: AudioContext, S: ResourceStore + ?Sized>(
        &mut self,
        ctx: &C,
        store: &S,
        resource_id: u32,
        sub_index: u16,
    ) -> Result<Option<Arc<PcmBuffer>>, EngineError> {
        let index = match self.search(resource_id, sub_index) {
            Ok(i) => i,
            Err(i) => {
                let bytes = store
                    .blob(resource_id, sub_index)
                    .ok_or(EngineError::MissingResource { resource_id, sub_index })?;
                debug!("Sound pool miss, inserting {}:{}", resource_id, sub_index);
                self.entries.insert(i, PoolEntry { resource_id, sub_index, state: EntryState::Raw(Arc::from(bytes)) });
                i
            }
        };

        let raw = match &self.entries[index].state {
            EntryState::Decoded(buffer) => return Ok(Some(Arc::clone(buffer))),
            EntryState::Raw(raw) => Arc::clone(raw),
        };
        let decoded = render_blob(ctx, &raw, &self.settings)?;
        if let Some(buffer) = &decoded {
            self.entries[index].state = EntryState::Decoded(Arc::clone(buffer));
        }
        Ok(decoded)
    }

    /// Drop every sub-sound of a resource.
    pub fn remove_resource(&mut self, resource_id: u32) {
        self.entries.retain(|e| e.resource_id != resource_id);
    }
}
