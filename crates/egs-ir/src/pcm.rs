//! Mono PCM buffers.

use alloc::vec::Vec;

/// A mono buffer of f32 samples in `[-1, 1]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl PcmBuffer {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self { sample_rate, samples }
    }

    /// A zero-filled buffer of `frames` samples.
    pub fn silent(sample_rate: u32, frames: usize) -> Self {
        Self { sample_rate, samples: alloc::vec![0.0; frames] }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(libm::fabsf(*s)))
    }
}
