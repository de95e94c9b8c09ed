//! Audio backends for the EGS engine.
//!
//! [`SoftwareContext`] renders the engine's node graphs in software, in
//! real time or offline. [`CpalOutput`] streams rendered frames to the
//! default output device.

mod cpal_backend;
mod software;
mod traits;

pub use cpal_backend::CpalOutput;
pub use software::{SoftwareContext, BLOCK};
pub use traits::{AudioError, AudioOutput};
