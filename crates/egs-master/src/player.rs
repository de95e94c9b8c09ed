//! Real-time playback on the default audio device.
//!
//! A [`Player`] owns an audio thread running a [`Controller`] over a
//! software context. Requests reach the thread through a lock-free
//! command ring; the song playhead comes back through an atomic.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use egs_audio::{AudioOutput, CpalOutput, SoftwareContext, BLOCK};
use egs_engine::{EngineSettings, Frame, ResourceStore};
use log::{error, info, warn};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::controller::Controller;

/// Pending requests the ring holds before `send` starts refusing.
const COMMAND_CAPACITY: usize = 64;

/// A request for the audio thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    PlayOneShot(u32),
    PlaySong { resource_id: u32, force_restart: bool, repeat: bool },
    StopSong,
    SetPlayhead(f64),
}

/// Handle to a running audio thread.
pub struct Player {
    commands: HeapProd<Command>,
    stop_signal: Arc<AtomicBool>,
    /// Song playhead as `f64` bits
    playhead: Arc<AtomicU64>,
    song_active: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Player {
    /// Open the default device and start the audio thread.
    pub fn spawn<S: ResourceStore + Send + 'static>(store: S, settings: EngineSettings) -> Self {
        let (commands, queue) = HeapRb::<Command>::new(COMMAND_CAPACITY).split();
        let stop_signal = Arc::new(AtomicBool::new(false));
        let playhead = Arc::new(AtomicU64::new(0f64.to_bits()));
        let song_active = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let shared = Shared {
            stop_signal: stop_signal.clone(),
            playhead: playhead.clone(),
            song_active: song_active.clone(),
            finished: finished.clone(),
        };
        let thread = std::thread::spawn(move || {
            audio_thread(store, settings, queue, &shared);
            shared.finished.store(true, Ordering::Relaxed);
        });

        Self { commands, stop_signal, playhead, song_active, finished, thread: Some(thread) }
    }

    /// Queue a command. Returns false if the queue is full or the thread is gone.
    pub fn send(&mut self, command: Command) -> bool {
        if self.is_finished() {
            return false;
        }
        if self.commands.try_push(command).is_err() {
            warn!("Command queue full, dropping {:?}", command);
            return false;
        }
        true
    }

    pub fn play_one_shot(&mut self, resource_id: u32) -> bool {
        self.send(Command::PlayOneShot(resource_id))
    }

    pub fn play_song(&mut self, resource_id: u32, force_restart: bool, repeat: bool) -> bool {
        self.send(Command::PlaySong { resource_id, force_restart, repeat })
    }

    pub fn stop_song(&mut self) -> bool {
        self.send(Command::StopSong)
    }

    pub fn set_song_playhead(&mut self, seconds: f64) -> bool {
        self.send(Command::SetPlayhead(seconds))
    }

    /// Song time as last published by the audio thread.
    pub fn song_playhead(&self) -> f64 {
        f64::from_bits(self.playhead.load(Ordering::Relaxed))
    }

    /// Whether a song is playing and has not been stopped.
    pub fn is_song_playing(&self) -> bool {
        self.song_active.load(Ordering::Relaxed)
    }

    /// Whether the audio thread has exited.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    /// Stop the audio thread and wait for it.
    pub fn shutdown(&mut self) {
        self.stop_signal.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Shared {
    stop_signal: Arc<AtomicBool>,
    playhead: Arc<AtomicU64>,
    song_active: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

fn apply<S: ResourceStore>(controller: &mut Controller<SoftwareContext, S>, command: Command) {
    let result = match command {
        Command::PlayOneShot(id) => controller.play_one_shot(id),
        Command::PlaySong { resource_id, force_restart, repeat } => {
            controller.play_song(resource_id, force_restart, repeat)
        }
        Command::StopSong => {
            controller.stop_song();
            Ok(())
        }
        Command::SetPlayhead(seconds) => controller.set_song_playhead(seconds),
    };
    if let Err(e) = result {
        warn!("{:?} failed: {}", command, e);
    }
}

/// Hand every frame to `output`, spinning while its queue is full.
fn write_blocking<O: AudioOutput>(output: &mut O, frames: &[Frame]) {
    let mut written = 0;
    while written < frames.len() {
        let accepted = output.write(&frames[written..]);
        if accepted == 0 {
            std::hint::spin_loop();
        }
        written += accepted;
    }
}

fn audio_thread<S: ResourceStore>(
    store: S,
    settings: EngineSettings,
    mut queue: HeapCons<Command>,
    shared: &Shared,
) {
    let (mut output, consumer) = match CpalOutput::new() {
        Ok(pair) => pair,
        Err(e) => {
            error!("No audio output: {}", e);
            return;
        }
    };
    if let Err(e) = output.build_stream(consumer) {
        error!("No audio stream: {}", e);
        return;
    }

    let sample_rate = output.sample_rate();
    let mut controller = Controller::new(SoftwareContext::new(sample_rate), store, settings);
    if let Err(e) = output.start() {
        error!("Audio start failed: {}", e);
        return;
    }
    info!("Audio thread running at {} Hz", sample_rate);

    let mut block = [0.0f32; BLOCK];
    let mut frames = [Frame::silence(); BLOCK];
    while !shared.stop_signal.load(Ordering::Relaxed) {
        while let Some(command) = queue.try_pop() {
            apply(&mut controller, command);
        }
        controller.update();

        controller.context_mut().process(&mut block);
        for (frame, &sample) in frames.iter_mut().zip(&block) {
            *frame = Frame::from_f32(sample);
        }
        write_blocking(&mut output, &frames);

        shared.playhead.store(controller.get_song_playhead().to_bits(), Ordering::Relaxed);
        shared.song_active.store(controller.current_song().is_some(), Ordering::Relaxed);
    }

    controller.clear();
    // Let the device drain before the stream drops
    frames.fill(Frame::silence());
    for _ in 0..(sample_rate as usize / 10).div_ceil(BLOCK) {
        write_blocking(&mut output, &frames);
    }
    let _ = output.stop();
    shared.song_active.store(false, Ordering::Relaxed);
}
