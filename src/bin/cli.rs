//! egs-cli: inspect, play or render EGS songs and WAV sounds.
//!
//! Usage:
//!   egs-cli path/to/song.egs
//!   egs-cli path/to/song.egs --repeat --seconds 30
//!   egs-cli path/to/song.egs --wav output.wav [--rate 44100]

use egs_formats::{detect_format, load_wav, song_extent, split_egs, summarize};
use egs_ir::{Document, SoundFormat};
use egs_master::{render_to_wav, EngineSettings, Player};
use std::collections::BTreeMap;
use std::io::Write;
use std::time::{Duration, Instant};
use std::{env, fs};

/// Resource id the input file is stored under.
const INPUT_ID: u32 = 0;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let path = args.get(1).unwrap_or_else(|| {
        eprintln!("Usage: egs-cli <file> [--wav output.wav] [--repeat] [--seconds n] [--rate hz]");
        std::process::exit(1);
    });

    let flag_value = |name: &str| args.iter().position(|a| a == name).and_then(|i| args.get(i + 1)).cloned();
    let wav_path = flag_value("--wav");
    let repeat = args.iter().any(|a| a == "--repeat");
    let seconds = flag_value("--seconds").map(|s| {
        s.parse::<f64>().unwrap_or_else(|_| {
            eprintln!("Bad --seconds value: {}", s);
            std::process::exit(1);
        })
    });
    let rate = flag_value("--rate").map_or(44100, |s| {
        s.parse::<u32>().unwrap_or_else(|_| {
            eprintln!("Bad --rate value: {}", s);
            std::process::exit(1);
        })
    });

    let data = fs::read(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path, e);
        std::process::exit(1);
    });

    let format = detect_format(&data);
    println!("Format:   {}", format);
    match format {
        SoundFormat::Egs => {
            let document = split_egs(&data).unwrap_or_else(|e| {
                eprintln!("Failed to parse EGS: {}", e);
                std::process::exit(1);
            });
            print_document(&document);
        }
        SoundFormat::Wav => {
            let pcm = load_wav(&data).unwrap_or_else(|e| {
                eprintln!("Failed to parse WAV: {}", e);
                std::process::exit(1);
            });
            println!("Rate:     {} Hz", pcm.sample_rate);
            println!("Length:   {:.3}s ({} samples, peak {:.3})", pcm.duration(), pcm.len(), pcm.peak());
        }
        other => {
            eprintln!("Cannot play {} data", other);
            std::process::exit(1);
        }
    }
    println!();

    match wav_path {
        Some(wav) if format == SoundFormat::Egs => render_file(&data, &wav, rate, seconds, repeat),
        Some(_) => {
            eprintln!("Only EGS songs can be rendered");
            std::process::exit(1);
        }
        None => play_audio(data, format, seconds, repeat),
    }
}

fn print_document(document: &Document) {
    let summary = summarize(&document.events);
    println!("Channels: {}", document.channels.len());
    for channel in &document.channels {
        println!(
            "  {:>3}: {:?}, trim {:.2}, {} config bytes",
            channel.id,
            channel.mode,
            channel.gain(),
            channel.config.len()
        );
    }
    println!("Notes:    {}", summary.notes);
    if summary.future > 0 {
        println!("Reserved: {} (skipped)", summary.future);
    }
    println!("Length:   {:.3}s per pass, {:.3}s with release", summary.length, song_extent(document));
}

fn play_audio(data: Vec<u8>, format: SoundFormat, seconds: Option<f64>, repeat: bool) {
    let mut store = BTreeMap::new();
    store.insert((INPUT_ID, 0), data);
    let mut player = Player::spawn(store, EngineSettings::default());

    let queued = match format {
        SoundFormat::Egs => player.play_song(INPUT_ID, false, repeat),
        _ => player.play_one_shot(INPUT_ID),
    };
    if !queued {
        eprintln!("Audio thread not running");
        std::process::exit(1);
    }
    println!("Playing...");
    println!();

    let started = Instant::now();
    let limit = seconds.map(Duration::from_secs_f64);
    let mut seen_song = false;
    loop {
        if player.is_finished() || limit.is_some_and(|l| started.elapsed() >= l) {
            break;
        }
        if format == SoundFormat::Egs {
            let active = player.is_song_playing();
            if seen_song && !active {
                break;
            }
            seen_song |= active;
            print!("\rTime: {:7.2}s", player.song_playhead());
            let _ = std::io::stdout().flush();
        } else if limit.is_none() && started.elapsed() >= Duration::from_secs(2) {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    player.shutdown();
    println!("\rDone.          ");
}

fn render_file(data: &[u8], path: &str, rate: u32, seconds: Option<f64>, repeat: bool) {
    println!("Rendering to {} at {} Hz...", path, rate);

    let wav = render_to_wav(data, rate, seconds, repeat, &EngineSettings::default()).unwrap_or_else(|e| {
        eprintln!("Render failed: {}", e);
        std::process::exit(1);
    });
    println!("Rendered {} bytes", wav.len());

    fs::write(path, &wav).unwrap_or_else(|e| {
        eprintln!("Failed to write {}: {}", path, e);
        std::process::exit(1);
    });

    println!("Done.");
}
