//! seqmix-demo — an 808 drum pattern rendered through the SeqMix mixer.
//!
//! Plays a 16-step pattern either through the realtime CPAL output, a null
//! sink (scheduling only), or as WAV bytes on stdout:
//!
//! ```text
//! seqmix-demo --out cpal
//! seqmix-demo --out wav > pattern.wav
//! seqmix-demo --out wav | aplay
//! ```

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::Rng;
use tracing::info;

use sq_common::{AudioSpec, OutputDriver, SampleFormat};
use sq_io::{CpalDriver, NullDriver, SymphoniaLoader, WavSink};
use sq_mix::Mixer;

const PATTERN: [&str; 16] = [
    "kick2.wav",
    "maracas.wav",
    "cl_hihat.wav",
    "maracas.wav",
    "snare.wav",
    "maracas.wav",
    "cl_hihat.wav",
    "kick2.wav",
    "maracas.wav",
    "maracas.wav",
    "hightom.wav",
    "maracas.wav",
    "snare.wav",
    "kick1.wav",
    "cl_hihat.wav",
    "maracas.wav",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Out {
    /// Schedule only; no audio is produced.
    Null,
    /// Realtime playback through the default output device.
    Cpal,
    /// WAV bytes on stdout (redirect or pipe to a player).
    Wav,
}

#[derive(Parser, Debug)]
#[command(name = "seqmix-demo")]
#[command(about = "808 drum-pattern demo for the SeqMix mixer")]
#[command(version)]
struct Cli {
    /// Playback binding
    #[arg(long, value_enum, default_value = "null")]
    out: Out,

    /// Directory the pattern's samples are loaded from
    #[arg(long, default_value = "sound/808")]
    sounds_path: String,

    /// Pattern tempo
    #[arg(long, default_value_t = 120)]
    bpm: u32,

    /// Times the 16-step pattern repeats
    #[arg(long, default_value_t = 8)]
    loops: u32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log to stderr: stdout may be carrying WAV bytes.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let spec = AudioSpec::new(48000.0, SampleFormat::F32, 2);
    let driver: Box<dyn OutputDriver> = match cli.out {
        Out::Cpal => Box::new(CpalDriver::new()),
        Out::Null | Out::Wav => Box::new(NullDriver::new()),
    };

    let mut mixer = Mixer::new(spec, Box::new(SymphoniaLoader::new()), driver)
        .context("configuring mixer")?;
    mixer.debug(true);
    mixer.set_sounds_path(&cli.sounds_path);

    // Sixteenth notes at the requested tempo
    let step = Duration::from_secs(60) / (cli.bpm * 4);
    let mut rng = rand::thread_rng();

    let mut t = Duration::from_secs(1); // padding before the music
    for _ in 0..cli.loops {
        for (s, sample) in PATTERN.iter().enumerate() {
            let pan = rng.gen_range(-1.0..=1.0);
            mixer
                .set_fire(sample, t + step * s as u32, Duration::ZERO, 1.0, pan)
                .with_context(|| format!("scheduling {sample}"))?;
        }
        t += step * PATTERN.len() as u32;
    }
    t += Duration::from_secs(5); // tail after the music

    info!(
        out = ?cli.out,
        bpm = cli.bpm,
        loops = cli.loops,
        fires = mixer.fire_count(),
        "Pattern scheduled"
    );

    match cli.out {
        Out::Wav => {
            mixer
                .output_start(t, Box::new(WavSink::new(std::io::stdout())))
                .context("starting WAV output")?;
            let quarter = t / 4;
            for n in 1..=4u32 {
                mixer.output_continue_to(quarter * n)?;
            }
            mixer.output_close()?;
        }
        Out::Null | Out::Cpal => {
            mixer.start_at(Instant::now() + Duration::from_secs(1))?;
            while mixer.fire_count() > 0 {
                std::thread::sleep(Duration::from_secs(1));
                info!(
                    at = ?mixer.get_now_at(),
                    fires = mixer.fire_count(),
                    "Playing"
                );
            }
        }
    }

    let snapshot = mixer.telemetry().snapshot();
    info!(
        frames = snapshot.frames_rendered,
        peak = snapshot.output_peak,
        late_fires = snapshot.fires_late,
        "Done"
    );

    mixer.teardown();
    Ok(())
}
