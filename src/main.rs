use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use samtal::audio::{AudioFrontend, AudioPlayback, CpalFrontend};
use samtal::services::{SpeechSynthesizer, SynthesisRequest};
use samtal::{Config, Daemon};

/// samtal - voice conversation practice
#[derive(Parser)]
#[command(name = "samtal", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable auto-record (one exchange per session)
    #[arg(long, env = "SAMTAL_NO_AUTO_RECORD")]
    no_auto_record: bool,

    /// Mute reply playback
    #[arg(long)]
    muted: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input with a live level meter
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hej! Det h\u{e4}r \u{e4}r ett test.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,samtal=info",
        1 => "info,samtal=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    let mut config = Config::load()?;
    if cli.no_auto_record {
        config.auto_record.enabled = false;
    }

    tracing::info!(
        topic = %config.voice.topic,
        locale = %config.voice.locale,
        "starting samtal"
    );

    Daemon::new(config, cli.muted).run().await?;
    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    use std::io::Write;

    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let frontend = CpalFrontend::new()?;
    frontend.acquire().await?;

    for i in 0..duration * 10 {
        tokio::time::sleep(Duration::from_millis(100)).await;

        let level = frontend.level();

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = ((level * 50.0).min(50.0)) as usize;
        let meter: String = "\u{2588}".repeat(meter_len) + &" ".repeat(50 - meter_len);

        #[allow(clippy::cast_precision_loss)]
        let elapsed = (i + 1) as f64 / 10.0;
        print!("\r[{elapsed:4.1}s] level: {level:.3} [{meter}]");
        let _ = std::io::stdout().flush();
    }

    let wav = frontend.release().await?;
    println!("\n\nCaptured {} bytes of WAV audio.", wav.len());
    println!("If the meter moved while you spoke, your mic is working.");
    println!("If it stayed at zero, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24_000_u32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());
    playback.play_samples(&samples)?;

    println!("\nIf you heard the tone, your speakers are working.");
    Ok(())
}

/// Test TTS output through the configured synthesizer
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let synthesizer = samtal::daemon::build_synthesizer(&config)?;

    println!("Synthesizing speech...");
    let request = SynthesisRequest {
        text: text.to_string(),
        locale: config.voice.locale.clone(),
        voice: config.voice.voice.clone(),
    };
    let audio = synthesizer.synthesize(&request).await?;
    println!("Got {} bytes of audio data", audio.len());

    println!("Playing audio...");
    let playback = AudioPlayback::new()?;
    playback.play_mp3(&audio)?;

    println!("\nIf you heard the speech, TTS is working.");
    Ok(())
}
