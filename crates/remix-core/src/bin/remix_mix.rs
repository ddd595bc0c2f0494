//! remix-mix - mix audio files into a single WAV from the command line
//!
//! Usage: `remix-mix <file>... [-o output.wav]`
//!
//! Decodes each input at the configured engine rate, mixes them with equal
//! gain and power normalization, and writes the result. Files that fail to
//! decode are reported and skipped, matching the session behavior.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use remix_core::config::{default_config_path, load_config};
use remix_core::session::MixerSession;
use remix_core::store::DecodeState;
use remix_core::wav::MIX_FILENAME;

fn main() -> Result<()> {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let (inputs, output) = parse_args()?;
    let config = load_config(&default_config_path());

    let mut files = Vec::with_capacity(inputs.len());
    for path in &inputs {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push((name, bytes));
    }

    let mut session = MixerSession::new(config.engine.sample_rate);
    let admitted = session.add_files(files);
    if admitted.len() < inputs.len() {
        log::warn!(
            "Mixing the first {} of {} inputs (track limit)",
            admitted.len(),
            inputs.len()
        );
    }

    if !session.wait_settled(Duration::from_secs(300)) {
        bail!("Timed out waiting for decode and mix to finish");
    }

    for track in session.store().tracks() {
        if let DecodeState::Failed(err) = track.decode_state() {
            log::error!("Skipped {}: {}", track.name, err);
        }
    }

    let artifact = match session.artifact() {
        Some(artifact) => artifact,
        None => bail!("No input could be decoded; nothing to mix"),
    };

    std::fs::write(&output, &artifact.wav)
        .with_context(|| format!("Failed to write {:?}", output))?;
    log::info!(
        "Wrote {:?}: {} frames, {:.2}s, {} bytes",
        output,
        artifact.result.frame_count(),
        artifact.result.duration_seconds(),
        artifact.wav.len()
    );
    Ok(())
}

fn parse_args() -> Result<(Vec<PathBuf>, PathBuf)> {
    let mut inputs = Vec::new();
    let mut output = PathBuf::from(MIX_FILENAME);

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-o" | "--output" => {
                output = match args.next() {
                    Some(path) => PathBuf::from(path),
                    None => bail!("{} requires a path", arg),
                };
            }
            "-h" | "--help" => {
                eprintln!("Usage: remix-mix <file>... [-o output.wav]");
                std::process::exit(0);
            }
            _ => inputs.push(PathBuf::from(arg)),
        }
    }

    if inputs.is_empty() {
        bail!("No input files. Usage: remix-mix <file>... [-o output.wav]");
    }
    Ok((inputs, output))
}
