mod cli;

use mkvforge::{config, discovery, engine::Engine, logging, prompt::TerminalPrompt};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, RunOptions};
use mf_av::{FfprobeProber, ToolRegistry};
use mf_core::config::Config;
use mf_pipeline::{run_batch, CleanupSettings, RunContext, RunOutcome, ToolRunner};
use mf_probe::{MediaTrack, Prober, StreamCatalog};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Version => {
            println!("mkvforge {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Validate { config: path } => {
            logging::init(cli.verbose, None)?;
            let path = path.as_deref().or(cli.config.as_deref());
            return validate_config(path);
        }
        _ => {}
    }

    let config = config::load_config_or_default(cli.config.as_deref())?;
    logging::init(cli.verbose, config.logging.file.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Commands::Run { input, opts } => run_file(&input, config, &opts).await,
            Commands::Batch { dir, opts } => run_dir(&dir, config, &opts).await,
            Commands::Plan { input, opts } => print_plan(&input, config, &opts).await,
            Commands::Probe { file, json } => probe_file(&file, &config, json).await,
            Commands::CheckTools => check_tools(&config),
            Commands::Version | Commands::Validate { .. } => Ok(()),
        }
    })
}

/// Run context wired to Ctrl-C.
fn run_context(engine: &Engine, cleanup: CleanupSettings, dry_run: bool) -> RunContext {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping the current operation");
            on_signal.cancel();
        }
    });

    RunContext::new(Arc::new(ToolRunner::new(engine.tools())))
        .with_dry_run(dry_run)
        .with_cancellation(token)
        .with_cleanup(cleanup)
        .with_prompt(Arc::new(TerminalPrompt))
}

async fn run_file(input: &Path, mut config: Config, opts: &RunOptions) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    opts.apply(&mut config);
    let cleanup = CleanupSettings::from(&config.cleanup);
    let engine = Engine::new(config, opts.output.clone(), opts.external_tracks())?;
    let ctx = run_context(&engine, cleanup, opts.dry_run);

    let outcome = engine
        .process(input, &ctx)
        .await
        .with_context(|| format!("Failed to process {}", input.display()))?;

    match outcome {
        RunOutcome::Completed(path) => println!("Output: {}", path.display()),
        RunOutcome::Skipped(path) => println!("Skipped: {} already exists", path.display()),
        RunOutcome::DryRun => println!("Dry run complete; nothing was written"),
    }
    Ok(())
}

async fn run_dir(dir: &Path, mut config: Config, opts: &RunOptions) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    opts.apply(&mut config);
    let skip = opts.output.clone().or_else(|| config.output.directory.clone());
    let sources = discovery::discover(dir, skip.as_deref());
    if sources.is_empty() {
        println!("No video files found under {}", dir.display());
        return Ok(());
    }

    let external = opts.external_tracks();
    if !external.is_empty() {
        tracing::warn!("--add-audio/--add-subtitle are ignored in batch mode");
    }

    let cleanup = CleanupSettings::from(&config.cleanup);
    let engine = Engine::new(config, opts.output.clone(), Vec::new())?;
    let ctx = run_context(&engine, cleanup, opts.dry_run);

    let (engine, ctx_ref) = (&engine, &ctx);
    let summary = run_batch(&sources, &ctx.cancellation, move |source| async move {
        engine.process(&source, ctx_ref).await
    })
    .await;

    println!("{summary}");
    for (source, message) in &summary.failures {
        println!("  FAILED {}: {message}", source.display());
    }
    if summary.has_failures() {
        anyhow::bail!("{} of {} file(s) failed", summary.failed, summary.total());
    }
    Ok(())
}

async fn print_plan(input: &Path, mut config: Config, opts: &RunOptions) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    opts.apply(&mut config);
    let engine = Engine::new(config, opts.output.clone(), opts.external_tracks())?;
    let planned = engine
        .plan(input)
        .await
        .with_context(|| format!("Failed to plan {}", input.display()))?;

    println!("{}", serde_json::to_string_pretty(&planned.plan)?);
    Ok(())
}

async fn probe_file(file: &Path, config: &Config, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::new(tools.require("ffprobe")?.path.clone());
    let catalog = prober.probe(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        print_catalog(&catalog);
    }
    Ok(())
}

fn print_catalog(catalog: &StreamCatalog) {
    println!("File: {}", catalog.source.display());
    if let Some(duration) = catalog.duration {
        let secs = duration.as_secs();
        println!("Duration: {:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60);
    }

    let video = &catalog.video;
    print!("\nVideo: [{}] {} {}x{}", video.index, video.codec_name, video.width, video.height);
    if let Some(fps) = video.fps() {
        print!(" {fps:.3} fps");
    }
    println!();
    if let Some(ref dv) = video.dolby_vision {
        let profile = dv.profile.map_or("unknown".to_string(), |p| p.to_string());
        println!(
            "  Dolby Vision: profile {profile} (RPU: {}, EL: {}, BL: {})",
            dv.rpu_present, dv.el_present, dv.bl_present
        );
    }
    if video.hdr10plus {
        println!("  HDR10+: present");
    }
    if let Some(ref md) = video.mastering_display {
        println!(
            "  Mastering display: {:.4}-{:.4} nits",
            md.min_luminance, md.max_luminance
        );
    }
    if let Some(cll) = video.content_light {
        println!("  Content light: MaxCLL {} / MaxFALL {}", cll.max_cll, cll.max_fall);
    }

    println!("\nAudio Tracks: {}", catalog.audio.len());
    for track in &catalog.audio {
        print_track(track);
    }
    println!("\nSubtitle Tracks: {}", catalog.subtitles.len());
    for track in &catalog.subtitles {
        print_track(track);
    }
}

fn print_track(track: &MediaTrack) {
    print!("  [{}] {} ({})", track.index, track.codec_name, track.language);
    if let Some(ch) = track.channels {
        print!(" {ch}ch");
    }
    if let Some(ref title) = track.title {
        print!(" \"{title}\"");
    }
    if track.forced {
        print!(" [forced]");
    }
    if track.default {
        print!(" [default]");
    }
    println!();
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in tools.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };
        print!("{status} {}", tool.name);
        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    let encoders = tools.detect_encoders();
    println!();
    if encoders.is_empty() {
        println!("Hardware HEVC encoders: none (encode mode unavailable)");
    } else {
        let names: Vec<String> = encoders.iter().map(ToString::to_string).collect();
        println!("Hardware HEVC encoders: {}", names.join(", "));
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, checking default locations");
            config::load_config_or_default(None)?
        }
    };

    let warnings = config.validate()?;
    println!("✓ Configuration is valid");
    println!("  Video mode: {}", config.video.mode);
    println!("  Encoder: {}", config.video.encoder);
    println!("  DV policy: {}", config.video.dv_policy);
    println!("  HDR10+ policy: {}", config.video.hdr10plus_policy);
    println!("  Final cleanup: {}", config.cleanup.final_policy);
    for warning in &warnings {
        println!("  ! {warning}");
    }
    Ok(())
}
