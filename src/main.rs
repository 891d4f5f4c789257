//! Wavy CLI - generate and inspect retinas, sonify synthetic scenes

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wavy::audio::{CpalOutput, SharedMixer};
use wavy::config::WavyConfig;
use wavy::pixel::LumaFrame;
use wavy::render::{RenderConfig, Renderer};
use wavy::sound::sound_factory;
use wavy::stimulus::Stimulus;
use wavy::{codec, generators, Retina, RetinaTopology, WavyError, WavyResult};

#[derive(Parser)]
#[command(name = "wavy")]
#[command(about = "Visual-to-auditory sensory substitution", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a synthetic retina file
    Generate {
        #[command(subcommand)]
        layout: Layout,
    },

    /// Summarize a retina file
    Inspect {
        /// Retina file (.ret)
        file: PathBuf,

        /// Print the topology as JSON
        #[arg(long)]
        json: bool,

        /// Draw an ASCII map of field positions
        #[arg(long)]
        map: bool,
    },

    /// Sonify a synthetic scene to a WAV file
    Render {
        /// Session config (TOML)
        #[arg(short, long, default_value = "wavy.toml")]
        config: PathBuf,

        /// Output WAV file path
        #[arg(short, long)]
        output: PathBuf,

        /// Duration in seconds (default: 4.0)
        #[arg(short, long, default_value = "4.0")]
        duration: f32,

        /// Scene: sweep, falling, orbit or static (default: from config)
        #[arg(short, long)]
        stimulus: Option<String>,

        /// Sample fields on all cores
        #[arg(long)]
        parallel: bool,
    },

    /// Sonify a synthetic scene live on the default audio device
    Play {
        /// Session config (TOML)
        #[arg(short, long, default_value = "wavy.toml")]
        config: PathBuf,

        /// Duration in seconds (default: 10.0)
        #[arg(short, long, default_value = "10.0")]
        duration: f32,

        /// Scene: sweep, falling, orbit or static (default: from config)
        #[arg(short, long)]
        stimulus: Option<String>,
    },
}

#[derive(Subcommand)]
enum Layout {
    /// Fields on a regular lattice
    Grid {
        #[arg(long, default_value = "320")]
        width: u32,
        #[arg(long, default_value = "240")]
        height: u32,
        /// Horizontal spacing between lattice columns
        #[arg(long, default_value = "20")]
        x_res: u32,
        /// Vertical spacing between lattice rows
        #[arg(long, default_value = "20")]
        y_res: u32,
        /// Captors per field
        #[arg(long, default_value = "5")]
        captors: usize,
        /// Standard deviation of captor scatter, in pixels
        #[arg(long, default_value = "2.0")]
        jitter: f64,
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Output retina file
        #[arg(short, long, default_value = "retina.ret")]
        output: PathBuf,
    },

    /// Fields at random positions
    Random {
        #[arg(long, default_value = "320")]
        width: u32,
        #[arg(long, default_value = "240")]
        height: u32,
        /// Number of receptive fields
        #[arg(long, default_value = "100")]
        fields: usize,
        /// Captors per field
        #[arg(long, default_value = "5")]
        captors: usize,
        /// Standard deviation of captor scatter, in pixels
        #[arg(long, default_value = "2.0")]
        jitter: f64,
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Output retina file
        #[arg(short, long, default_value = "retina.ret")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(cli.command) {
        eprintln!("wavy: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> WavyResult<()> {
    match command {
        Commands::Generate { layout } => generate(layout),
        Commands::Inspect { file, json, map } => inspect(&file, json, map),
        Commands::Render {
            config,
            output,
            duration,
            stimulus,
            parallel,
        } => render(&config, &output, duration, stimulus.as_deref(), parallel),
        Commands::Play {
            config,
            duration,
            stimulus,
        } => play(&config, duration, stimulus.as_deref()),
    }
}

fn generate(layout: Layout) -> WavyResult<()> {
    let (topology, output) = match layout {
        Layout::Grid {
            width,
            height,
            x_res,
            y_res,
            captors,
            jitter,
            seed,
            output,
        } => {
            let mut rng = StdRng::seed_from_u64(seed);
            let t = generators::generate_grid(
                width, height, x_res, y_res, captors, jitter, &mut rng,
            )?;
            (t, output)
        }
        Layout::Random {
            width,
            height,
            fields,
            captors,
            jitter,
            seed,
            output,
        } => {
            let mut rng = StdRng::seed_from_u64(seed);
            let t =
                generators::generate_random(width, height, fields, captors, jitter, &mut rng)?;
            (t, output)
        }
    };

    codec::save(&output, &topology)?;
    println!(
        "{}: {}x{}, {} fields, {} captors",
        output.display(),
        topology.width,
        topology.height,
        topology.field_count(),
        topology.captor_count()
    );
    Ok(())
}

fn inspect(file: &Path, json: bool, map: bool) -> WavyResult<()> {
    let topology = codec::load(file)?;

    if json {
        let text = serde_json::to_string_pretty(&topology)
            .map_err(|e| WavyError::Configuration(format!("JSON output failed: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    println!("Retina:   {}", file.display());
    println!("Grid:     {}x{}", topology.width, topology.height);
    println!("Fields:   {}", topology.field_count());
    println!("Captors:  {}", topology.captor_count());
    let counts: Vec<usize> = topology.fields.iter().map(|f| f.captors.len()).collect();
    if let (Some(min), Some(max)) = (counts.iter().min(), counts.iter().max()) {
        println!("Per field: {}..={}", min, max);
    }
    if let Some((x0, y0, x1, y1)) = topology.bounds() {
        println!("Extent:   ({}, {}) - ({}, {})", x0, y0, x1, y1);
    }

    if map {
        println!();
        print!("{}", ascii_map(&topology, 64));
    }
    Ok(())
}

/// Downscaled map: `o` field centre, `.` captor only
fn ascii_map(topology: &RetinaTopology, columns: u32) -> String {
    let cols = columns.min(topology.width).max(1);
    // Terminal cells are about twice as tall as wide
    let rows = ((topology.height as u64 * cols as u64) / (topology.width as u64 * 2)).max(1) as u32;
    let mut grid = vec![vec![' '; cols as usize]; rows as usize];

    let cell = |x: u32, y: u32| {
        let c = (x as u64 * cols as u64 / topology.width as u64) as usize;
        let r = (y as u64 * rows as u64 / topology.height as u64) as usize;
        (r, c)
    };

    for field in &topology.fields {
        for captor in &field.captors {
            let (r, c) = cell(captor.x, captor.y);
            if grid[r][c] == ' ' {
                grid[r][c] = '.';
            }
        }
    }
    for field in &topology.fields {
        let (r, c) = cell(field.x, field.y);
        grid[r][c] = 'o';
    }

    let mut out = String::new();
    out.push('+');
    out.push_str(&"-".repeat(cols as usize));
    out.push_str("+\n");
    for row in grid {
        out.push('|');
        out.extend(row);
        out.push_str("|\n");
    }
    out.push('+');
    out.push_str(&"-".repeat(cols as usize));
    out.push_str("+\n");
    out
}

fn load_session(
    config_path: &Path,
    stimulus: Option<&str>,
) -> WavyResult<(WavyConfig, RetinaTopology, Stimulus)> {
    let config = WavyConfig::load(config_path)?;
    let topology = codec::load(&config.retina.file)?;

    let name = stimulus.unwrap_or(config.stimulus.preset.as_str());
    let scene = Stimulus::preset(name, topology.width, topology.height).ok_or_else(|| {
        WavyError::Configuration(format!(
            "unknown stimulus `{}` (expected sweep, falling, orbit or static)",
            name
        ))
    })?;
    Ok((config, topology, scene))
}

fn render(
    config_path: &Path,
    output: &Path,
    duration: f32,
    stimulus: Option<&str>,
    parallel: bool,
) -> WavyResult<()> {
    let (config, topology, scene) = load_session(config_path, stimulus)?;

    let mixer = SharedMixer::new(
        config.mixer_config(topology.field_count(), config.sonification.sample_rate),
    )?;
    let factory = sound_factory(config.sonification.clone(), mixer.backend())?;
    let mut retina = Retina::new(topology, config.retina.threshold, factory)?;

    let renderer = Renderer::new(RenderConfig {
        fps: config.stimulus.fps,
        duration,
        parallel,
        ..RenderConfig::default()
    })?;
    let stats = renderer.render_to_file(&mut retina, &mixer, &scene, output)?;

    println!("Output:      {}", output.display());
    println!("Duration:    {:.2} s", stats.duration);
    println!("Sweeps:      {}", retina.sweeps());
    println!("Peak:        {:.3}", stats.peak);
    println!("RMS:         {:.3}", stats.rms);
    println!("Balance L/R: {:.3} / {:.3}", stats.balance.0, stats.balance.1);
    Ok(())
}

fn play(config_path: &Path, duration: f32, stimulus: Option<&str>) -> WavyResult<()> {
    let (config, topology, scene) = load_session(config_path, stimulus)?;

    let device = CpalOutput::start(config.mixer_config(topology.field_count(), 0))?;
    if device.sample_rate() != config.sonification.sample_rate {
        info!(
            "Waveforms at {} Hz are resampled to the device rate of {} Hz",
            config.sonification.sample_rate,
            device.sample_rate()
        );
    }

    let factory = sound_factory(config.sonification.clone(), device.mixer().backend())?;
    let mut retina = Retina::new(topology, config.retina.threshold, factory)?;
    let geometry = retina.geometry();
    let mut frame = LumaFrame::new(geometry.width, geometry.height);

    let period = Duration::from_secs_f64(1.0 / config.stimulus.fps as f64);
    let start = Instant::now();
    let mut next = start;
    info!("Playing for {:.1} s at {} fps", duration, config.stimulus.fps);

    while start.elapsed().as_secs_f32() < duration {
        scene.draw(&mut frame, start.elapsed().as_secs_f64());
        retina.update(&frame);

        next += period;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else if now - next > period * 4 {
            warn!("Frame loop is running {:?} late", now - next);
            next = now;
        }
    }

    info!("Stopped after {} sweeps", retina.sweeps());
    Ok(())
}
