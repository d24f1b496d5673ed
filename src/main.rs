use clap::{Parser, Subcommand};
use snug::compress::Compressor;
use snug::config;
use snug::imaging::{header_dimensions, mime_for_path};
use snug::output::{self, FileReport, OutputNames};
use snug::types::{CompressionRequest, CompressionResult, RequestOptions, SourceImage};
use snug::worker::Worker;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt};

/// Flags for the `compress` command.
#[derive(clap::Args)]
struct CompressArgs {
    /// Images to compress
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory the compressed files are written to
    #[arg(long, short, default_value = "compressed")]
    output_dir: PathBuf,

    /// Named preset from the config file
    #[arg(long)]
    preset: Option<String>,

    /// Byte budget (overrides config)
    #[arg(long)]
    max_bytes: Option<u64>,

    /// Bounding box width (overrides config)
    #[arg(long)]
    max_width: Option<u32>,

    /// Bounding box height (overrides config)
    #[arg(long)]
    max_height: Option<u32>,

    /// Smallest edge the search may shrink to (overrides config)
    #[arg(long)]
    min_dimension: Option<u32>,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
#[command(name = "snug")]
#[command(about = "Re-encode images to fit a byte budget")]
#[command(long_about = "\
Re-encode images to fit a byte budget

Each image is downscaled into a bounding box, then re-encoded at falling
quality until it fits. If no quality fits, the dimensions shrink by 20% and
the quality ladder starts over, down to a minimum edge length. When even
that fails, the image is encoded at the minimum size and quality anyway and
reported as over budget.

PNG sources stay PNG. Everything else becomes JPEG (or AVIF, see config).

Search defaults:
  max_bytes      204800   (200 KB)
  max_width      1200
  max_height     1200
  start_quality  0.85
  min_quality    0.35
  quality_step   0.05
  min_dimension  200

Set RUST_LOG=debug to trace every encode attempt.

Run 'snug gen-config' to generate a documented snug.toml.")]
#[command(version)]
struct Cli {
    /// Config file (stock defaults are used when it does not exist)
    #[arg(long, default_value = "snug.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress images to fit the byte budget
    Compress(CompressArgs),
    /// Print a stock snug.toml with all options documented
    GenConfig,
    /// Validate the config file, including every preset
    CheckConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so `--json` output stays parseable
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Compress(args) => compress(&cli.config, args)?,
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::CheckConfig => {
            let source = if cli.config.exists() {
                cli.config.display().to_string()
            } else {
                "stock defaults".to_string()
            };
            println!("==> Checking {}", source);
            let config = config::load_config(&cli.config)?;
            for name in config.presets.keys() {
                let preset = config.preset(name)?;
                println!(
                    "    preset {}: {} bytes, {}x{}",
                    name, preset.max_bytes, preset.max_width, preset.max_height
                );
            }
            println!("==> Config is valid");
        }
    }

    Ok(())
}

fn compress(config_path: &Path, args: CompressArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(config_path)?;
    let overrides = RequestOptions {
        max_width: args.max_width,
        max_height: args.max_height,
        min_dimension: args.min_dimension,
        ..RequestOptions::default()
    };
    let options = config
        .options(args.preset.as_deref())?
        .with_overrides(args.max_bytes, Some(&overrides));
    options.validate()?;

    fs::create_dir_all(&args.output_dir)?;
    let worker = Worker::spawn(
        Compressor::new(options, config.encoder),
        config.worker.queue_depth,
    )?;

    // Request ids are input positions
    let mut reports: Vec<Option<FileReport>> = vec![None; args.inputs.len()];
    let mut sources: Vec<(u64, Option<(u32, u32)>)> = vec![(0, None); args.inputs.len()];
    let mut names = OutputNames::new();
    let mut submitted = 0;
    for (index, path) in args.inputs.iter().enumerate() {
        match fs::read(path) {
            Ok(bytes) => {
                sources[index] = (bytes.len() as u64, header_dimensions(&bytes));
                worker.submit(CompressionRequest {
                    id: index.to_string(),
                    file: SourceImage {
                        bytes,
                        mime: mime_for_path(path).to_string(),
                    },
                    max_bytes: None,
                    opts: None,
                })?;
                submitted += 1;
            }
            Err(e) => reports[index] = Some(FileReport::failed(&path.display().to_string(), e)),
        }
    }

    for _ in 0..submitted {
        let result = worker.recv()?;
        let index: usize = result.id().parse()?;
        let input = &args.inputs[index];
        let (source_bytes, source_dimensions) = sources[index];
        let output = match &result {
            CompressionResult::Success { blob, .. } => {
                let path = args.output_dir.join(names.assign(input, blob.extension()));
                fs::write(&path, &blob.bytes)?;
                path
            }
            CompressionResult::Failure { .. } => PathBuf::new(),
        };
        reports[index] = Some(FileReport::from_result(
            &input.display().to_string(),
            source_bytes,
            source_dimensions,
            &result,
            &output,
            options.max_bytes,
        ));
    }
    worker.shutdown()?;

    let reports: Vec<FileReport> = reports.into_iter().flatten().collect();
    if args.json {
        output::print_json_output(&reports)?;
    } else {
        output::print_compress_output(&reports, options.max_bytes);
    }

    let failed = reports.iter().filter(|r| r.is_failure()).count();
    if failed > 0 {
        return Err(format!("{} of {} files failed", failed, reports.len()).into());
    }
    Ok(())
}
