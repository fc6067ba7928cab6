//! binlens command line
//!
//! ```bash
//! binlens info weights.bin --dtype float32 --head 8
//! binlens compare ref.bin out.bin --dtype1 float32 --dtype2 float64
//! binlens concat a.bin b.bin --mode tensor --shape 2,3,4 --shape 5,3,4 --axis 0 -o out.bin
//! binlens config set-theme github
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use binlens::display::{format_metric, ValueStats};
use binlens::{
    compare, decode, ConcatMode, ConcatenationJob, DataInfo, ElementEncoding, Language, Settings,
    ShapeSpec, Theme,
};

#[derive(Parser, Debug)]
#[command(name = "binlens")]
#[command(about = "Inspect, compare and concatenate raw numeric .bin dumps")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ~/.binviewer/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode one file and print a summary
    Info {
        file: PathBuf,

        /// int8, int16, float32 or float64
        #[arg(long, default_value = "float32")]
        dtype: ElementEncoding,

        /// Print the first N values
        #[arg(long, default_value_t = 0)]
        head: usize,
    },

    /// Cosine similarity, MSE and MAE of two files
    Compare {
        a: PathBuf,
        b: PathBuf,

        #[arg(long, default_value = "float32")]
        dtype1: ElementEncoding,

        #[arg(long, default_value = "float32")]
        dtype2: ElementEncoding,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Concatenate up to four files into one dump
    Concat {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, default_value = "float32")]
        dtype: ElementEncoding,

        #[arg(long, default_value = "simple")]
        mode: ConcatMode,

        /// Shape per file, in file order (tensor mode)
        #[arg(long = "shape")]
        shapes: Vec<String>,

        #[arg(long, default_value_t = 0)]
        axis: usize,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show or change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    SetLanguage { language: Language },
    SetTheme { theme: Theme },
    /// Largest accepted input, in MB
    SetMaxSize { mb: u64 },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => Settings::default_path()?,
    };
    let settings = Settings::load(&config_path)?;

    match cli.command {
        Command::Info { file, dtype, head } => info(&settings, &file, dtype, head),
        Command::Compare { a, b, dtype1, dtype2, json } => {
            compare_cmd(&settings, &a, dtype1, &b, dtype2, json)
        }
        Command::Concat { files, dtype, mode, shapes, axis, output } => {
            concat(&settings, files, dtype, mode, &shapes, axis, &output)
        }
        Command::Config { action } => config_cmd(settings, &config_path, action),
    }
}

fn info(settings: &Settings, file: &Path, dtype: ElementEncoding, head: usize) -> Result<()> {
    settings
        .guard()
        .check_bin_file(file)
        .with_context(|| format!("rejected {}", file.display()))?;
    let buffer = decode(file, dtype).with_context(|| format!("decoding {}", file.display()))?;
    let info = DataInfo::new(&buffer, settings.max_downsample_points, Some(file.to_path_buf()));

    println!("📄 {}", file.display());
    println!("   encoding:   {}", info.encoding);
    println!("   elements:   {}", info.raw_length);
    println!("   plotted:    {}", info.processed_length);
    if buffer.trailing_bytes() > 0 {
        println!("   ignored:    {} trailing bytes", buffer.trailing_bytes());
    }
    if buffer.sanitized_count() > 0 {
        println!("   ⚠️  {} NaN/Inf values replaced", buffer.sanitized_count());
    }
    if let Some(stats) = ValueStats::of(buffer.values()) {
        println!(
            "   min {}  max {}  mean {}",
            format_metric(stats.min),
            format_metric(stats.max),
            format_metric(stats.mean)
        );
    }
    if head > 0 {
        let shown: Vec<String> = buffer.values().iter().take(head).map(|v| format_metric(*v)).collect();
        println!("   head:       [{}]", shown.join(", "));
    }
    Ok(())
}

fn compare_cmd(
    settings: &Settings,
    a: &Path,
    dtype_a: ElementEncoding,
    b: &Path,
    dtype_b: ElementEncoding,
    json: bool,
) -> Result<()> {
    let guard = settings.guard();
    for path in [a, b] {
        guard
            .check_bin_file(path)
            .with_context(|| format!("rejected {}", path.display()))?;
    }
    let left = decode(a, dtype_a).with_context(|| format!("decoding {}", a.display()))?;
    let right = decode(b, dtype_b).with_context(|| format!("decoding {}", b.display()))?;
    let result = compare(&left, &right)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!("{}", result.summary());
    if result.was_truncated() {
        let (la, lb) = result.original_lengths;
        println!(
            "⚠️  lengths differ ({la} vs {lb}), compared the first {}",
            result.truncated_length
        );
    }
    Ok(())
}

fn concat(
    settings: &Settings,
    files: Vec<PathBuf>,
    dtype: ElementEncoding,
    mode: ConcatMode,
    shapes: &[String],
    axis: usize,
    output: &Path,
) -> Result<()> {
    let (accepted, rejected) = settings.guard().partition(files);
    for (path, err) in &rejected {
        warn!(path = %path.display(), reason = %err.reason(), "input rejected");
    }

    let mut job = ConcatenationJob::new(dtype).with_mode(mode, axis);
    for err in job.add_files(accepted) {
        warn!(error = %err, "input dropped");
    }
    if job.is_empty() {
        bail!("no usable .bin inputs");
    }

    if mode == ConcatMode::Tensor {
        if shapes.len() != job.len() {
            bail!("tensor mode needs one --shape per file ({} files, {} shapes)", job.len(), shapes.len());
        }
        for (index, text) in shapes.iter().enumerate() {
            job.set_shape_text(index, text, settings.shape_syntax)?;
        }
    }

    let shape = job.assemble()?.shape_string();
    println!("✅ assembled {} from {} files", shape, job.len());
    let report = job.save(output)?;
    println!("💾 {} ({} bytes)", report.path.display(), report.byte_len);
    if let Some(crc) = report.checksum {
        println!("   crc32: {crc:08x}");
    }
    if mode == ConcatMode::Tensor {
        let shape = ShapeSpec::new(report.shape)?;
        println!("   reload with shape {}", shape.to_csv());
    }
    Ok(())
}

fn config_cmd(mut settings: Settings, path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# {}", path.display());
            println!("{}", serde_json::to_string_pretty(&settings)?);
            return Ok(());
        }
        ConfigAction::SetLanguage { language } => settings.set_language(language),
        ConfigAction::SetTheme { theme } => settings.set_theme(theme),
        ConfigAction::SetMaxSize { mb } => {
            if mb == 0 {
                bail!("the size limit must be at least 1MB");
            }
            settings.max_file_size_mb = mb;
        }
    }
    settings.save(path)?;
    println!(
        "✅ saved {} (theme: {})",
        path.display(),
        settings.theme.display_name(settings.language)
    );
    Ok(())
}
