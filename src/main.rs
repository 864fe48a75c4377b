use clap::{Parser, Subcommand, ValueEnum};
use pixpress::config::{self, CompressionKind, ResizeKind, SessionConfig};
use pixpress::export::{DirectoryExporter, PdfExporter};
use pixpress::imaging::{OutputFormat, Rotation, RustCodec, SizeUnit, is_supported_input};
use pixpress::output;
use pixpress::process::{BatchReport, Session, SourceImage};
use std::path::PathBuf;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "pixpress")]
#[command(about = "Resize, rotate, crop and compress images")]
#[command(long_about = "\
Resize, rotate, crop and compress images

Every input goes through the same pipeline:

  crop box + zoom  →  resize (scale or absolute)  →  rotate  →  encode

Encoding either uses a fixed quality or searches for the quality whose
output lands within tolerance of a target file size:

  pixpress process photos/ --target 500 --unit KB
  pixpress process scan.png --format lossless --rotate 90
  pixpress process portrait.jpg --crop --zoom 150 --pdf print.pdf

Settings come from stock defaults, then --config FILE, then flags.
Run 'pixpress gen-config' to generate a documented pixpress.toml.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transform and compress images, then export them
    Process(ProcessArgs),
    /// Print a stock pixpress.toml with all options documented
    GenConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Jpeg,
    Avif,
    Lossless,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Jpeg => OutputFormat::Jpeg,
            FormatArg::Avif => OutputFormat::Avif,
            FormatArg::Lossless => OutputFormat::Lossless,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    #[value(name = "KB", alias = "kb")]
    Kb,
    #[value(name = "MB", alias = "mb")]
    Mb,
}

impl From<UnitArg> for SizeUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Kb => SizeUnit::KB,
            UnitArg::Mb => SizeUnit::MB,
        }
    }
}

#[derive(clap::Args)]
struct ProcessArgs {
    /// Image files or directories (searched recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Config file layered over the stock defaults
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Directory the processed files are written to
    #[arg(long, short, default_value = "processed")]
    output: PathBuf,

    /// Also write every processed image as a page of this PDF
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Write a JSON report of the batch to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Fixed encoder quality, 0-100
    #[arg(long, short, conflicts_with = "target")]
    quality: Option<u32>,

    /// Target file size; searches for the matching quality
    #[arg(long, short)]
    target: Option<u32>,

    /// Unit for --target
    #[arg(long, value_enum)]
    unit: Option<UnitArg>,

    /// Scale by a percentage, 1-400
    #[arg(long, conflicts_with_all = ["width", "height"])]
    scale: Option<u32>,

    /// Output width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Take --width and --height as given instead of following the
    /// first image's aspect ratio
    #[arg(long)]
    no_keep_aspect: bool,

    /// Rotation in degrees, snapped to quarter turns
    #[arg(long, allow_negative_numbers = true)]
    rotate: Option<i64>,

    /// Cut a fixed-size box out of every image
    #[arg(long)]
    crop: bool,

    /// Crop box width in pixels
    #[arg(long)]
    crop_width: Option<u32>,

    /// Crop box height in pixels
    #[arg(long)]
    crop_height: Option<u32>,

    /// Crop box offset from the left edge (centred when neither offset is set)
    #[arg(long)]
    crop_x: Option<u32>,

    /// Crop box offset from the top edge (centred when neither offset is set)
    #[arg(long)]
    crop_y: Option<u32>,

    /// Zoom inside the crop box, 25-500 percent
    #[arg(long)]
    zoom: Option<u32>,

    /// AVIF encoder speed, 1 (slow, small) to 10 (fast)
    #[arg(long)]
    avif_speed: Option<u8>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Process(args) => run_process(&args)?,
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn run_process(args: &ProcessArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session_config = config::load_config(args.config.as_deref())?;
    apply_flags(&mut session_config, args);
    let session_config = session_config.clamped();

    let codec = RustCodec::with_avif_speed(session_config.codec.avif_speed);
    let mut session = Session::new(session_config.batch_settings());
    for path in collect_inputs(&args.inputs) {
        let image = SourceImage::from_path(&codec, &path)
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        session.add_image(image);
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });
    let processed = session.process(&codec, Some(tx)).map(|r| r.len());
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;
    processed?;

    let mut exported = session.export(&DirectoryExporter::new(&args.output))?;
    if let Some(pdf) = &args.pdf {
        exported.extend(session.export(&PdfExporter::new(pdf))?);
    }

    let mut report = BatchReport::new(session.settings(), session.results());
    report.exported = exported;
    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
    }

    println!();
    for line in output::format_batch_summary(&report) {
        println!("{}", line);
    }
    Ok(())
}

/// Layer command-line flags over the loaded config.
fn apply_flags(config: &mut SessionConfig, args: &ProcessArgs) {
    if let Some(format) = args.format {
        config.compression.format = format.into();
    }
    if let Some(quality) = args.quality {
        config.compression.mode = CompressionKind::Quality;
        config.compression.quality = quality;
    }
    if let Some(target) = args.target {
        config.compression.mode = CompressionKind::Size;
        config.compression.target = target;
    }
    if let Some(unit) = args.unit {
        config.compression.unit = unit.into();
    }

    if let Some(percent) = args.scale {
        config.resize.mode = ResizeKind::Scale;
        config.resize.percent = percent;
    }
    if args.width.is_some() || args.height.is_some() {
        config.resize.mode = ResizeKind::Absolute;
        config.resize.width = args.width;
        config.resize.height = args.height;
    }
    if args.no_keep_aspect {
        config.resize.keep_aspect = false;
    }

    if let Some(degrees) = args.rotate {
        config.rotation = Rotation::from_degrees(degrees);
    }

    if args.crop {
        config.crop.enabled = true;
    }
    if let Some(width) = args.crop_width {
        config.crop.width = width;
    }
    if let Some(height) = args.crop_height {
        config.crop.height = height;
    }
    if args.crop_x.is_some() {
        config.crop.x = args.crop_x;
    }
    if args.crop_y.is_some() {
        config.crop.y = args.crop_y;
    }
    if let Some(zoom) = args.zoom {
        config.crop.zoom = zoom;
    }

    if let Some(speed) = args.avif_speed {
        config.codec.avif_speed = speed;
    }
}

/// Files as given, directories walked in file-name order.
fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(
                WalkDir::new(input)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| is_supported_input(p)),
            );
        } else {
            files.push(input.clone());
        }
    }
    files
}
