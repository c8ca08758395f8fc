//! Feature Toolkit Command Line
//!
//! Inspects feature files through the buffered stream and inverts matrices
//! stored in the dense text format.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use feature_stream::{
    keys, BigEndianOverride, BufferedFeatureStream, Config, Feature, FeatureSource, FeatureStream,
    FeatureStreamConfig, FileSource, FrameLayout,
};
use file_channel::ByteOrder;
use linalg::{Matrix, SquareMatrix};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(name = "featkit", version, about = "Speaker-recognition feature and matrix toolkit")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Feature file format: RAW, HTK, SPRO3 or SPRO4
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Coefficients per frame (required for RAW)
    #[arg(long, global = true)]
    pub vect_size: Option<usize>,

    /// Force big-endian decoding
    #[arg(long, global = true)]
    pub big_endian: bool,

    /// Configuration file (TOML, JSON, YAML, INI)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at DEBUG level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the frame layout of a feature file
    Info {
        /// Stream name, resolved against featureFilesPath and the extension
        name: String,
    },
    /// Print frames of a feature file
    Dump {
        name: String,
        /// First frame
        #[arg(long, default_value_t = 0)]
        start: u64,
        /// Number of frames, all remaining when absent
        #[arg(long)]
        count: Option<u64>,
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Invert a matrix stored in the dense text format
    Invert {
        path: PathBuf,
        /// Treat the matrix as symmetric positive definite (Cholesky)
        #[arg(long)]
        symmetric: bool,
        /// Save the inverse here instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct InfoReport<'a> {
    name: &'a str,
    path: String,
    format: String,
    big_endian: bool,
    #[serde(flatten)]
    layout: FrameLayout,
}

#[derive(Debug, Serialize)]
struct DumpFrame<'a> {
    index: u64,
    values: &'a [f64],
}

/// Install the global subscriber; `verbose` raises the level to DEBUG
pub fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Merge the configuration file, `FEATKIT_*` variables and command-line options
pub fn load_config(global: &GlobalArgs) -> Result<FeatureStreamConfig> {
    let mut builder = Config::builder();
    if let Some(path) = &global.config {
        builder = builder.file(path);
    }
    builder = builder.env();
    if let Some(format) = &global.format {
        builder = builder.set(keys::FILE_FORMAT, format.as_str())?;
    }
    if let Some(vect_size) = global.vect_size {
        builder = builder.set(keys::VECT_SIZE, vect_size as i64)?;
    }
    let config = FeatureStreamConfig::from_config(&builder.build()?)?;
    debug!("Resolved configuration: {:?}", config);
    Ok(config)
}

fn endian_override(global: &GlobalArgs) -> BigEndianOverride {
    if global.big_endian {
        BigEndianOverride::True
    } else {
        BigEndianOverride::Auto
    }
}

/// Execute `cli`, writing results to `out`
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<()> {
    match &cli.command {
        Command::Info { name } => info_cmd(&cli.global, name, out),
        Command::Dump {
            name,
            start,
            count,
            json,
        } => dump_cmd(&cli.global, name, *start, *count, *json, out),
        Command::Invert {
            path,
            symmetric,
            output,
        } => invert_cmd(path, *symmetric, output.as_ref(), out),
    }
}

fn info_cmd<W: Write>(global: &GlobalArgs, name: &str, out: &mut W) -> Result<()> {
    let config = load_config(global)?;
    let order = config.byte_order(endian_override(global));
    let path = config.path_for(name);
    let mut source = FileSource::new(name, &path, config.format, order, config.vect_size);
    let layout = source
        .layout()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let report = InfoReport {
        name,
        path: path.display().to_string(),
        format: format!("{:?}", config.format).to_uppercase(),
        big_endian: order == ByteOrder::Big,
        layout,
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

fn dump_cmd<W: Write>(
    global: &GlobalArgs,
    name: &str,
    start: u64,
    count: Option<u64>,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let config = load_config(global)?;
    let mut stream = BufferedFeatureStream::open(name, &config, endian_override(global))?;
    let total = stream.feature_count()?;
    info!("{}: {} features of size {}", name, total, stream.vect_size()?);

    stream.seek_feature(start);
    let mut feature = Feature::default();
    let mut index = start;
    let end = count.map_or(total, |c| start.saturating_add(c).min(total));
    while index < end && stream.read_feature(&mut feature)? {
        if json {
            let frame = DumpFrame {
                index,
                values: feature.values(),
            };
            writeln!(out, "{}", serde_json::to_string(&frame)?)?;
        } else {
            let values: Vec<String> = feature.values().iter().map(|v| v.to_string()).collect();
            writeln!(out, "{}: {}", index, values.join(" "))?;
        }
        index += 1;
    }
    Ok(())
}

fn invert_cmd<W: Write>(
    path: &Path,
    symmetric: bool,
    output: Option<&PathBuf>,
    out: &mut W,
) -> Result<()> {
    let matrix = Matrix::<f64>::load_text(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let inverse = if symmetric {
        let square = SquareMatrix::try_from(&matrix)?;
        let mut inverse = SquareMatrix::new(square.size());
        let det = square.invert(&mut inverse)?;
        writeln!(out, "determinant: {}", det)?;
        inverse.to_matrix()
    } else {
        matrix.invert()?
    };

    match output {
        Some(target) => {
            inverse.save_text(target)?;
            info!("Saved {}x{} inverse to {}", inverse.rows(), inverse.cols(), target.display());
        }
        None => {
            for r in 0..inverse.rows() {
                let values: Vec<String> = inverse.row(r).iter().map(|v| v.to_string()).collect();
                writeln!(out, "{}", values.join(" "))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_stream::{FeatureFileWriter, FileFormat};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("featkit").chain(args.iter().copied())).unwrap()
    }

    fn run_to_string(cli: &Cli) -> String {
        let mut out = Vec::new();
        run(cli, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn htk_fixture(dir: &Path) -> PathBuf {
        let path = dir.join("spk.htk");
        let mut writer =
            FeatureFileWriter::create(&path, FileFormat::Htk, ByteOrder::Big, 2).unwrap();
        for i in 0..5 {
            writer
                .write_feature(&Feature::from_values(vec![i as f64, i as f64 + 0.5]))
                .unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_parse_global_options_after_command() {
        let cli = parse(&["dump", "a", "--format", "raw", "--vect-size", "4", "--count", "2", "-v"]);
        assert_eq!(cli.global.format.as_deref(), Some("raw"));
        assert_eq!(cli.global.vect_size, Some(4));
        assert!(cli.global.verbose);
        assert!(matches!(
            cli.command,
            Command::Dump { start: 0, count: Some(2), json: false, .. }
        ));
    }

    #[test]
    fn test_info_reports_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = htk_fixture(dir.path());
        let cli = parse(&["info", path.to_str().unwrap(), "--format", "htk", "--big-endian"]);
        let report: serde_json::Value = serde_json::from_str(&run_to_string(&cli)).unwrap();
        assert_eq!(report["format"], "HTK");
        assert_eq!(report["vect_size"], 2);
        assert_eq!(report["feature_count"], 5);
        assert_eq!(report["header_length"], 12);
        assert_eq!(report["big_endian"], true);
    }

    #[test]
    fn test_dump_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = htk_fixture(dir.path());
        let name = path.to_str().unwrap();

        let cli = parse(&["dump", name, "--format", "HTK", "--big-endian", "--start", "3"]);
        assert_eq!(run_to_string(&cli), "3: 3 3.5\n4: 4 4.5\n");

        let cli = parse(&["dump", name, "--format", "HTK", "--big-endian", "--start", "1", "--count", "1", "--json"]);
        let frame: serde_json::Value = serde_json::from_str(run_to_string(&cli).trim()).unwrap();
        assert_eq!(frame["index"], 1);
        assert_eq!(frame["values"], serde_json::json!([1.0, 1.5]));
    }

    #[test]
    fn test_dump_requires_vect_size_for_raw() {
        let cli = parse(&["dump", "missing", "--format", "RAW"]);
        let mut out = Vec::new();
        assert!(run(&cli, &mut out).is_err());
    }

    #[test]
    fn test_invert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.txt");
        std::fs::write(&path, "2 2\n4 0\n0 16\n").unwrap();

        let cli = parse(&["invert", path.to_str().unwrap()]);
        assert_eq!(run_to_string(&cli), "0.25 0\n0 0.0625\n");

        let cli = parse(&["invert", path.to_str().unwrap(), "--symmetric"]);
        assert_eq!(run_to_string(&cli), "determinant: 64\n0.25 0\n0 0.0625\n");

        let saved = dir.path().join("inv.txt");
        let cli = parse(&["invert", path.to_str().unwrap(), "--output", saved.to_str().unwrap()]);
        assert!(run_to_string(&cli).is_empty());
        let inverse = Matrix::<f64>::load_text(&saved).unwrap();
        assert_eq!(inverse.at(1, 1).unwrap(), 0.0625);
    }
}
