use anyhow::{Context, Result, bail};
use clap::error::ErrorKind;
use clap::{Args, Parser};
use std::path::{Path, PathBuf};

use crate::config::{
    InputFormat, OutputFormat, RunSettings, detect_input_format, detect_output_format,
};
use crate::network::NetworkCounts;
use crate::pipeline::{count_dataset, scan_relations, tag_dataset};
use crate::sinks::{DatasetWriter, JsonlWriter, OplWriter};
use crate::source::{DatasetReader, OplReader, PbfReader};

pub const TAG_USAGE: [&str; 2] = [
    "Program Usage: tag-networks -i input_file -o output_file",
    "Example: tag-networks -i germany.osm.pbf -o germany_new.osm.opl",
];

pub const COUNT_USAGE: [&str; 2] = [
    "Program Usage: network-counts -i input_file",
    "Example: network-counts -i germany.osm.pbf",
];

/// Flags shared by both tools.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Settings file (YAML)
    #[arg(long, env = "CYCLENET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Input format (detected from the extension if omitted)
    #[arg(long, value_enum)]
    pub input_format: Option<InputFormat>,

    /// Number of threads (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Record only way members of route relations
    #[arg(long)]
    pub way_members_only: bool,

    /// Hide the progress counter
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommonArgs {
    /// Settings file and environment, with flags given on the command line
    /// taking precedence.
    pub fn settings(&self) -> Result<RunSettings> {
        let mut settings = RunSettings::load(self.config.as_deref())
            .context("CLI: Failed to load settings")?;
        if self.threads.is_some() {
            settings.threads = self.threads;
        }
        if self.way_members_only {
            settings.way_members_only = true;
        }
        if self.quiet {
            settings.progress = false;
        }
        Ok(settings)
    }
}

/// Adds cycle network classification tags to ways referenced by cycle route
/// relations.
#[derive(Parser, Debug)]
#[command(name = "tag-networks", author, version, long_about = None)]
pub struct TagCli {
    /// Input dataset (.osm.pbf or .opl)
    #[arg(short = 'i', long = "input_file", visible_alias = "input-file")]
    pub input_file: PathBuf,

    /// Output dataset (.opl or .jsonl)
    #[arg(short = 'o', long = "output_file", visible_alias = "output-file")]
    pub output_file: PathBuf,

    /// Output format (detected from the extension if omitted)
    #[arg(long, value_enum)]
    pub output_format: Option<OutputFormat>,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Counts ways carrying each cycle network classification tag.
#[derive(Parser, Debug)]
#[command(name = "network-counts", author, version, long_about = None)]
pub struct CountCli {
    /// Input dataset (.osm.pbf or .opl)
    #[arg(short = 'i', long = "input_file", visible_alias = "input-file")]
    pub input_file: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Parses the command line. Argument errors print the two usage lines and
/// exit with status 2; help and version output are left to clap.
pub fn parse_or_usage<C: Parser>(usage: [&str; 2]) -> C {
    match C::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(_) => {
            for line in usage {
                println!("{}", line);
            }
            std::process::exit(2);
        }
    }
}

pub fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn init_threads(settings: &RunSettings) -> Result<()> {
    if let Some(threads) = settings.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("CLI: Failed to initialize thread pool")?;
    }
    Ok(())
}

pub fn init_reader(
    path: &Path,
    format: Option<InputFormat>,
    settings: &RunSettings,
) -> Result<Box<dyn DatasetReader>> {
    let format = format
        .or_else(|| detect_input_format(path))
        .context("CLI: Could not detect input format from extension; use --input-format")?;
    tracing::info!("Source: {:?} -> {:?}", format, path);
    Ok(match format {
        InputFormat::Pbf => Box::new(PbfReader::new(path, settings.progress)),
        InputFormat::Opl => Box::new(OplReader::new(path, settings.batch_size, settings.progress)),
    })
}

pub fn init_writer(
    path: &Path,
    format: Option<OutputFormat>,
) -> Result<Box<dyn DatasetWriter + Send>> {
    let format = format
        .or_else(|| detect_output_format(path))
        .context("CLI: Could not detect output format from extension; use --output-format")?;
    tracing::info!("Sink: {:?} -> {:?}", format, path);
    Ok(match format {
        OutputFormat::Opl => Box::new(OplWriter::new(path)?),
        OutputFormat::Jsonl => Box::new(JsonlWriter::new(path)?),
    })
}

/// True when `output` names the file `input` points at, however either path
/// is spelled. A missing input never matches; the reader reports it.
fn same_file(input: &Path, output: &Path) -> bool {
    let Ok(input_path) = input.canonicalize() else {
        return false;
    };
    match output.canonicalize() {
        Ok(output_path) => output_path == input_path || same_inode(input, output),
        Err(_) => resolve_new_file(output).is_some_and(|path| path == input_path),
    }
}

/// Absolute location a not yet existing file would be created at.
fn resolve_new_file(path: &Path) -> Option<PathBuf> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some(parent.canonicalize().ok()?.join(path.file_name()?))
}

#[cfg(unix)]
fn same_inode(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_inode(_: &Path, _: &Path) -> bool {
    false
}

/// Scans route relations, then rewrites the dataset with classification
/// tags on member ways.
pub fn run_tag(cli: &TagCli) -> Result<NetworkCounts> {
    let settings = cli.common.settings()?;
    init_threads(&settings)?;

    if same_file(&cli.input_file, &cli.output_file) {
        bail!("CLI: Output file must differ from the input file");
    }
    println!("osm file = {}", cli.input_file.display());

    let reader = init_reader(&cli.input_file, cli.common.input_format, &settings)?;
    let start = std::time::Instant::now();
    let sets = scan_relations(reader.as_ref(), &settings)?;

    let writer = init_writer(&cli.output_file, cli.output_format)?;
    let counts = tag_dataset(reader.as_ref(), &sets, writer)
        .with_context(|| format!("Pipeline: Tagging into {:?} failed", cli.output_file))?;

    for line in counts.tagged_report() {
        println!("{}", line);
    }
    tracing::info!("Done in {:.2}s", start.elapsed().as_secs_f64());
    Ok(counts)
}

/// Counts ways that already carry classification tags.
pub fn run_count(cli: &CountCli) -> Result<NetworkCounts> {
    let settings = cli.common.settings()?;
    init_threads(&settings)?;

    println!("osm file = {}", cli.input_file.display());
    let reader = init_reader(&cli.input_file, cli.common.input_format, &settings)?;
    let counts = count_dataset(reader.as_ref())?;

    for line in counts.audit_report() {
        println!("{}", line);
    }
    Ok(counts)
}
