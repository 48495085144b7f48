use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mirbib_core::config_file::{self, ConfigFile};
use mirbib_core::{
    AuthorMatrix, CorpusStats, DocumentMentions, MentionPipeline, OrganismFilter,
    PipelineOptions, ReferenceIdentifierSet, TextField, TokenSplit, ValidationPolicy, YearMatrix,
};
use mirbib_ingest::ColumnMap;
use mirbib_reference::ReferenceSources;
use mirbib_reporting::ExportFormat;
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// Top-N list size when neither the flag nor the config sets one.
const DEFAULT_TOP_N: usize = 10;
/// Minimum distinct authors per identifier in the author matrix.
const DEFAULT_MIN_AUTHORS: usize = 1;

/// miRNA mention extraction and bibliometric counts for literature exports
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Read configuration from this TOML file instead of the usual locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct ReferenceArgs {
    /// Path to miRBase miRNA.dat (plain or .gz) [env: MIRBIB_PRECURSORS]
    #[arg(long)]
    precursors: Option<PathBuf>,

    /// Path to miRBase mature.fa (plain or .gz) [env: MIRBIB_MATURE]
    #[arg(long)]
    mature: Option<PathBuf>,

    /// Keep only reference records mentioning this organism (default: homo)
    #[arg(long, conflicts_with = "all_species")]
    organism: Option<String>,

    /// Keep reference records of every species
    #[arg(long)]
    all_species: bool,
}

#[derive(Args, Debug, Clone)]
struct CorpusArgs {
    /// CSV export of the bibliographic corpus (plain or .gz)
    corpus: PathBuf,

    /// Column naming of the export: scopus or bibliometrix
    #[arg(long)]
    preset: Option<ColumnMap>,

    #[command(flatten)]
    reference: ReferenceArgs,

    /// Validation policy: mature or immature
    #[arg(long)]
    policy: Option<ValidationPolicy>,

    /// Token split: whitespace or slash
    #[arg(long)]
    split: Option<TokenSplit>,

    /// Comma-separated text fields to scan (title,abstract,keywords)
    #[arg(long, value_delimiter = ',')]
    fields: Vec<TextField>,

    /// Process documents in parallel
    #[arg(long)]
    parallel: bool,

    /// Output format: csv, json or markdown (default: from --output extension, else csv)
    #[arg(long)]
    format: Option<ExportFormat>,

    /// Write the table to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-document candidates and validated miRNA identifiers
    Extract {
        #[command(flatten)]
        corpus: CorpusArgs,
    },

    /// Mentions per year with trends and the top miRNAs of each year
    Yearly {
        #[command(flatten)]
        corpus: CorpusArgs,

        /// Size of each year's top list
        #[arg(long)]
        top: Option<usize>,
    },

    /// Author x miRNA matrix
    Authors {
        #[command(flatten)]
        corpus: CorpusArgs,

        /// Keep miRNAs studied by at least this many distinct authors
        #[arg(long)]
        min_authors: Option<usize>,

        /// Keep only the N authors with the most documents
        #[arg(long)]
        top_authors: Option<usize>,
    },

    /// Load the reference files and print statistics
    Reference {
        #[command(flatten)]
        reference: ReferenceArgs,

        /// Print every identifier
        #[arg(long)]
        list: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => config_file::read_config(path)?,
        None => config_file::load_config(),
    };
    let color = ColorMode(!cli.no_color && std::io::stderr().is_terminal());

    match cli.command {
        Command::Extract { corpus } => extract(&corpus, &config, color),
        Command::Yearly { corpus, top } => yearly(&corpus, top, &config, color),
        Command::Authors {
            corpus,
            min_authors,
            top_authors,
        } => authors(&corpus, min_authors, top_authors, &config, color),
        Command::Reference { reference, list } => reference_info(&reference, list, &config, color),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve reference locations: CLI flags > env vars > config file.
fn resolve_sources(args: &ReferenceArgs, config: &ConfigFile) -> anyhow::Result<ReferenceSources> {
    let section = config.reference.as_ref();

    let precursors = args
        .precursors
        .clone()
        .or_else(|| std::env::var("MIRBIB_PRECURSORS").ok().map(PathBuf::from))
        .or_else(|| section.and_then(|r| r.precursors_path.as_ref()).map(PathBuf::from));
    let mature = args
        .mature
        .clone()
        .or_else(|| std::env::var("MIRBIB_MATURE").ok().map(PathBuf::from))
        .or_else(|| section.and_then(|r| r.mature_path.as_ref()).map(PathBuf::from));

    let Some(precursors) = precursors else {
        bail!(
            "No miRNA.dat given. Pass --precursors, set MIRBIB_PRECURSORS, or set reference.precursors_path in the config"
        );
    };
    let Some(mature) = mature else {
        bail!(
            "No mature.fa given. Pass --mature, set MIRBIB_MATURE, or set reference.mature_path in the config"
        );
    };

    let organism = if args.all_species {
        OrganismFilter::any()
    } else if let Some(marker) = &args.organism {
        OrganismFilter::new(Some(marker))
    } else if let Some(marker) = section.and_then(|r| r.organism.as_deref()) {
        OrganismFilter::new(Some(marker))
    } else {
        OrganismFilter::default()
    };

    Ok(ReferenceSources {
        precursors,
        mature,
        organism,
    })
}

fn load_reference(sources: &ReferenceSources) -> anyhow::Result<ReferenceIdentifierSet> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Loading miRBase reference...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = mirbib_reference::load(sources);
    spinner.finish_and_clear();

    result.with_context(|| {
        format!(
            "Could not build the reference set from {} and {}",
            sources.precursors.display(),
            sources.mature.display()
        )
    })
}

/// Resolve pipeline options: CLI flags > config file > defaults.
fn resolve_options(args: &CorpusArgs, config: &ConfigFile) -> anyhow::Result<PipelineOptions> {
    let mut options = config.pipeline_options()?;
    if let Some(policy) = args.policy {
        options.policy = policy;
    }
    if let Some(split) = args.split {
        options.split = split;
    }
    if !args.fields.is_empty() {
        options.fields = args.fields.clone();
    }
    if args.parallel {
        options.parallel = true;
    }
    Ok(options)
}

fn resolve_columns(args: &CorpusArgs, config: &ConfigFile) -> anyhow::Result<ColumnMap> {
    if let Some(columns) = &args.preset {
        return Ok(columns.clone());
    }
    match config.ingest.as_ref().and_then(|i| i.preset.as_deref()) {
        Some(preset) => Ok(preset.parse()?),
        None => Ok(ColumnMap::default()),
    }
}

fn resolve_format(args: &CorpusArgs) -> ExportFormat {
    args.format
        .or_else(|| args.output.as_deref().and_then(ExportFormat::from_path))
        .unwrap_or_default()
}

/// Load everything and run the pipeline over the corpus.
fn run_corpus(
    args: &CorpusArgs,
    config: &ConfigFile,
    color: ColorMode,
) -> anyhow::Result<Vec<DocumentMentions>> {
    let options = resolve_options(args, config)?;
    let columns = resolve_columns(args, config)?;

    // Reference first: a bad reference aborts before the corpus is touched
    let sources = resolve_sources(&args.reference, config)?;
    let reference = load_reference(&sources)?;
    tracing::info!(identifiers = reference.len(), "reference loaded");

    let docs = mirbib_ingest::read_documents_from_path(&args.corpus, &columns)
        .with_context(|| format!("Could not read corpus {}", args.corpus.display()))?;
    if docs.is_empty() {
        tracing::warn!(path = %args.corpus.display(), "corpus has no rows");
    }

    let policy = options.policy;
    let pipeline = MentionPipeline::new(Arc::new(reference), options);

    let bar = ProgressBar::new(docs.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.green/dim}] {pos}/{len} documents")?
            .progress_chars("=> "),
    );
    let results = pipeline.process_all_with_progress(&docs, |_| bar.inc(1));
    bar.finish_and_clear();

    let stats = CorpusStats::from_results(&results);
    output::print_corpus_summary(&mut std::io::stderr(), &stats, policy, color)?;
    Ok(results)
}

/// Write `content` to the output path, or stdout when none was given.
fn emit(content: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            mirbib_reporting::write_to_path(content, path)?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// `trends.csv` -> `trends-top.csv`
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{suffix}"),
    };
    path.with_file_name(name)
}

fn extract(args: &CorpusArgs, config: &ConfigFile, color: ColorMode) -> anyhow::Result<()> {
    let results = run_corpus(args, config, color)?;
    let content = mirbib_reporting::render_documents(&results, resolve_format(args))?;
    emit(&content, args.output.as_deref())
}

fn yearly(
    args: &CorpusArgs,
    top: Option<usize>,
    config: &ConfigFile,
    color: ColorMode,
) -> anyhow::Result<()> {
    let top = top
        .or_else(|| config.aggregation.as_ref().and_then(|a| a.top_n))
        .unwrap_or(DEFAULT_TOP_N);
    let format = resolve_format(args);

    let results = run_corpus(args, config, color)?;
    let matrix = YearMatrix::build(&results);
    if matrix.years().is_empty() {
        bail!("No document in {} has a publication year", args.corpus.display());
    }

    let trends = mirbib_reporting::render_year_trends(&matrix, format)?;
    let tops = mirbib_reporting::render_top_per_year(&matrix.top_per_year(top), format)?;

    match args.output.as_deref() {
        Some(path) => {
            emit(&trends, Some(path))?;
            emit(&tops, Some(&sibling_path(path, "top")))?;
        }
        None => {
            emit(&trends, None)?;
            emit("\n", None)?;
            emit(&tops, None)?;
        }
    }
    Ok(())
}

fn authors(
    args: &CorpusArgs,
    min_authors: Option<usize>,
    top_authors: Option<usize>,
    config: &ConfigFile,
    color: ColorMode,
) -> anyhow::Result<()> {
    let section = config.aggregation.as_ref();
    let min_authors = min_authors
        .or_else(|| section.and_then(|a| a.min_authors))
        .unwrap_or(DEFAULT_MIN_AUTHORS);
    let top_authors = top_authors.or_else(|| section.and_then(|a| a.top_authors));

    let results = run_corpus(args, config, color)?;
    let mut matrix = AuthorMatrix::build(&results);
    if let Some(n) = top_authors {
        matrix = matrix.top_authors(n);
    }
    let matrix = matrix.filter_min_authors(min_authors);
    if matrix.is_empty() {
        tracing::warn!(min_authors, "no miRNA left in the author matrix");
    }

    let content = mirbib_reporting::render_author_matrix(&matrix, resolve_format(args))?;
    emit(&content, args.output.as_deref())
}

fn reference_info(
    args: &ReferenceArgs,
    list: bool,
    config: &ConfigFile,
    color: ColorMode,
) -> anyhow::Result<()> {
    let sources = resolve_sources(args, config)?;
    let reference = load_reference(&sources)?;

    let mut stdout = std::io::stdout().lock();
    output::print_reference_summary(&mut stdout, &reference, &sources.organism, color)?;
    if list {
        output::print_identifiers(&mut stdout, &reference)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mirbib").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_parses_extract_flags() {
        let cli = parse(&[
            "extract",
            "corpus.csv",
            "--policy",
            "immature",
            "--fields",
            "title,keywords",
            "--format",
            "md",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Extract { corpus } = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(corpus.policy, Some(ValidationPolicy::ImmatureStripped));
        assert_eq!(corpus.fields, vec![TextField::Title, TextField::Keywords]);
        assert_eq!(corpus.format, Some(ExportFormat::Markdown));
    }

    #[test]
    fn test_cli_rejects_bad_policy() {
        let result = Cli::try_parse_from(["mirbib", "extract", "c.csv", "--policy", "fuzzy"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_organism_conflicts_with_all_species() {
        let result = Cli::try_parse_from([
            "mirbib",
            "reference",
            "--organism",
            "mus",
            "--all-species",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let config: ConfigFile = toml_config(
            "[reference]\nprecursors_path = \"/cfg/miRNA.dat\"\nmature_path = \"/cfg/mature.fa\"\norganism = \"mus\"\n",
        );
        let cli = parse(&["reference", "--precursors", "/cli/miRNA.dat", "--all-species"]);
        let Command::Reference { reference, .. } = cli.command else {
            panic!("expected reference");
        };
        let sources = resolve_sources(&reference, &config).unwrap();
        assert_eq!(sources.precursors, PathBuf::from("/cli/miRNA.dat"));
        assert_eq!(sources.organism, OrganismFilter::any());
    }

    #[test]
    fn test_config_organism_used_without_flags() {
        let config = toml_config(
            "[reference]\nprecursors_path = \"/cfg/miRNA.dat\"\nmature_path = \"/cfg/mature.fa\"\norganism = \"Mus\"\n",
        );
        let cli = parse(&["reference"]);
        let Command::Reference { reference, .. } = cli.command else {
            panic!("expected reference");
        };
        let sources = resolve_sources(&reference, &config).unwrap();
        assert_eq!(sources.organism.marker(), Some("mus"));
    }

    #[test]
    fn test_options_merge_flags_over_config() {
        let config = toml_config("[extraction]\npolicy = \"immature\"\nsplit = \"slash\"\n");
        let cli = parse(&["extract", "c.csv", "--policy", "mature"]);
        let Command::Extract { corpus } = cli.command else {
            panic!("expected extract");
        };
        let options = resolve_options(&corpus, &config).unwrap();
        assert_eq!(options.policy, ValidationPolicy::MatureAware);
        assert_eq!(options.split, TokenSplit::WhitespaceAndSlash);
    }

    #[test]
    fn test_format_from_output_extension() {
        let cli = parse(&["extract", "c.csv", "-o", "out/mentions.json"]);
        let Command::Extract { corpus } = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(resolve_format(&corpus), ExportFormat::Json);
    }

    #[test]
    fn test_sibling_path() {
        assert_eq!(
            sibling_path(Path::new("out/trends.csv"), "top"),
            PathBuf::from("out/trends-top.csv")
        );
        assert_eq!(sibling_path(Path::new("trends"), "top"), PathBuf::from("trends-top"));
    }

    fn toml_config(text: &str) -> ConfigFile {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, text).unwrap();
        config_file::read_config(&path).unwrap()
    }
}
