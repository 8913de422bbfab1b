//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use vaultdown_core::{
    ConversionJob, DocumentProcessor, MarkdownProcessor, Processed, ProgressReporter,
    TreeOptions, TreeSummary, convert_tree, is_document,
};
use vaultdown_index::PathIndex;
use vaultdown_shared::{AnchorStyle, AppConfig, ConvertConfig, Preset, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Turn a wiki-style markdown vault into plain markdown.
#[derive(Parser)]
#[command(
    name = "vaultdown",
    version,
    about = "Convert a wiki-style markdown vault into plain markdown for static site generators.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Convert a vault (or part of it) into a destination directory.
    Convert(ConvertArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// `convert` arguments.
///
/// Switches take an optional value (`--rmtag`, `--rmtag=false`). A switch that
/// is given overrides the preset, which overrides the config file.
#[derive(Args, Debug)]
pub(crate) struct ConvertArgs {
    /// Vault root. The link index is always built from it.
    #[arg(long)]
    pub src: PathBuf,

    /// Destination directory, or destination file when --tgt is a single document.
    #[arg(long)]
    pub dst: PathBuf,

    /// Subtree or single document of the vault to convert (defaults to --src).
    #[arg(long)]
    pub tgt: Option<PathBuf>,

    /// Preset: copy tags, title and alias.
    #[arg(long, conflicts_with = "standard")]
    pub obs: bool,

    /// Preset: obs plus remove tags, convert links, remove comments, strict refs.
    #[arg(long = "std")]
    pub standard: bool,

    /// Copy inline tags into the `tags` field.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub cptag: Option<bool>,

    /// Replace the `tags` field instead of merging.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub synctag: Option<bool>,

    /// Remove inline tags from the body.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub rmtag: Option<bool>,

    /// Remove `%%` and `<!-- -->` comments.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub cmmt: Option<bool>,

    /// Copy the first H1 into the `title` field.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub title: Option<bool>,

    /// Add the first H1 to the `aliases` field.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub alias: Option<bool>,

    /// Drop the alias equal to the previous title.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub synctlal: Option<bool>,

    /// Remove level-1 header lines.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub rmh1: Option<bool>,

    /// Convert wiki links and embeds.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub link: Option<bool>,

    /// Fail on links that cannot be resolved.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub strictref: Option<bool>,

    /// Strip `.md` from link targets and complete fragment-only links.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub format_link: Option<bool>,

    /// Anchor style: hugo or markdownit.
    #[arg(long)]
    pub format_anchor: Option<AnchorStyle>,

    /// Only write documents with `publish: true` or `draft: false`.
    #[arg(long = "pub", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub publishable: Option<bool>,

    /// Report the full error chain.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub debug: Option<bool>,

    /// Maximum concurrent document conversions.
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl ConvertArgs {
    /// Layer preset and explicit switches over `base`, then validate.
    fn resolve(&self, mut config: ConvertConfig) -> vaultdown_shared::Result<ConvertConfig> {
        if self.obs {
            config.apply_preset(Preset::Obsidian);
        }
        if self.standard {
            config.apply_preset(Preset::Standard);
        }

        let switches = [
            (self.cptag, &mut config.copy_tags),
            (self.synctag, &mut config.sync_tags),
            (self.rmtag, &mut config.remove_tags),
            (self.cmmt, &mut config.remove_comments),
            (self.title, &mut config.copy_title),
            (self.alias, &mut config.copy_alias),
            (self.synctlal, &mut config.sync_title_alias),
            (self.rmh1, &mut config.remove_h1),
            (self.link, &mut config.convert_links),
            (self.strictref, &mut config.strict_ref),
            (self.format_link, &mut config.format_link),
            (self.publishable, &mut config.publishable),
            (self.debug, &mut config.debug),
        ];
        for (given, field) in switches {
            if let Some(value) = given {
                *field = value;
            }
        }
        if let Some(style) = self.format_anchor {
            config.anchor_style = style;
        }

        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "vaultdown=info",
        1 => "vaultdown=debug",
        _ => "vaultdown=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Convert(args) => cmd_convert(args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_convert(args: ConvertArgs) -> Result<()> {
    let app = load_config()?;
    let config = Arc::new(args.resolve(app.convert)?);
    let concurrency = args.concurrency.unwrap_or(app.engine.concurrency);

    let src = std::path::absolute(&args.src)?;
    if !src.is_dir() {
        return Err(eyre!("source '{}' is not a directory", src.display()));
    }
    let dst = std::path::absolute(&args.dst)?;
    let target = match &args.tgt {
        Some(tgt) => std::path::absolute(tgt)?,
        None => src.clone(),
    };
    if !target.starts_with(&src) {
        return Err(eyre!(
            "target '{}' is not inside source '{}'",
            target.display(),
            src.display()
        ));
    }

    info!(
        src = %src.display(),
        dst = %dst.display(),
        target = %target.display(),
        concurrency,
        "converting vault"
    );

    let reporter = Arc::new(CliProgress::new());
    reporter.phase("Indexing vault");
    let index = {
        let src = src.clone();
        tokio::task::spawn_blocking(move || PathIndex::build(&src)).await??
    };
    if index.is_empty() {
        warn!(src = %src.display(), "vault has no files, links will not resolve");
    } else {
        info!(files = index.len(), "link index ready");
    }
    let processor = Arc::new(MarkdownProcessor::new(&src, Arc::new(index)));

    let summary = if target.is_file() {
        convert_single(processor, target, dst, config, reporter.as_ref()).await?
    } else {
        let options = TreeOptions {
            target: Some(target),
            concurrency,
            config,
        };
        let never_skip = Arc::new(|_: &Path| false);
        convert_tree(&src, &dst, never_skip, processor, &options, reporter).await?
    };

    println!();
    println!("  Vault converted successfully!");
    println!("  Documents:   {}", summary.documents);
    println!("  Unpublished: {}", summary.skipped);
    println!("  Copied:      {}", summary.copied);
    println!("  Directories: {}", summary.directories);
    println!("  Time:        {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

/// Convert one document straight to `dst`, bypassing the tree engine.
async fn convert_single(
    processor: Arc<MarkdownProcessor>,
    source: PathBuf,
    destination: PathBuf,
    config: Arc<ConvertConfig>,
    progress: &dyn ProgressReporter,
) -> Result<TreeSummary> {
    if !is_document(&source) {
        return Err(eyre!("target '{}' is not a markdown document", source.display()));
    }
    let start = Instant::now();
    progress.phase("Converting");
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let debug = config.debug;
    let job = ConversionJob {
        source,
        destination,
        config,
    };
    let reported = job.source.clone();
    let processed = tokio::task::spawn_blocking(move || processor.process(&job))
        .await?
        .map_err(|e| e.into_report(&reported, debug))?;

    let mut summary = TreeSummary::default();
    match processed {
        Processed::Written => {
            summary.documents = 1;
            progress.document_converted(&reported, 1);
        }
        Processed::Skipped => summary.skipped = 1,
    }
    summary.elapsed = start.elapsed();
    progress.done(&summary);
    Ok(summary)
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_copied(&self, path: &Path) {
        self.spinner.set_message(format!("Copying {}", path.display()));
    }

    fn document_converted(&self, path: &Path, done: usize) {
        self.spinner
            .set_message(format!("Converted [{done}] {}", path.display()));
    }

    fn done(&self, _summary: &TreeSummary) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert_args(argv: &[&str]) -> ConvertArgs {
        let mut full = vec!["vaultdown", "convert", "--src", "vault", "--dst", "public"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Convert(args) => args,
            Command::Config { .. } => panic!("expected convert"),
        }
    }

    #[test]
    fn switches_accept_optional_values() {
        let args = convert_args(&["--rmtag", "--cmmt=false", "--format-anchor", "markdownit"]);
        assert_eq!(args.rmtag, Some(true));
        assert_eq!(args.cmmt, Some(false));
        assert_eq!(args.link, None);
        assert_eq!(args.format_anchor, Some(AnchorStyle::MarkdownIt));
    }

    #[test]
    fn explicit_switch_overrides_preset() {
        let args = convert_args(&["--std", "--strictref=false"]);
        let config = args.resolve(ConvertConfig::default()).unwrap();
        assert!(config.convert_links && config.remove_tags);
        assert!(!config.strict_ref);
    }

    #[test]
    fn config_file_values_survive_without_flags() {
        let base = ConvertConfig {
            remove_h1: true,
            ..Default::default()
        };
        let config = convert_args(&["--obs"]).resolve(base).unwrap();
        assert!(config.remove_h1 && config.copy_tags);
    }

    #[test]
    fn invalid_combination_is_rejected() {
        let err = convert_args(&["--strictref"])
            .resolve(ConvertConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("strictref set but not link"));
    }

    #[test]
    fn presets_conflict() {
        let argv = ["vaultdown", "convert", "--src", "a", "--dst", "b", "--obs", "--std"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
