// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use stringtable_translator::app_config::{self, Config, TranslationProvider};
use stringtable_translator::document::StringTableCodec;
use stringtable_translator::pipeline::{BatchScheduler, SchedulerSettings};
use stringtable_translator::providers;
use stringtable_translator::translation::{
    Glossary, GlossaryResolver, StopSignal, TranslationCache, TranslationClient,
};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    #[value(name = "lmstudio")]
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate every pending string table
    Build(RunArgs),

    /// Show what a build would translate, without sending any request
    DryRun(RunArgs),

    /// Check translated tables against their inputs
    Verify(TreeArgs),

    /// Show translation cache statistics
    CacheStats {
        /// Delete all entries made with this glossary version
        #[arg(long, value_name = "GLOSSARY_VERSION")]
        purge: Option<String>,

        /// Cache file (overrides the config)
        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct TreeArgs {
    /// Directory holding the source string tables
    #[arg(value_name = "INPUT_DIR")]
    input_dir: PathBuf,

    /// Directory the localized tree is written under
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Target language code (e.g., 'fa', 'de')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Language directory name to write into (e.g., 'it')
    #[arg(long)]
    language_slot: Option<String>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    tree: TreeArgs,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'en')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Units per backend request
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Documents translated at the same time
    #[arg(long)]
    concurrency: Option<usize>,

    /// Glossary file (CSV or JSON)
    #[arg(short, long)]
    glossary: Option<PathBuf>,

    /// Cache file
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

/// stringtable-translator - AI translation of game string tables
#[derive(Parser, Debug)]
#[command(name = "stringtable-translator")]
#[command(version)]
#[command(about = "AI-powered translation of game string tables")]
#[command(long_about = "Translates the text of XML string tables with AI providers while keeping every other byte, placeholder and markup untouched. Runs resume where they stopped.

EXAMPLES:
    stringtable-translator build game/text out            # Translate using default config
    stringtable-translator build -t de -p ollama game/text out
    stringtable-translator dry-run game/text out          # Pending work and cost estimate
    stringtable-translator verify game/text out           # Check written translations
    stringtable-translator cache-stats                    # Cache contents
    stringtable-translator completions bash > st.bash     # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. API keys may also come from OPENAI_API_KEY,
    ANTHROPIC_API_KEY or LMSTUDIO_API_KEY.

EXIT CODES:
    0  every document is complete (or verify found no issue)
    1  some documents failed or are still pending (or verify found issues)
    2  fatal error")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(LevelFilter::Trace)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji and ANSI color for log level
    fn decoration(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("❌ ", "1;31"),
            Level::Warn => ("🚧 ", "1;33"),
            Level::Info => (" ", "1;32"),
            Level::Debug => ("🔍 ", "1;36"),
            Level::Trace => ("📋 ", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (emoji, color) = Self::decoration(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                color,
                now,
                emoji,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Info until the config says otherwise
    if let Err(e) = CustomLogger::init(LevelFilter::Info) {
        eprintln!("Failed to initialize logger: {}", e);
        return ExitCode::from(2);
    }

    let cli = CommandLineOptions::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: CommandLineOptions) -> Result<ExitCode> {
    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "stringtable-translator", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = Config::load_or_create(&cli.config_path)?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone().into();
    }
    log::set_max_level(config.log_level.to_level_filter());

    match cli.command {
        Commands::Build(args) => {
            apply_run_overrides(&mut config, &args);
            config.validate().context("Configuration validation failed")?;
            build(&config, &args).await
        }
        Commands::DryRun(args) => {
            apply_run_overrides(&mut config, &args);
            config.validate_pipeline().context("Configuration validation failed")?;
            dry_run(&config, &args).await
        }
        Commands::Verify(args) => {
            apply_tree_overrides(&mut config, &args);
            config.validate_pipeline().context("Configuration validation failed")?;
            verify(&config, &args)
        }
        Commands::CacheStats { purge, cache } => {
            if let Some(cache) = cache {
                config.pipeline.cache_path = cache;
            }
            cache_stats(&config, purge).await
        }
        Commands::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn apply_tree_overrides(config: &mut Config, args: &TreeArgs) {
    if let Some(target_language) = &args.target_language {
        config.target_language = target_language.clone();
    }
    if let Some(slot) = &args.language_slot {
        config.pipeline.language_slot = Some(slot.clone());
    }
}

fn apply_run_overrides(config: &mut Config, args: &RunArgs) {
    apply_tree_overrides(config, &args.tree);

    if let Some(provider) = &args.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &args.model {
        // Find the provider config and update the model
        let provider_str = config.translation.provider.to_lowercase_string();
        if let Some(provider_config) = config
            .translation
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            provider_config.model = model.clone();
        }
    }
    if let Some(source_language) = &args.source_language {
        config.source_language = source_language.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.pipeline.batch_size = batch_size;
    }
    if let Some(concurrency) = args.concurrency {
        config.pipeline.concurrent_documents = concurrency;
    }
    if let Some(glossary) = &args.glossary {
        config.pipeline.glossary_path = Some(glossary.clone());
    }
    if let Some(cache) = &args.cache {
        config.pipeline.cache_path = cache.clone();
    }
}

/// Assemble a scheduler from the configuration
fn scheduler(config: &Config, args: &RunArgs, stop: StopSignal) -> Result<BatchScheduler> {
    let glossary = Glossary::load_optional(config.pipeline.glossary_path.as_deref())?;
    let resolver = GlossaryResolver::new(glossary)?;
    if !resolver.glossary().is_empty() {
        info!(
            "Glossary: {} terms (version {})",
            resolver.glossary().len(),
            resolver.version()
        );
    }

    let cache = TranslationCache::open(&config.pipeline.cache_path)?;
    let backend = providers::create_backend(config)?;
    let client = TranslationClient::from_config(config, backend, stop.clone());
    let codec = StringTableCodec::new(config.pipeline.translatable_elements.iter().cloned());

    let mut settings = SchedulerSettings::from_config(config, &args.tree.input_dir, &args.tree.output_dir);
    settings.show_progress = !args.no_progress;

    Ok(BatchScheduler::new(settings, codec, cache, resolver, client).with_stop_signal(stop))
}

async fn build(config: &Config, args: &RunArgs) -> Result<ExitCode> {
    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Stopping: waiting for in-flight requests, no new documents will start");
                stop.trigger();
            }
        });
    }

    info!(
        "🚀 {} - {} ({} -> {})",
        config.translation.provider.display_name(),
        config.translation.get_model(),
        config.source_language,
        config.target_language
    );

    let scheduler = scheduler(config, args, stop)?;
    let summary = scheduler.run().await?;

    let (hits, misses, rate) = scheduler.cache().session_stats();
    info!(
        "Cache lookups: {} hits, {} misses ({:.1}% hit rate)",
        hits,
        misses,
        rate * 100.0
    );
    println!("{}", summary);

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn dry_run(config: &Config, args: &RunArgs) -> Result<ExitCode> {
    let scheduler = scheduler(config, args, StopSignal::new())?;
    let report = scheduler
        .plan()
        .await?
        .with_price(config.translation.get_price_per_million_tokens());
    println!("{}", report);
    Ok(ExitCode::SUCCESS)
}

fn verify(config: &Config, args: &TreeArgs) -> Result<ExitCode> {
    let settings = SchedulerSettings::from_config(config, &args.input_dir, &args.output_dir);
    let scheduler = BatchScheduler::new(
        settings,
        StringTableCodec::new(config.pipeline.translatable_elements.iter().cloned()),
        TranslationCache::in_memory()?,
        GlossaryResolver::empty(),
        TranslationClient::new(
            providers::create_backend(config)?,
            &config.source_language,
            &config.target_language,
        ),
    );

    let report = scheduler.verify()?;
    println!("{}", report);
    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn cache_stats(config: &Config, purge: Option<String>) -> Result<ExitCode> {
    let cache = TranslationCache::open(&config.pipeline.cache_path)?;

    if let Some(version) = purge {
        let removed = cache.purge_glossary_version(&version).await?;
        info!("Removed {} entries for glossary version {}", removed, version);
    }

    let stats = cache.stats().await?;
    let current = Glossary::load_optional(config.pipeline.glossary_path.as_deref())?.version();

    println!("Cache: {}", cache.location().display());
    println!("Entries: {} ({} hits served)", stats.total_entries, stats.total_hits);
    for (language, count) in &stats.target_languages {
        println!("  language {}: {}", language, count);
    }
    for (version, count) in &stats.glossary_versions {
        let marker = if *version == current { " (current)" } else { "" };
        println!("  glossary {}: {}{}", version, count, marker);
    }
    Ok(ExitCode::SUCCESS)
}
