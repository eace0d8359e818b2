//! Layout Translator CLI - translate PDF documents from the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use layout_translator_core::{
    AppConfig, Lang, PdfDocument, ProviderKind, TaskOrchestrator, TaskState, TextColor,
    clear_translation_cache,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, ValueEnum)]
enum ColorOption {
    Black,
    DarkRed,
    Blue,
    Gray,
}

impl From<ColorOption> for TextColor {
    fn from(opt: ColorOption) -> Self {
        match opt {
            ColorOption::Black => Self::black(),
            ColorOption::DarkRed => Self::dark_red(),
            ColorOption::Blue => Self::blue(),
            ColorOption::Gray => Self::gray(0.4),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "layout-translate")]
#[command(author, version, about = "Translate PDF documents, keeping their layout", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Translation backend (google or openai)
    #[arg(long, global = true, env = "TRANSLATOR_PROVIDER")]
    provider: Option<ProviderKind>,

    /// Translation API base URL
    #[arg(long, global = true, env = "TRANSLATOR_API_BASE")]
    api_base: Option<String>,

    /// API key for OpenAI-compatible endpoints
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name for OpenAI-compatible endpoints
    #[arg(long, global = true, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// TrueType font used for translated text
    #[arg(long, global = true)]
    font: Option<PathBuf>,

    /// Maximum concurrent translation requests
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Chunk size in characters
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Disable caching
    #[arg(long, global = true)]
    no_cache: bool,

    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate a PDF document
    Translate {
        /// Input PDF file
        input: PathBuf,

        /// Target language code
        #[arg(short = 't', long)]
        target: Option<String>,

        /// Output PDF file (default: <input>-<target>.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Force a color for translated text
        #[arg(long, value_enum)]
        color: Option<ColorOption>,

        /// Force a font size for translated text
        #[arg(long)]
        font_size: Option<f32>,
    },
    /// Translate a piece of text and print it
    Text {
        text: String,

        /// Target language code
        #[arg(short = 't', long)]
        target: Option<String>,
    },
    /// Remove all entries from the disk translation cache
    ClearCache,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loaded configuration with command line overrides applied.
fn build_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    if let Some(provider) = args.provider {
        config.translator.provider = provider;
    }
    if let Some(api_base) = &args.api_base {
        config.translator.api_base = Some(api_base.clone());
    }
    if args.api_key.is_some() {
        config.translator.api_key.clone_from(&args.api_key);
    }
    if let Some(model) = &args.model {
        config.translator.model.clone_from(model);
    }
    if let Some(font) = &args.font {
        config.render.font_path = Some(font.clone());
    }
    if let Some(concurrency) = args.concurrency {
        config.dispatch.max_concurrency = concurrency;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.dispatch.chunk_size = chunk_size;
    }
    if args.no_cache {
        config.cache.memory_enabled = false;
        config.cache.disk_enabled = false;
    }

    Ok(config)
}

fn default_output_path(input: &Path, target: &Lang) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}-{target}.pdf"))
}

async fn translate_document(
    config: AppConfig,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<()> {
    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read input: {}", input.display()))?;
    let doc = PdfDocument::from_bytes(bytes.clone())
        .with_context(|| format!("Failed to load PDF: {}", input.display()))?;
    info!("Document has {} pages", doc.page_count());

    let target = config.target_lang.clone();
    let orchestrator =
        TaskOrchestrator::from_config(&config).context("Failed to initialize translator")?;
    info!(
        "Translating to {} with {}",
        target,
        orchestrator.dispatcher().translator_name()
    );

    let task_id = orchestrator.submit_job(bytes, target.clone());

    let pb = ProgressBar::new(100);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let state = loop {
        let progress = orchestrator.get_progress(&task_id);
        pb.set_position(u64::from(progress.percent));
        pb.set_message(progress.status);

        if let Some(task) = orchestrator.tracker().get(&task_id)
            && task.state.is_terminal()
        {
            break task.state;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    if state == TaskState::Failed {
        pb.abandon_with_message("failed");
        bail!("Translation failed (run with -v for details)");
    }
    pb.finish_with_message("done");

    let output_bytes = orchestrator
        .get_result(&task_id)
        .await
        .context("Failed to fetch translated document")?;
    let output_path = output.unwrap_or_else(|| default_output_path(input, &target));
    std::fs::write(&output_path, output_bytes)
        .with_context(|| format!("Failed to write output: {}", output_path.display()))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("Translated PDF saved to: {}", output_path.display());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = build_config(&args)?;

    match args.command {
        Command::Translate {
            input,
            target,
            output,
            color,
            font_size,
        } => {
            if let Some(target) = target {
                config.target_lang = Lang::new(target);
            }
            if let Some(color) = color {
                config.render.text_color = Some(color.into());
            }
            if font_size.is_some() {
                config.render.font_size = font_size;
            }
            config.validate().context("Invalid configuration")?;
            translate_document(config, &input, output).await
        }
        Command::Text { text, target } => {
            if let Some(target) = target {
                config.target_lang = Lang::new(target);
            }
            config.validate().context("Invalid configuration")?;
            let orchestrator = TaskOrchestrator::from_config(&config)
                .context("Failed to initialize translator")?;
            let translated = orchestrator.translate_text(&text, &config.target_lang).await;

            #[allow(clippy::print_stdout)]
            {
                println!("{translated}");
            }
            Ok(())
        }
        Command::ClearCache => {
            let count = clear_translation_cache(config.cache.disk_path.as_deref())
                .context("Failed to clear cache")?;

            #[allow(clippy::print_stdout)]
            {
                println!("Cleared {count} cached translations");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/tmp/report.pdf"), &Lang::new("ar"));
        assert_eq!(path, PathBuf::from("/tmp/report-ar.pdf"));
    }

    #[test]
    fn test_parse_translate_command() {
        let args = Args::parse_from([
            "layout-translate",
            "--provider",
            "openai",
            "--concurrency",
            "4",
            "translate",
            "in.pdf",
            "-t",
            "fa",
        ]);
        assert_eq!(args.provider, Some(ProviderKind::OpenAi));
        assert_eq!(args.concurrency, Some(4));
        assert!(matches!(
            args.command,
            Command::Translate { ref target, .. } if target.as_deref() == Some("fa")
        ));
    }
}
