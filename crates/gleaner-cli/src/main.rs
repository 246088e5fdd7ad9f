use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gleaner_client::{CssExtractor, FetchOptions, ReqwestFetcher};
use gleaner_core::{
    BatchConfig, BatchService, Extractor, RetryPolicy, Template, load_templates_from_path,
};

#[derive(Parser)]
#[command(name = "gleaner", version, about = "Template-driven HTML record extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every template's page and print the extracted records as JSON
    Scrape {
        /// YAML template file (one template per document)
        templates: PathBuf,

        /// User-Agent header sent with every request
        #[arg(long, env = "GLEANER_USER_AGENT")]
        user_agent: Option<String>,

        /// Per-request timeout in seconds
        #[arg(long, env = "GLEANER_TIMEOUT_SECS", default_value_t = 30)]
        timeout_secs: u64,

        /// Maximum templates scraped at once, 0 for unbounded (default: GLEANER_CONCURRENCY or 8)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Retries for transient fetch failures (default: GLEANER_RETRIES or 0)
        #[arg(long)]
        retries: Option<u32>,

        /// Upper bound in seconds on one template's fetch, retries included
        #[arg(long, env = "GLEANER_TEMPLATE_TIMEOUT_SECS")]
        template_timeout_secs: Option<u64>,

        /// Print single-line JSON instead of pretty-printed
        #[arg(long, default_value_t = false)]
        compact: bool,

        /// Exit with an error if any template failed
        #[arg(long, default_value_t = false)]
        fail_on_error: bool,
    },

    /// Validate templates without fetching anything
    Check {
        /// YAML template file (one template per document)
        templates: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout is reserved for JSON output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gleaner=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            templates,
            user_agent,
            timeout_secs,
            concurrency,
            retries,
            template_timeout_secs,
            compact,
            fail_on_error,
        } => {
            let mut options = FetchOptions::default().with_timeout(Duration::from_secs(timeout_secs));
            if let Some(user_agent) = user_agent {
                options = options.with_user_agent(user_agent);
            }

            let mut config = BatchConfig::from_env()?;
            if let Some(concurrency) = concurrency {
                config = config.with_max_concurrency(concurrency);
            }
            if let Some(retries) = retries {
                config = config.with_retry(RetryPolicy::new(retries));
            }
            if let Some(secs) = template_timeout_secs {
                config = config.with_template_timeout(Duration::from_secs(secs));
            }

            cmd_scrape(&templates, options, config, compact, fail_on_error).await?;
        }
        Commands::Check { templates } => {
            cmd_check(&templates)?;
        }
    }

    Ok(())
}

async fn cmd_scrape(
    path: &Path,
    options: FetchOptions,
    config: BatchConfig,
    compact: bool,
    fail_on_error: bool,
) -> Result<()> {
    // 1. Load templates
    let templates = load_templates_from_path(path).context("Failed to load templates")?;
    tracing::info!(
        templates = templates.len(),
        path = %path.display(),
        "Loaded templates"
    );

    // 2. Scrape them all
    let fetcher = ReqwestFetcher::with_options(options).context("Failed to create HTTP client")?;
    let service = BatchService::with_config(fetcher, CssExtractor::new(), config);
    let batch = service.scrape_templates(templates).await;

    // 3. Output JSON to stdout
    let output = if compact {
        serde_json::to_string(&batch)?
    } else {
        serde_json::to_string_pretty(&batch)?
    };
    println!("{output}");

    if fail_on_error && batch.failed() > 0 {
        anyhow::bail!("{} of {} templates failed", batch.failed(), batch.len());
    }

    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    let templates = load_templates_from_path(path).context("Failed to load templates")?;

    let extractor = CssExtractor::new();
    let mut invalid = 0;
    let report: Vec<serde_json::Value> = templates
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let url = raw.url.clone().unwrap_or_default();
            let checked = Template::from_raw(raw)
                .and_then(|template| extractor.validate(&template.selectors).map(|()| template));
            match checked {
                Ok(template) => serde_json::json!({
                    "index": index,
                    "url": url,
                    "valid": true,
                    "selectors": template.selectors,
                }),
                Err(e) => {
                    invalid += 1;
                    serde_json::json!({
                        "index": index,
                        "url": url,
                        "valid": false,
                        "error": e,
                    })
                }
            }
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&report)?);

    if invalid > 0 {
        anyhow::bail!("{invalid} of {} templates are invalid", report.len());
    }

    Ok(())
}
