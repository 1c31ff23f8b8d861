use anyhow::{Context, Result};
use cdp_adapter::{ChromiumDriver, PageDriver};
use clap::Args;
use perceiver_structural::{ElementIndexer, ElementTreeFormatter};
use tokio_util::sync::CancellationToken;
use tracing::info;
use wayfinder_core_types::{ExecCtx, TaskId};

use crate::config::EngineConfig;

#[derive(Args, Clone, Debug)]
pub struct ScrapeArgs {
    /// Page to open
    #[arg(long)]
    pub url: String,

    /// Print the full scrape as JSON instead of the element tree
    #[arg(long)]
    pub json: bool,

    /// Only list elements that accept input
    #[arg(long)]
    pub interactive_only: bool,
}

pub async fn cmd_scrape(args: ScrapeArgs, config: &EngineConfig) -> Result<()> {
    let driver = ChromiumDriver::launch(&config.browser)
        .await
        .context("Failed to launch browser")?;
    let outcome = scrape(&args, config, &driver).await;
    driver.shutdown().await;
    let output = outcome?;
    println!("{output}");
    Ok(())
}

async fn scrape(args: &ScrapeArgs, config: &EngineConfig, driver: &ChromiumDriver) -> Result<String> {
    driver
        .navigate(&args.url, config.agent.navigation_timeout())
        .await
        .with_context(|| format!("Failed to open {}", args.url))?;

    let ctx = ExecCtx::new(TaskId::new(), CancellationToken::new());
    let page = ElementIndexer::new(config.index.clone())
        .scrape(&ctx, driver)
        .await
        .context("Failed to scrape page")?;
    info!(url = page.url(), elements = page.len(), "page scraped");

    if args.json {
        return serde_json::to_string_pretty(&page).context("Failed to serialize scrape");
    }
    Ok(ElementTreeFormatter::new()
        .interactive_only(args.interactive_only)
        .with_max_text_length(config.agent.max_element_text_length)
        .format(&page))
}
