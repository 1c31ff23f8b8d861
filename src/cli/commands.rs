use clap::Subcommand;

use super::run::RunArgs;
use super::scrape::ScrapeArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Open a page and print its element index
    Scrape(ScrapeArgs),

    /// Drive a task against a page with a scripted plan
    Run(RunArgs),
}
