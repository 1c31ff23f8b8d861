mod app;
mod commands;
mod env;
mod run;
mod runtime;
mod scrape;

pub use app::run;
pub use commands::Commands;
pub use env::CliArgs;
pub use run::RunArgs;
pub use scrape::ScrapeArgs;
