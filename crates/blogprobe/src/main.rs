#![allow(unused)]

use crate::prelude::*;
use clap::Parser;

mod client;
mod error;
mod logging;
mod prelude;
mod probes;
mod runner;
mod server;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Discovers undocumented blog-server behaviors (embed/script stripping, draft \
                  support, future-dated publishing, title encoding, multi-category support) by \
                  driving a real blog account through publish/verify/cleanup probe cycles"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Whether to display additional information.
    #[clap(long, env = "BLOGPROBE_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Run the capability probes against the configured blog accounts
    Run(runner::RunArgs),

    /// Serve a local stand-in blog for exercising the harness
    Serve(server::ServeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Run(args) => runner::run(args, app.global).await,
        SubCommands::Serve(args) => server::run(args, app.global).await,
    }
}
