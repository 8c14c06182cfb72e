use crate::demo::{run_demo, run_parse_message, DemoArgs, ParseMessageArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use property_ledger::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Property Ledger",
    about = "Serve and exercise rule-based transaction allocation from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Allocate a seeded month of bank transactions and print the report
    Demo(DemoArgs),
    /// Decompose a bank loan payment message
    ParseMessage(ParseMessageArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::ParseMessage(args) => run_parse_message(args),
    }
}
