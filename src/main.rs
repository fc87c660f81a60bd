use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Debug, Parser)]
/// Writes, reads and delivers 10Q collection files.
struct Command {
    #[command(subcommand)]
    subcmd: SubCommand,
}

#[derive(Debug, Subcommand)]
enum SubCommand {
    #[command(name = "dates")]
    /// Prints the due date and last payment date for a reference date.
    Dates(cmd::dates::Cmd),
    #[command(name = "read")]
    /// Dumps the transactions of a 10Q file as CSV.
    Read(cmd::read::Cmd),
    #[command(name = "send")]
    /// Sends the unsent payments of a payments file as one 10Q batch and
    /// marks the delivered ones as sent.
    Send(cmd::send::Cmd),
    #[command(name = "write")]
    /// Writes the unsent payments of a payments file as a 10Q file.
    Write(cmd::write::Cmd),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cmd = Command::parse();
    use SubCommand::*;
    match cmd.subcmd {
        Dates(cmd) => cmd.run(),
        Read(cmd) => cmd.run(),
        Send(cmd) => cmd.run(),
        Write(cmd) => cmd.run(),
    }
}
