use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "leafwatch")]
#[command(about = "Leaf disease monitoring service", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server and worker pool
    Server(ServerArgs),
    /// Discard every record in the result log and write a fresh header
    ResetLog(ResetLogArgs),
    /// Print the resolved configuration as TOML (secrets excluded)
    Config,
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (defaults to `server.bind_addr`)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct ResetLogArgs {
    /// Confirm that existing records should be deleted
    #[arg(long)]
    pub yes: bool,
}
