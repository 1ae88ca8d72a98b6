//! Command line interface.

use builtin_agents::AgentKind;
use clap::{Args, Parser, Subcommand};

use crate::worker::WorkerOptions;

#[derive(Debug, Parser)]
#[command(name = "agent-runtime")]
#[command(version, about = "Authenticated A2A agent endpoints")]
#[command(long_about = "Without a subcommand, runs every built-in agent as a supervised \
worker process (calculator on 9000, factor on 9001). Requires API_PASSWORD.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the calculator agent (default port 9000)
    Calculator(AgentArgs),
    /// Run the factor agent (default port 9001)
    Factor(AgentArgs),
}

#[derive(Debug, Clone, Args)]
pub struct AgentArgs {
    /// Port number
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Spawned by the supervisor: announce readiness on stdout and stop when
    /// stdin closes
    #[arg(long, hide = true)]
    pub supervised: bool,
}

impl Command {
    pub fn kind(&self) -> AgentKind {
        match self {
            Command::Calculator(_) => AgentKind::Calculator,
            Command::Factor(_) => AgentKind::Factor,
        }
    }

    pub fn into_options(self) -> WorkerOptions {
        let kind = self.kind();
        let (Command::Calculator(args) | Command::Factor(args)) = self;
        WorkerOptions {
            kind,
            port: args.port,
            supervised: args.supervised,
        }
    }
}
