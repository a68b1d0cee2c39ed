//! Cloud assistant command-line interface.

pub mod repl;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use assistant_core::AgentSession;
use assistant_runtime::Settings;

/// Cloud Assistant - ask questions about your cloud resources
#[derive(Parser)]
#[command(name = "cloud-assistant")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Model to use (overrides ASSISTANT_MODEL)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Capability server file (overrides ASSISTANT_MCP_CONFIG)
    #[arg(long, global = true)]
    pub mcp_config: Option<PathBuf>,

    /// Keep going when a capability server fails to start
    #[arg(long, global = true)]
    pub allow_missing_servers: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Interactive conversation (the default)
    Chat {
        /// Print each intermediate message as it arrives
        #[arg(long)]
        stream: bool,
    },

    /// Ask a single question and exit
    Ask {
        /// The question
        #[arg(required = true)]
        prompt: Vec<String>,

        /// Print each intermediate message as it arrives
        #[arg(long)]
        stream: bool,
    },

    /// Show which cloud tools a query would select
    Tools {
        /// Query text; omit to list every cloud tool
        query: Vec<String>,

        /// Start capability servers and list the full tool pool instead
        #[arg(long)]
        pool: bool,
    },
}

impl Cli {
    /// Environment settings with command-line overrides applied
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::load()?;
        if let Some(model) = &self.model {
            settings.model.clone_from(model);
        }
        if let Some(path) = &self.mcp_config {
            settings.mcp_config = Some(path.clone());
        }
        if self.allow_missing_servers {
            settings.require_remote = false;
        }
        Ok(settings)
    }
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.settings()?;
    let command = cli.command.unwrap_or(Commands::Chat { stream: false });

    match command {
        Commands::Chat { stream } => {
            let mut session = settings.build_session()?;
            repl::print_welcome(&mut std::io::stdout())?;
            session.setup().await.context("setting up the assistant")?;

            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let result = repl::run(&mut session, stdin, &mut std::io::stdout(), stream).await;
            finish(&mut session).await;
            result
        }
        Commands::Ask { prompt, stream } => {
            let mut session = settings.build_session()?;
            let prompt = prompt.join(" ");
            let result = repl::answer(&mut session, &prompt, &mut std::io::stdout(), stream).await;
            finish(&mut session).await;
            result
        }
        Commands::Tools { query, pool } => {
            if pool {
                let mut session = settings.build_session()?;
                let loaded = session.load_tools().await;
                if loaded.is_ok() {
                    for name in session.tool_names() {
                        println!("{}", name);
                    }
                }
                finish(&mut session).await;
                return loaded.map_err(Into::into);
            }

            let factory = settings.factory();
            let tools = if query.is_empty() {
                factory.get_all_tools()
            } else {
                factory.find_tools_for_query(&query.join(" "))
            };
            for tool in tools {
                let tool = tool.instance();
                println!("{:<12} {:<8} {}", tool.name(), tool.provider(), tool.description());
            }
            Ok(())
        }
    }
}

async fn finish(session: &mut AgentSession) {
    let report = session.cleanup().await;
    for (name, error) in &report.failures {
        tracing::warn!(session = %name, %error, "Capability server did not shut down cleanly");
    }
}
