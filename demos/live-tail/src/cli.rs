use clap::{Parser, Subcommand};

use tail_core::ClientConfig;

/// Follow the output of scheduled task executions as they run
#[derive(Parser, Debug)]
#[command(name = "live-tail")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Root of the scheduler HTTP API
    #[arg(long, env = "LIVE_TAIL_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// WebSocket endpoint of the event bus
    #[arg(long, env = "LIVE_TAIL_BUS_URL", default_value = "ws://localhost:8080/ws/websocket")]
    pub bus_url: String,

    /// Log output format (text, json, journald)
    #[arg(long, default_value = "text")]
    pub log_format: String,

    /// Log filter directive
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Wait for the next run of a task and stream its output until Ctrl+C
    Watch {
        /// Task identifier
        task_id: String,
    },

    /// Show the stored record of one execution
    Detail {
        /// Execution identifier
        execution_id: String,
    },

    /// Trigger a manual execution of a task
    Run {
        /// Task identifier
        task_id: String,

        /// Anti-forgery token, when the scheduler enforces one
        #[arg(long)]
        csrf: Option<String>,

        /// Stream the triggered run's output afterwards
        #[arg(short, long)]
        follow: bool,
    },
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        let csrf_token = match &self.command {
            Command::Run { csrf, .. } => csrf.clone(),
            _ => None,
        };
        ClientConfig {
            base_url: self.base_url.clone(),
            bus_url: self.bus_url.clone(),
            csrf_token,
            ..Default::default()
        }
    }
}
