mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use tail_core::{ConsoleSink, LiveTail, detail};
use tail_model::{ExecutionId, TaskId};
use tail_observe::{LoggerConfig, logger_init};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 1) Logger
    let log_cfg = LoggerConfig::from_parts(&cli.log_format, &cli.log_level)?;
    logger_init(&log_cfg)?;

    // 2) Client
    let client = LiveTail::from_config(&cli.client_config())?;

    match cli.command {
        Command::Watch { task_id } => watch(&client, TaskId::parse(task_id)?).await?,
        Command::Detail { execution_id } => {
            let id = ExecutionId::parse(execution_id)?;
            match client.execution_detail(&id).await {
                Ok(record) => print!("{}", detail::render_detail(&record, client.renderer().offset())),
                Err(e) => {
                    error!(execution_id = %id, error = %e, "error fetching execution details");
                    eprintln!("Failed to fetch execution details");
                    std::process::exit(1);
                }
            }
        }
        Command::Run {
            task_id, follow, ..
        } => {
            let task = TaskId::parse(task_id)?;
            client.execute_task(&task).await?;
            println!("Task {task} triggered");
            if follow {
                watch(&client, task).await?;
            }
        }
    }

    Ok(())
}

/// Stream the next run of `task` to stdout until Ctrl+C.
async fn watch(client: &LiveTail, task: TaskId) -> Result<(), Box<dyn std::error::Error>> {
    client.connect();
    let session = client.open_session(task, Arc::new(ConsoleSink));
    info!("press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    session.close();
    client.disconnect();
    info!("shutting down...");
    Ok(())
}
