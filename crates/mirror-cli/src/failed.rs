//! # Failed Subcommand
//!
//! Lists dead-lettered population tasks, newest first.

use anyhow::Result;
use clap::Args;
use mirror_db::{PopulationTask, TaskQueue};

use crate::connect_database;

/// Arguments for `mirror failed`.
#[derive(Args, Debug)]
pub struct FailedArgs {
    /// Maximum number of tasks to show.
    #[arg(long, default_value_t = 50)]
    pub limit: u32,

    /// Print JSON lines instead of a table.
    #[arg(long)]
    pub json: bool,
}

pub async fn run_failed(args: &FailedArgs) -> Result<u8> {
    let (_, queue) = connect_database().await?;
    let tasks = queue.list_failed(args.limit).await?;
    if tasks.is_empty() {
        eprintln!("no failed tasks");
        return Ok(0);
    }
    for task in &tasks {
        if args.json {
            println!("{}", serde_json::to_string(&task_json(task))?);
        } else {
            println!("{}", format_row(task));
        }
    }
    Ok(0)
}

fn task_file(task: &PopulationTask) -> &str {
    task.payload
        .get("file_name")
        .and_then(|v| v.as_str())
        .unwrap_or("<undecodable payload>")
}

fn task_json(task: &PopulationTask) -> serde_json::Value {
    serde_json::json!({
        "id": task.id,
        "payload": task.payload,
        "attempts": task.attempts,
        "last_error": task.last_error,
        "updated_at": task.updated_at,
    })
}

fn format_row(task: &PopulationTask) -> String {
    format!(
        "{}  {}  attempts={}  {}  {}",
        task.id,
        task.updated_at.format("%Y-%m-%d %H:%M:%S"),
        task.attempts,
        task_file(task),
        task.last_error.as_deref().unwrap_or("-"),
    )
}
