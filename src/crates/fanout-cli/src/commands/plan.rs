//! `fanout plan`: show the tasks a context expands into

use crate::context_file::ContextFile;
use crate::synthetic::open_session;
use anyhow::Result;
use colored::Colorize;
use fanout::{ExecutionContext, TaskBuilder};
use std::path::Path;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Identity")]
    identifier: String,
    #[tabled(rename = "Name")]
    display_name: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Role")]
    role: String,
}

pub fn handle(context: &Path) -> Result<()> {
    let ctx = ContextFile::load(context)?.into_context(open_session);
    let tasks = TaskBuilder::new(&ctx).build();

    if tasks.is_empty() {
        println!("{}", "No tasks: the context selects no identities or regions".yellow());
        return Ok(());
    }

    let rows: Vec<TaskRow> = tasks
        .iter()
        .map(|task| TaskRow {
            identifier: task.identifier.clone(),
            display_name: task.display_name.clone(),
            region: task.region.clone(),
            role: task.role.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    println!("{}", Table::new(rows));
    println!(
        "{} task(s), mode {}, {} region(s)",
        tasks.len().to_string().bold(),
        ctx.auth_mode(),
        ctx.regions().len()
    );
    Ok(())
}
