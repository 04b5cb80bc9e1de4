pub mod config;
pub mod destroy;
pub mod fix_memory;
pub mod preview;
pub mod render;
pub mod up;

use crate::context::Project;
use crate::declare::{Declared, declare_machine};
use colored::Colorize;
use std::sync::Arc;
use xenflow_cloud::{ActionType, Plan, Stack};
use xenflow_cloud_xo::{MemoryFixHook, XoSettings};
use xenflow_config::StackConfig;

/// Open the stack, check the token and register the selected machines
pub(crate) async fn prepare(
    project: &Project,
    machine: Option<&str>,
) -> anyhow::Result<(Stack, Vec<Declared>, XoSettings)> {
    let config: StackConfig = project.secret_config()?;
    let machines = project.stack.select(machine)?;
    let (mut stack, settings) = project.open_stack(&config).await?;

    println!("{}", "Connecting to Xen Orchestra...".blue());
    let auth = stack.provider().check_auth().await?;
    if !auth.authenticated {
        anyhow::bail!(
            "Xen Orchestra authentication failed: {}",
            auth.error.unwrap_or_default()
        );
    }
    println!(
        "  {} {} ({})",
        "✓".green(),
        settings.url,
        auth.account_info.unwrap_or_default()
    );

    let hook = Arc::new(MemoryFixHook::from_settings(&settings)?);
    let mut declared = Vec::with_capacity(machines.len());
    for spec in machines {
        declared.push(declare_machine(&mut stack, spec, &config, Some(Arc::clone(&hook))).await?);
    }

    Ok((stack, declared, settings))
}

pub(crate) fn print_plan(plan: &Plan) {
    println!();
    println!("{}", "Plan:".bold());
    for action in &plan.actions {
        let marker = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Update => "~".yellow(),
            ActionType::Delete => "-".red(),
            ActionType::NoOp => " ".normal(),
        };
        let mut line = format!("  {} {} {}", marker, action.resource_type, action.resource_id.cyan());
        if let Some(changed) = action.details.get("changed").and_then(|v| v.as_array()) {
            let keys: Vec<&str> = changed.iter().filter_map(|k| k.as_str()).collect();
            line.push_str(&format!(" ({})", keys.join(", ")));
        }
        println!("{}", line);
    }
    println!("  {}", plan.summary());
}
