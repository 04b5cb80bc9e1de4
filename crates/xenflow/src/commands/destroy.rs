use crate::context::Project;
use colored::Colorize;
use xenflow_cloud_xo::{PROVIDER_NAME, VM_RESOURCE_TYPE};

pub async fn handle(project: &Project, machine: Option<&str>, yes: bool) -> anyhow::Result<()> {
    println!("{}", format!("Stack: {}", project.stack.name).blue().bold());

    let state = project.state_manager().load().await?;
    let prefix = format!("{}:{}:", PROVIDER_NAME, VM_RESOURCE_TYPE);
    let targets: Vec<(String, String)> = state
        .resources_of(PROVIDER_NAME, VM_RESOURCE_TYPE)
        .into_iter()
        .filter_map(|(key, record)| {
            let name = key.strip_prefix(&prefix)?;
            Some((name.to_string(), record.id.clone()))
        })
        .filter(|(name, _)| machine.is_none_or(|wanted| wanted == name))
        .collect();

    if targets.is_empty() {
        println!("{}", "No VMs recorded in state.".yellow());
        return Ok(());
    }

    println!();
    println!("{}", format!("VMs to delete ({}):", targets.len()).bold());
    for (name, id) in &targets {
        println!("  {} {} ({})", "-".red(), name.cyan(), id);
    }

    if !yes {
        println!();
        println!("{}", "Warning: these VMs and their disks will be deleted.".yellow());
        println!("To delete them, run again with --yes");
        return Ok(());
    }

    let config = project.secret_config()?;
    let (mut stack, _) = project.open_stack(&config).await?;
    let result = stack.destroy(VM_RESOURCE_TYPE, machine).await?;

    println!();
    for ok in &result.succeeded {
        println!("  {} {}", "✓".green(), ok.message);
    }
    for failed in &result.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failed.action_id,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }

    if !result.is_success() {
        anyhow::bail!("{} deletion(s) failed", result.failed.len());
    }
    println!("{}", "Destroyed.".green().bold());
    Ok(())
}
