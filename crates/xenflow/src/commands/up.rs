use super::{prepare, print_plan};
use crate::context::Project;
use crate::declare::Declared;
use colored::Colorize;
use xenflow_cloud::{ActionType, Export, ResourceOutputs};

/// Operator facing values of one machine after `up`
fn exports_of(declared: &Declared, outputs: &ResourceOutputs) -> Vec<Export> {
    let mut exports = Vec::new();
    if let Some(id) = outputs.get("id") {
        exports.push(Export::new(format!("{}.vm_id", declared.machine), id.clone()));
    }
    if let Some(mac) = declared.mac {
        exports.push(Export::new(
            format!("{}.vm_vif_mac_address", declared.machine),
            serde_json::json!(mac.to_string()),
        ));
    }
    exports
}

pub async fn handle(project: &Project, machine: Option<&str>, yes: bool) -> anyhow::Result<()> {
    println!("{}", format!("Stack: {}", project.stack.name).blue().bold());

    let (mut stack, declared, settings) = prepare(project, machine).await?;
    let plan = stack.plan();
    print_plan(&plan);

    if !yes {
        println!();
        println!("To apply this plan, run again with --yes");
        return Ok(());
    }
    if !plan.has_changes {
        println!();
        println!("{}", "Nothing to do.".green());
    }

    let hooked = declared
        .iter()
        .filter(|d| {
            project
                .stack
                .machine(&d.machine)
                .is_ok_and(|m| m.fix_memory_after_create)
        })
        .count();
    if hooked > 0 && !plan.actions_by_type(ActionType::Create).is_empty() {
        println!(
            "{}",
            format!(
                "New VMs get their memory fixed {}s after creation",
                settings.settle_delay.as_secs()
            )
            .dimmed()
        );
    }

    println!();
    let up = stack.up().await?;

    for ok in &up.result.succeeded {
        println!("  {} {}", "✓".green(), ok.message);
    }
    for failed in &up.result.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failed.action_id,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }

    let exports: Vec<Export> = declared
        .iter()
        .filter_map(|d| up.outputs.get(&d.machine).map(|o| exports_of(d, o)))
        .flatten()
        .collect();
    if !exports.is_empty() {
        println!();
        println!("{}", "Outputs:".bold());
        for export in &exports {
            println!("  {}: {}", export.name.cyan(), export.display_value());
        }
    }

    println!();
    if !up.result.is_success() {
        anyhow::bail!(
            "{} action(s) failed ({}ms)",
            up.result.failed.len(),
            up.result.duration_ms
        );
    }
    println!(
        "{}",
        format!("Done in {}ms", up.result.duration_ms).green().bold()
    );
    Ok(())
}
