use super::{prepare, print_plan};
use crate::context::Project;
use colored::Colorize;
use xenflow_cloud::{GlobalState, random_key};
use xenflow_config::MachineSpec;

/// Machines whose generated MAC is not persisted yet. Preview never saves,
/// so the address it shows for them is not the one `up` will attach.
fn unpersisted_macs<'a>(
    machines: impl IntoIterator<Item = &'a MachineSpec>,
    state: &GlobalState,
) -> Vec<String> {
    machines
        .into_iter()
        .filter(|m| m.network.generate_mac)
        .filter(|m| state.get_resource(&random_key(&m.mac_seed())).is_none())
        .map(|m| m.name.clone())
        .collect()
}

pub async fn handle(project: &Project, machine: Option<&str>) -> anyhow::Result<()> {
    println!("{}", format!("Stack: {}", project.stack.name).blue().bold());

    let saved = project.state_manager().load().await?;
    let pending = unpersisted_macs(project.stack.select(machine)?, &saved);

    let (stack, declared, _) = prepare(project, machine).await?;
    for d in &declared {
        tracing::debug!(resource = %d.resource.key(), "Declared");
        match d.mac {
            Some(mac) if pending.contains(&d.machine) => println!(
                "  {} {} (mac {}, {})",
                "•".cyan(),
                d.machine,
                mac,
                "not in state yet; `up` will generate its own".yellow()
            ),
            Some(mac) => println!("  {} {} (mac {})", "•".cyan(), d.machine, mac),
            None => println!("  {} {}", "•".cyan(), d.machine),
        }
    }

    print_plan(&stack.plan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::stack_with_secrets;
    use xenflow_cloud_xo::generate_xen_mac;

    #[test]
    fn test_unpersisted_macs() {
        let (file, _) = stack_with_secrets();
        let mut state = GlobalState::new();

        // Ubuntu has no generated MAC and is never reported
        assert_eq!(unpersisted_macs(&file.machines, &state), vec!["win2022"]);

        let win = file.machine("win2022").unwrap();
        generate_xen_mac(&mut state, &win.mac_seed()).unwrap();
        assert!(unpersisted_macs(&file.machines, &state).is_empty());
    }
}
