use crate::Part;
use crate::context::Project;
use crate::render::{render_metadata, render_userdata};
use colored::Colorize;
use xenflow_cloud::random_key;
use xenflow_cloud_xo::generate_xen_mac;

/// Print one cloud-init document without contacting Xen Orchestra.
///
/// A generated MAC is read from state; if the machine was never applied a
/// fresh one is shown and nothing is saved.
pub async fn handle(
    project: &Project,
    machine: &str,
    part: Part,
    show_secrets: bool,
) -> anyhow::Result<()> {
    let spec = project.stack.machine(machine)?;

    match part {
        Part::Metadata => {
            let mac = if spec.network.generate_mac {
                let mut state = project.state_manager().load().await?;
                let seed = spec.mac_seed();
                if state.get_resource(&random_key(&seed)).is_none() {
                    eprintln!(
                        "{}",
                        format!("MAC for '{}' not in state yet; `up` will generate its own", machine)
                            .yellow()
                    );
                }
                Some(generate_xen_mac(&mut state, &seed)?)
            } else {
                None
            };
            print!("{}", render_metadata(spec, mac)?);
        }
        Part::Userdata => {
            if !show_secrets {
                anyhow::bail!("userdata embeds the guest password; pass --show-secrets to print it");
            }
            let config = project.secret_config()?;
            print!("{}", render_userdata(spec, &config)?.expose());
        }
    }
    Ok(())
}
