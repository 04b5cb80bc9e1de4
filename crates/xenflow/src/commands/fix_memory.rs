use crate::context::Project;
use colored::Colorize;
use std::time::Duration;
use xenflow_cloud_xo::{MemoryFixHook, RemediationRequest, XoSettings};
use xenflow_config::ByteSize;

pub async fn handle(
    project: &Project,
    vm_id: &str,
    memory: ByteSize,
    skip_wait: bool,
) -> anyhow::Result<()> {
    let config = project.secret_config()?;
    let settings = XoSettings::from_config(&config)?;
    let mut hook = MemoryFixHook::from_settings(&settings)?;
    if skip_wait {
        hook = hook.with_settle_delay(Duration::ZERO);
    }

    println!(
        "{}",
        format!("Setting memory of {} to {} and restarting...", vm_id, memory).blue()
    );
    hook.run(&RemediationRequest::new(vm_id, memory.bytes()))
        .await?;

    println!("{}", "Memory fixed.".green().bold());
    Ok(())
}
