//! Turn a machine declaration into a registered VM resource

use crate::render;
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;
use xenflow_cloud::{ResourceConfig, ResourceOptions, Stack};
use xenflow_cloud_xo::{
    MacAddress, MemoryFixHook, PROVIDER_NAME, PowerState, VmDisk, VmIntent, VmNetwork,
    generate_xen_mac,
};
use xenflow_config::{MachineSpec, StackConfig};

/// A machine registered on the stack
#[derive(Debug)]
pub struct Declared {
    pub machine: String,
    pub resource: ResourceConfig,
    pub mac: Option<MacAddress>,
}

/// Object ids a machine refers to by name label
#[derive(Debug, Clone, PartialEq)]
struct Resolved {
    pool: String,
    template: String,
    network: String,
    disk_srs: Vec<String>,
}

async fn resolve(stack: &Stack, machine: &MachineSpec) -> anyhow::Result<Resolved> {
    let provider = stack.provider();
    let pool = provider.lookup("pool", &machine.pool, None).await?;
    let template = provider
        .lookup("template", &machine.template, Some(&pool))
        .await?;
    let network = provider.lookup("network", &machine.network.name, None).await?;

    let mut srs: HashMap<&str, String> = HashMap::new();
    let mut disk_srs = Vec::with_capacity(machine.disks.len());
    for disk in &machine.disks {
        let label = disk.sr.as_deref().unwrap_or(&machine.sr);
        if !srs.contains_key(label) {
            let id = provider.lookup("sr", label, None).await?;
            srs.insert(label, id);
        }
        disk_srs.push(srs[label].clone());
    }

    Ok(Resolved {
        pool,
        template,
        network,
        disk_srs,
    })
}

/// Resolve lookups, render cloud-init and register the VM.
///
/// Any lookup that does not match exactly one object fails the whole
/// declaration before anything is registered.
pub async fn declare_machine(
    stack: &mut Stack,
    machine: &MachineSpec,
    config: &StackConfig,
    memory_fix: Option<Arc<MemoryFixHook>>,
) -> anyhow::Result<Declared> {
    let resolved = resolve(stack, machine)
        .await
        .with_context(|| format!("failed to resolve objects for '{}'", machine.name))?;
    tracing::debug!(machine = %machine.name, pool = %resolved.pool, "Resolved lookups");

    let mac = if machine.network.generate_mac {
        Some(generate_xen_mac(stack, &machine.mac_seed())?)
    } else {
        None
    };

    let metadata = render::render_metadata(machine, mac)?;
    let userdata = render::render_userdata(machine, config)?;

    let disks = machine
        .disks
        .iter()
        .zip(resolved.disk_srs)
        .map(|(disk, sr_id)| VmDisk {
            name_label: disk.name.clone(),
            size: disk.size.bytes(),
            sr_id,
        })
        .collect();

    let intent = VmIntent {
        name_label: machine.name_label(),
        name_description: machine.description.clone(),
        tags: machine.tags.clone(),
        cpus: machine.cpus,
        memory_min: machine.memory.min_or_max().bytes(),
        memory_max: machine.memory.max.bytes(),
        template: resolved.template,
        disks,
        networks: vec![VmNetwork {
            network_id: resolved.network,
            mac_address: mac.map(|m| m.to_string()),
        }],
        cloud_config: userdata.expose().to_string(),
        cloud_network_config: metadata,
        power_state: PowerState::Running,
        hvm_boot_firmware: machine.firmware.as_str().to_string(),
        destroy_cloud_config_vdi_after_boot: true,
    };
    let resource = intent.into_resource(&machine.name, PROVIDER_NAME)?;

    let options = match memory_fix {
        Some(hook) if machine.fix_memory_after_create => ResourceOptions::after_create(hook),
        _ => ResourceOptions::default(),
    };
    stack.register(resource.clone(), options)?;

    Ok(Declared {
        machine: machine.name.clone(),
        resource,
        mac,
    })
}
