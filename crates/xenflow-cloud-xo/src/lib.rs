//! Xen Orchestra provider for xenflow
//!
//! This crate implements [`CloudProvider`](xenflow_cloud::CloudProvider) on
//! top of the Xen Orchestra JSON-RPC API, spoken over a websocket at
//! `<url>/api/`.
//!
//! # Features
//!
//! - Lookups of pools, templates, storage repositories and networks by name label
//! - VM create, update in place and delete
//! - MAC addresses under the XenSource OUI, stable per name
//! - [`MemoryFixHook`]: the post-create `vm.setAndRestart` memory fix
//!
//! # Configuration
//!
//! Read from the stack's `xenorchestra` namespace: `url`, `token` (secret),
//! and optionally `insecure`, `settleDelaySecs`, `timeoutSecs`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use xenflow_cloud_xo::{MemoryFixHook, XenOrchestraProvider, XoSettings};
//!
//! let settings = XoSettings::from_config(&config)?;
//! let factory = Arc::new(settings.transport_factory()?);
//! let provider = XenOrchestraProvider::new(factory, settings.token.clone());
//!
//! let sr = provider.find_unique("sr", "SR-PROD-1", None).await?;
//! let hook = MemoryFixHook::from_settings(&settings)?;
//! ```

pub mod api;
pub mod error;
pub mod mac;
pub mod provider;
pub mod remediation;
pub mod rpc;
pub mod settings;
pub mod vm;

#[cfg(test)]
mod testing;

pub use api::XoApi;
pub use error::{Result, XoError};
pub use mac::{MacAddress, XEN_OUI, generate_xen_mac};
pub use provider::{PROVIDER_NAME, XenOrchestraProvider};
pub use remediation::{HOOK_NAME, MemoryFixHook, RemediationRequest, RemediationStage};
pub use rpc::{RpcTransport, TlsMode, TransportFactory, WsTransport, WsTransportFactory, api_endpoint};
pub use settings::XoSettings;
pub use vm::{PowerState, VM_RESOURCE_TYPE, VmDisk, VmIntent, VmNetwork};
