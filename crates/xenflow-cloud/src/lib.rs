//! xenflow provisioning engine
//!
//! This crate provides the declarative half of xenflow: resources are
//! registered as desired state, diffed against the persisted state file,
//! and converged through a [`CloudProvider`]. Hooks registered with
//! `after_create` run exactly once, after the first successful creation of
//! their resource.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  xenflow CLI                     │
//! │            (xenflow up/preview/destroy)          │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                xenflow-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   Stack (plan / apply / hooks / random)   │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ CloudProvider│  │  State Mgmt  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼────────┐
//! │ xen-orchestra  │
//! │   provider     │
//! └────────────────┘
//! ```

pub mod action;
pub mod error;
pub mod hook;
pub mod provider;
pub mod random;
pub mod stack;
pub mod state;

// Re-exports
pub use action::{Action, ActionType, ApplyResult, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use hook::{HookError, ResourceHook, ResourceHookArgs};
pub use provider::{AuthStatus, CloudProvider, ResourceConfig, ResourceOutputs};
pub use random::{RandomSource, random_key};
pub use stack::{Export, ResourceOptions, Stack, UpResult};
pub use state::{GlobalState, ResourceState, ResourceStatus, StateLock, StateManager};
