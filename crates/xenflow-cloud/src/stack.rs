//! Desired-state stack: register, plan, apply, run post-create hooks

use crate::action::{Action, ActionType, ApplyResult, Plan};
use crate::error::{CloudError, Result};
use crate::hook::{ResourceHook, ResourceHookArgs};
use crate::provider::{CloudProvider, ResourceConfig, ResourceOutputs};
use crate::random::RandomSource;
use crate::state::{GlobalState, ResourceState, ResourceStatus, StateManager};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Options attached to a registered resource
#[derive(Clone, Default)]
pub struct ResourceOptions {
    /// Hooks run once, after the first successful creation
    pub after_create: Vec<Arc<dyn ResourceHook>>,
}

impl ResourceOptions {
    pub fn after_create(hook: Arc<dyn ResourceHook>) -> Self {
        Self {
            after_create: vec![hook],
        }
    }
}

impl std::fmt::Debug for ResourceOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.after_create.iter().map(|h| h.name()).collect();
        f.debug_struct("ResourceOptions")
            .field("after_create", &names)
            .finish()
    }
}

/// A named value surfaced to the operator after `up`
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub name: String,
    pub value: serde_json::Value,
}

impl Export {
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn display_value(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Outcome of [`Stack::up`]
#[derive(Debug, Clone)]
pub struct UpResult {
    pub plan: Plan,
    pub result: ApplyResult,
    /// Outputs of every registered resource that exists after the run, by name
    pub outputs: BTreeMap<String, ResourceOutputs>,
}

#[derive(Clone)]
struct Registration {
    resource: ResourceConfig,
    options: ResourceOptions,
}

type HookOutcome = (String, String, std::result::Result<(), String>);

/// A set of desired resources converged against one provider and one state file
pub struct Stack {
    name: String,
    provider: Arc<dyn CloudProvider>,
    state_manager: StateManager,
    state: GlobalState,
    registrations: Vec<Registration>,
}

impl Stack {
    /// Open a stack, loading its persisted state
    pub async fn open(
        name: impl Into<String>,
        provider: Arc<dyn CloudProvider>,
        state_manager: StateManager,
    ) -> Result<Self> {
        let state = state_manager.load().await?;
        Ok(Self {
            name: name.into(),
            provider,
            state_manager,
            state,
            registrations: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &Arc<dyn CloudProvider> {
        &self.provider
    }

    pub fn state(&self) -> &GlobalState {
        &self.state
    }

    /// Register a resource as desired state
    pub fn register(&mut self, resource: ResourceConfig, options: ResourceOptions) -> Result<()> {
        let key = resource.key();
        if self.registrations.iter().any(|r| r.resource.key() == key) {
            return Err(CloudError::InvalidConfig(format!(
                "resource {} registered twice",
                key
            )));
        }
        debug!(resource = %key, hooks = ?options, "Registered resource");
        self.registrations.push(Registration { resource, options });
        Ok(())
    }

    /// Diff registered resources against stored state.
    ///
    /// Resources present in state but no longer registered are left alone;
    /// teardown only happens through [`Stack::destroy`].
    pub fn plan(&self) -> Plan {
        let actions = self
            .registrations
            .iter()
            .map(|registration| {
                let resource = &registration.resource;
                let key = resource.key();
                let desired = resource.redacted_inputs();

                match self.state.get_resource(&key) {
                    None => Action::new(ActionType::Create, &key, &resource.resource_type, &resource.id)
                        .with_detail("provider", serde_json::json!(resource.provider)),
                    Some(existing) if existing.inputs() == Some(&desired) => {
                        Action::new(ActionType::NoOp, &key, &resource.resource_type, &resource.id)
                    }
                    Some(existing) => {
                        let changed = changed_keys(existing.inputs(), &desired);
                        Action::new(ActionType::Update, &key, &resource.resource_type, &resource.id)
                            .with_detail("changed", serde_json::json!(changed))
                    }
                }
            })
            .collect();

        Plan::new(actions)
    }

    /// Converge every registered resource, then run post-create hooks.
    ///
    /// The state lock is held for the whole run and the state is saved after
    /// every creation, so a hook can never fire twice for the same resource.
    /// If such a save fails no further resource is created, but hooks already
    /// started are still awaited.
    pub async fn up(&mut self) -> Result<UpResult> {
        let lock = self.state_manager.acquire_lock().await?;
        let outcome = self.apply_plan().await;
        let saved = self.state_manager.save(&self.state).await;
        lock.release().await?;
        saved?;
        outcome
    }

    async fn apply_plan(&mut self) -> Result<UpResult> {
        let plan = self.plan();
        let start = Instant::now();
        let mut result = ApplyResult::new();
        let mut outputs = BTreeMap::new();
        let mut hooks: JoinSet<HookOutcome> = JoinSet::new();

        info!(stack = %self.name, summary = %plan.summary(), "Applying plan");

        let registrations = self.registrations.clone();
        let mut state_unsaved = false;
        for (action, registration) in plan.actions.iter().zip(registrations.iter()) {
            let resource = &registration.resource;

            match action.action_type {
                ActionType::Create => {
                    info!(resource = %resource.id, "Creating {}", resource.resource_type);
                    let created = match self.provider.create(resource).await {
                        Ok(created) => created,
                        Err(e) => {
                            error!(resource = %resource.id, error = %e, "Create failed");
                            result.add_failure(action.id.clone(), e.to_string());
                            continue;
                        }
                    };
                    let Some(id) = output_id(&created) else {
                        result.add_failure(
                            action.id.clone(),
                            format!("provider returned no id for {}", resource.id),
                        );
                        continue;
                    };

                    let status = if registration.options.after_create.is_empty() {
                        ResourceStatus::Ready
                    } else {
                        ResourceStatus::Created
                    };
                    let mut record = ResourceState::new(&id, &resource.resource_type).with_status(status);
                    record.set_inputs(resource.redacted_inputs());
                    record.set_outputs(created.clone());
                    self.state.set_resource(action.resource_key.clone(), record);
                    match self.state_manager.save(&self.state).await {
                        Ok(()) => result.add_success(
                            action.id.clone(),
                            format!("created {} (id: {})", resource.id, id),
                        ),
                        Err(e) => {
                            error!(resource = %resource.id, id = %id, error = %e, "Saving state failed, halting creation");
                            result.add_failure(
                                action.id.clone(),
                                format!("created {} (id: {}) but state was not saved: {}", resource.id, id, e),
                            );
                            state_unsaved = true;
                        }
                    }

                    for hook in &registration.options.after_create {
                        let hook = Arc::clone(hook);
                        let hook_id = format!("hook:{}:{}", hook.name(), resource.id);
                        let key = action.resource_key.clone();
                        let args = ResourceHookArgs {
                            name: resource.id.clone(),
                            resource_type: resource.resource_type.clone(),
                            new_inputs: resource.redacted_inputs(),
                            new_outputs: Some(created.clone()),
                        };
                        info!(hook = %hook.name(), resource = %resource.id, "Starting post-create hook");
                        hooks.spawn(async move {
                            let outcome = hook.after_create(&args).await.map_err(|e| e.to_string());
                            (hook_id, key, outcome)
                        });
                    }

                    outputs.insert(resource.id.clone(), created);
                    if state_unsaved {
                        break;
                    }
                }
                ActionType::Update => {
                    let Some(existing) = self.state.get_resource(&action.resource_key).cloned() else {
                        result.add_failure(action.id.clone(), "resource vanished from state".to_string());
                        continue;
                    };
                    info!(resource = %resource.id, id = %existing.id, "Updating {}", resource.resource_type);
                    match self.provider.update(&existing.id, resource).await {
                        Ok(updated) => {
                            let mut record = existing;
                            record.set_inputs(resource.redacted_inputs());
                            record.set_outputs(updated.clone());
                            self.state.set_resource(action.resource_key.clone(), record);
                            result.add_success(action.id.clone(), format!("updated {}", resource.id));
                            outputs.insert(resource.id.clone(), updated);
                        }
                        Err(e) => {
                            error!(resource = %resource.id, error = %e, "Update failed");
                            result.add_failure(action.id.clone(), e.to_string());
                            outputs.insert(resource.id.clone(), existing.outputs());
                        }
                    }
                }
                ActionType::NoOp => {
                    if let Some(existing) = self.state.get_resource(&action.resource_key) {
                        outputs.insert(resource.id.clone(), existing.outputs());
                    }
                }
                ActionType::Delete => {
                    warn!(resource = %resource.id, "Delete actions are only applied by destroy");
                }
            }
        }

        while let Some(joined) = hooks.join_next().await {
            match joined {
                Ok((hook_id, key, Ok(()))) => {
                    info!(hook = %hook_id, "Post-create hook completed");
                    self.set_status(&key, ResourceStatus::Ready);
                    result.add_success(hook_id, "post-create hook completed".to_string());
                }
                Ok((hook_id, key, Err(message))) => {
                    error!(hook = %hook_id, error = %message, "Post-create hook failed");
                    self.set_status(&key, ResourceStatus::Error);
                    result.add_failure(hook_id, message);
                }
                Err(join_error) => {
                    error!(error = %join_error, "Post-create hook task aborted");
                    result.add_failure("hook".to_string(), join_error.to_string());
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(UpResult {
            plan,
            result,
            outputs,
        })
    }

    fn set_status(&mut self, key: &str, status: ResourceStatus) {
        if let Some(mut record) = self.state.get_resource(key).cloned() {
            record.status = status;
            self.state.set_resource(key.to_string(), record);
        }
    }

    /// Destroy resources of `resource_type` recorded in state, optionally only one by name
    pub async fn destroy(&mut self, resource_type: &str, only: Option<&str>) -> Result<ApplyResult> {
        let lock = self.state_manager.acquire_lock().await?;
        let start = Instant::now();
        let mut result = ApplyResult::new();

        let prefix = format!("{}:{}:", self.provider.name(), resource_type);
        let targets: Vec<(String, String, String)> = self
            .state
            .resources_of(self.provider.name(), resource_type)
            .into_iter()
            .filter_map(|(key, record)| {
                let name = key.strip_prefix(&prefix)?.to_string();
                Some((key.clone(), name, record.id.clone()))
            })
            .filter(|(_, name, _)| only.is_none_or(|wanted| wanted == name))
            .collect();

        for (key, name, id) in targets {
            let action_id = format!("delete-{}:{}", resource_type, name);
            info!(resource = %name, id = %id, "Destroying {}", resource_type);
            match self.provider.destroy(resource_type, &id).await {
                Ok(()) => {
                    self.state.remove_resource(&key);
                    result.add_success(action_id, format!("destroyed {} (id: {})", name, id));
                }
                Err(e) => {
                    error!(resource = %name, error = %e, "Destroy failed");
                    result.add_failure(action_id, e.to_string());
                }
            }
        }

        let saved = self.state_manager.save(&self.state).await;
        lock.release().await?;
        saved?;

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}

impl RandomSource for Stack {
    fn random_bytes(&mut self, name: &str, len: usize) -> Result<Vec<u8>> {
        self.state.random_bytes(name, len)
    }
}

fn output_id(outputs: &ResourceOutputs) -> Option<String> {
    outputs
        .get("id")
        .and_then(|v| v.as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn changed_keys(previous: Option<&serde_json::Value>, desired: &serde_json::Value) -> Vec<String> {
    let empty = serde_json::Map::new();
    let previous = previous.and_then(|v| v.as_object()).unwrap_or(&empty);
    let Some(desired) = desired.as_object() else {
        return Vec::new();
    };

    let mut keys: Vec<String> = desired
        .iter()
        .filter(|(k, v)| previous.get(*k) != Some(*v))
        .map(|(k, _)| k.clone())
        .chain(
            previous
                .keys()
                .filter(|k| !desired.contains_key(*k))
                .cloned(),
        )
        .collect();
    keys.sort();
    keys
}
