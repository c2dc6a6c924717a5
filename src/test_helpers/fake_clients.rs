//! In-memory instance counter, service adapter and secret manager.

use crate::client::{
    AdapterError, BackendError, BindingRequest, InstanceCounter, SecretManager, SecretsError,
    ServiceAdapter,
};
use crate::models::{Binding, Plan};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterCall {
    CountPlan(String),
    CountOffering,
}

#[derive(Debug, Default)]
struct CounterState {
    counts: HashMap<String, u32>,
    failure: Option<BackendError>,
    calls: Vec<CounterCall>,
}

/// Instance counter backed by a fixed map of plan counts
#[derive(Debug, Default)]
pub struct FakeInstanceCounter {
    state: Mutex<CounterState>,
}

impl FakeInstanceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_count(&self, plan_id: &str, count: u32) {
        self.state.lock().counts.insert(plan_id.to_string(), count);
    }

    pub fn fail(&self, err: BackendError) {
        self.state.lock().failure = Some(err);
    }

    pub fn calls(&self) -> Vec<CounterCall> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl InstanceCounter for FakeInstanceCounter {
    async fn count_instances_of_plan(&self, plan_id: &str) -> Result<u32, BackendError> {
        let mut state = self.state.lock();
        state.calls.push(CounterCall::CountPlan(plan_id.to_string()));
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }
        Ok(state.counts.get(plan_id).copied().unwrap_or(0))
    }

    async fn count_instances_of_service_offering(
        &self,
    ) -> Result<HashMap<String, u32>, BackendError> {
        let mut state = self.state.lock();
        state.calls.push(CounterCall::CountOffering);
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }
        Ok(state.counts.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCall {
    DashboardUrl { instance_id: String, plan_id: String },
    CreateBinding(BindingRequest),
    DeleteBinding(BindingRequest),
}

#[derive(Debug)]
struct AdapterState {
    dashboard_url: Result<String, AdapterError>,
    binding: Result<Binding, AdapterError>,
    unbind: Result<(), AdapterError>,
    calls: Vec<AdapterCall>,
}

impl Default for AdapterState {
    fn default() -> Self {
        Self {
            dashboard_url: Err(AdapterError::NotImplemented),
            binding: Ok(Binding {
                credentials: serde_json::json!({ "password": "secret" }),
                syslog_drain_url: None,
                route_service_url: None,
            }),
            unbind: Ok(()),
            calls: Vec::new(),
        }
    }
}

/// Service adapter returning scripted results
#[derive(Debug, Default)]
pub struct FakeServiceAdapter {
    state: Mutex<AdapterState>,
}

impl FakeServiceAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dashboard_url(&self, result: Result<String, AdapterError>) {
        self.state.lock().dashboard_url = result;
    }

    pub fn set_binding(&self, result: Result<Binding, AdapterError>) {
        self.state.lock().binding = result;
    }

    pub fn set_unbind(&self, result: Result<(), AdapterError>) {
        self.state.lock().unbind = result;
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl ServiceAdapter for FakeServiceAdapter {
    async fn generate_dashboard_url(
        &self,
        instance_id: &str,
        plan: &Plan,
        _manifest: &str,
    ) -> Result<String, AdapterError> {
        let mut state = self.state.lock();
        state.calls.push(AdapterCall::DashboardUrl {
            instance_id: instance_id.to_string(),
            plan_id: plan.id.clone(),
        });
        state.dashboard_url.clone()
    }

    async fn create_binding(&self, request: BindingRequest) -> Result<Binding, AdapterError> {
        let mut state = self.state.lock();
        state.calls.push(AdapterCall::CreateBinding(request));
        state.binding.clone()
    }

    async fn delete_binding(&self, request: BindingRequest) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.calls.push(AdapterCall::DeleteBinding(request));
        state.unbind.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretsCall {
    Resolve(String),
    DeleteForDeployment(String),
}

#[derive(Debug, Default)]
struct SecretsState {
    secrets: BTreeMap<String, String>,
    resolve_failure: Option<SecretsError>,
    delete_failure: Option<SecretsError>,
    calls: Vec<SecretsCall>,
}

/// Credential store with a fixed secret map
#[derive(Debug, Default)]
pub struct FakeSecretManager {
    state: Mutex<SecretsState>,
}

impl FakeSecretManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, value: &str) {
        self.state
            .lock()
            .secrets
            .insert(path.to_string(), value.to_string());
    }

    pub fn fail_resolve(&self, err: SecretsError) {
        self.state.lock().resolve_failure = Some(err);
    }

    pub fn fail_delete(&self, err: SecretsError) {
        self.state.lock().delete_failure = Some(err);
    }

    pub fn calls(&self) -> Vec<SecretsCall> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl SecretManager for FakeSecretManager {
    async fn resolve_manifest_secrets(
        &self,
        manifest: &str,
    ) -> Result<BTreeMap<String, String>, SecretsError> {
        let mut state = self.state.lock();
        state.calls.push(SecretsCall::Resolve(manifest.to_string()));
        if let Some(err) = &state.resolve_failure {
            return Err(err.clone());
        }
        Ok(state.secrets.clone())
    }

    async fn delete_secrets_for_deployment(
        &self,
        deployment_name: &str,
    ) -> Result<(), SecretsError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(SecretsCall::DeleteForDeployment(deployment_name.to_string()));
        match &state.delete_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
