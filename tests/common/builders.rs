//! Catalog builders and a broker wired to in-memory collaborators.

#![allow(dead_code)]

use osb_broker_core::config::BrokerConfig;
use osb_broker_core::models::{Errand, Plan, ResourceQuota, ServiceOffering};
use osb_broker_core::orchestration::{Broker, BrokerClients, RequestContext};
use osb_broker_core::test_helpers::{
    FakeDeploymentBackend, FakeInstanceCounter, FakeSecretManager, FakeServiceAdapter,
};
use std::sync::Arc;

pub const SERVICE_NAME: &str = "redis";

/// Builder pattern for creating test plans
pub struct PlanBuilder {
    plan: Plan,
}

impl PlanBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            plan: Plan::new(id, format!("{id} plan")),
        }
    }

    pub fn instance_limit(mut self, limit: u32) -> Self {
        self.plan.quotas.service_instance_limit = Some(limit);
        self
    }

    pub fn resource(mut self, kind: &str, limit: Option<u32>, cost: Option<u32>) -> Self {
        self.plan
            .quotas
            .resources
            .insert(kind.to_string(), ResourceQuota { limit, cost });
        self
    }

    pub fn post_deploy_errand(mut self, name: &str) -> Self {
        self.plan.lifecycle_errands.post_deploy = Some(Errand::new(name));
        self
    }

    pub fn pre_delete_errands(mut self, names: &[&str]) -> Self {
        self.plan.lifecycle_errands.pre_delete = names.iter().map(|n| Errand::new(*n)).collect();
        self
    }

    pub fn build(self) -> Plan {
        self.plan
    }
}

/// Builder pattern for creating test service offerings
pub struct CatalogBuilder {
    offering: ServiceOffering,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            offering: ServiceOffering {
                id: "redis-service-id".to_string(),
                name: SERVICE_NAME.to_string(),
                global_quotas: Default::default(),
                plans: Vec::new(),
            },
        }
    }

    pub fn plan(mut self, plan: Plan) -> Self {
        self.offering.plans.push(plan);
        self
    }

    pub fn global_instance_limit(mut self, limit: u32) -> Self {
        self.offering.global_quotas.service_instance_limit = Some(limit);
        self
    }

    pub fn global_resource_limit(mut self, kind: &str, limit: u32) -> Self {
        self.offering.global_quotas.resources.insert(
            kind.to_string(),
            ResourceQuota {
                limit: Some(limit),
                cost: None,
            },
        );
        self
    }

    pub fn build(self) -> ServiceOffering {
        self.offering
    }
}

/// Catalog covering the common cases: a plain plan, a plan with a post-deploy
/// errand, a plan with two pre-delete errands and an instance-limited plan.
pub fn default_catalog() -> ServiceOffering {
    CatalogBuilder::new()
        .plan(PlanBuilder::new("p1").build())
        .plan(PlanBuilder::new("with-errand").post_deploy_errand("smoke-tests").build())
        .plan(
            PlanBuilder::new("pre-delete")
                .pre_delete_errands(&["drain", "backup"])
                .build(),
        )
        .plan(PlanBuilder::new("limited").instance_limit(2).build())
        .build()
}

/// A broker plus handles on every fake it drives
pub struct TestBroker {
    pub broker: Broker,
    pub backend: Arc<FakeDeploymentBackend>,
    pub counter: Arc<FakeInstanceCounter>,
    pub adapter: Arc<FakeServiceAdapter>,
    pub secrets: Arc<FakeSecretManager>,
}

impl TestBroker {
    pub fn new(offering: ServiceOffering) -> Self {
        let backend = Arc::new(FakeDeploymentBackend::new());
        let counter = Arc::new(FakeInstanceCounter::new());
        let adapter = Arc::new(FakeServiceAdapter::new());
        let secrets = Arc::new(FakeSecretManager::new());

        let clients = BrokerClients {
            backend: backend.clone(),
            counter: counter.clone(),
            adapter: adapter.clone(),
            secrets: secrets.clone(),
        };

        Self {
            broker: Broker::new(BrokerConfig::new(offering), clients),
            backend,
            counter,
            adapter,
            secrets,
        }
    }

    pub fn with_default_catalog() -> Self {
        Self::new(default_catalog())
    }

    pub fn deployment_name(&self, instance_id: &str) -> String {
        self.broker.config().deployment_name(instance_id)
    }

    /// Seed an existing deployment for `instance_id`
    pub fn add_instance(&self, instance_id: &str) {
        let name = self.deployment_name(instance_id);
        self.backend
            .add_deployment(&name, &format!("name: {name}\n"));
    }
}

pub fn request_context() -> RequestContext {
    RequestContext::with_request_id("req-test")
}
