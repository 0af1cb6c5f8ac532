#![allow(dead_code)]

use async_trait::async_trait;
use plinth_core::{OutputBinding, Project, Reference, ResourceDescriptor, Settings};
use plinth_engine::{
    CancelToken, Created, Engine, ExecuteOptions, Outputs, ProviderError, ProviderResult,
    ResolvedProperties, ResourceProvider, ResourceSchema, RetryConfig, StateManager, StateStore,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Provider call as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Update(String),
    Delete(String, String),
}

/// In-memory provider recording every call
pub struct MockProvider {
    schemas: HashMap<String, ResourceSchema>,
    failures: Mutex<HashMap<String, (u32, ProviderError)>>,
    delay: Duration,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    counter: AtomicU64,
}

impl MockProvider {
    pub fn new() -> Self {
        let mut schemas = HashMap::new();
        schemas.insert(
            "t:Vpc".to_string(),
            ResourceSchema::new().with_replace_on(["cidr_block"]),
        );
        schemas.insert(
            "t:Subnet".to_string(),
            ResourceSchema::new()
                .with_replace_on(["vpc_id", "cidr_block", "availability_zone"])
                .with_create_before_delete(true),
        );
        schemas.insert(
            "t:SecurityGroup".to_string(),
            ResourceSchema::new()
                .with_replace_on(["vpc_id"])
                .with_create_before_delete(true),
        );
        schemas.insert(
            "t:Instance".to_string(),
            ResourceSchema::new()
                .with_replace_on(["subnet_id", "availability_zone"])
                .with_create_before_delete(true),
        );
        schemas.insert(
            "t:Route".to_string(),
            ResourceSchema::new().with_replace_on(["table_id"]),
        );
        schemas.insert("t:Thing".to_string(), ResourceSchema::new());

        Self {
            schemas,
            failures: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            counter: AtomicU64::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `times` calls for a resource name
    pub fn fail(&self, name: &str, times: u32, error: ProviderError) {
        self.failures
            .lock()
            .unwrap()
            .insert(name.to_string(), (times, error));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    async fn invoke(&self, call: Call, name: &str) -> ProviderResult<()> {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut failures = self.failures.lock().unwrap();
        if let Some((remaining, error)) = failures.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(error.clone());
            }
        }
        Ok(())
    }

    fn outputs(provider_id: &str, properties: &ResolvedProperties) -> Outputs {
        let mut outputs = properties.clone();
        outputs.insert("id".into(), json!(provider_id));
        outputs.insert("public_ip".into(), json!(format!("203.0.113.{}", provider_id.len())));
        outputs
    }
}

#[async_trait]
impl ResourceProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn schema(&self, resource_type: &str) -> Option<ResourceSchema> {
        self.schemas.get(resource_type).cloned()
    }

    async fn create(
        &self,
        resource_type: &str,
        name: &str,
        properties: &ResolvedProperties,
    ) -> ProviderResult<Created> {
        self.invoke(Call::Create(name.to_string()), name).await?;
        let prefix = resource_type.rsplit(':').next().unwrap_or("res").to_lowercase();
        let provider_id = format!("{prefix}-{}", self.counter.fetch_add(1, Ordering::SeqCst));
        Ok(Created {
            outputs: Self::outputs(&provider_id, properties),
            provider_id,
        })
    }

    async fn update(
        &self,
        _resource_type: &str,
        name: &str,
        provider_id: &str,
        properties: &ResolvedProperties,
    ) -> ProviderResult<Outputs> {
        self.invoke(Call::Update(name.to_string()), name).await?;
        Ok(Self::outputs(provider_id, properties))
    }

    async fn delete(&self, _resource_type: &str, name: &str, provider_id: &str) -> ProviderResult<()> {
        self.invoke(Call::Delete(name.to_string(), provider_id.to_string()), name)
            .await
    }
}

pub fn options(jobs: usize) -> ExecuteOptions {
    ExecuteOptions {
        jobs,
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            backoff_multiplier: 2.0,
        },
        action_timeout: Duration::from_secs(5),
    }
}

pub fn engine(provider: &Arc<MockProvider>, jobs: usize) -> Engine {
    Engine::new(provider.clone(), options(jobs))
}

pub struct TestState {
    pub dir: TempDir,
}

impl TestState {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn manager(&self) -> StateManager {
        StateManager::new(self.dir.path().join(".plinth"))
    }

    pub async fn open(&self) -> StateStore {
        self.manager().open("test").await.unwrap()
    }
}

pub fn project(resources: Vec<ResourceDescriptor>, outputs: Vec<OutputBinding>) -> Project {
    Project {
        name: "test".into(),
        settings: Settings::default(),
        variables: Default::default(),
        resources,
        outputs,
    }
}

pub fn reference(text: &str) -> Reference {
    Reference::parse(text).unwrap()
}

/// VPC, subnet, security group and two instances
pub fn lab_project(zone: &str) -> Project {
    let instance = |name: &str| {
        ResourceDescriptor::new("t:Instance", name)
            .with_property("ami", json!("ami-0fa377108253bf620"))
            .with_property("instance_type", json!("t3.micro"))
            .with_property("subnet_id", reference("subnet.id"))
            .with_property("availability_zone", json!(zone))
            .with_property(
                "security_groups",
                plinth_core::PropertyValue::List(vec![plinth_core::PropertyValue::Reference(
                    reference("sg.id"),
                )]),
            )
    };

    project(
        vec![
            ResourceDescriptor::new("t:Vpc", "vpc").with_property("cidr_block", json!("10.0.0.0/16")),
            ResourceDescriptor::new("t:Subnet", "subnet")
                .with_property("vpc_id", reference("vpc.id"))
                .with_property("cidr_block", json!("10.0.0.0/24"))
                .with_property("availability_zone", json!(zone)),
            ResourceDescriptor::new("t:SecurityGroup", "sg")
                .with_property("vpc_id", reference("vpc.id"))
                .with_property("description", json!("lab")),
            instance("instance-1"),
            instance("instance-2"),
        ],
        vec![
            OutputBinding::new("vpcId", reference("vpc.id")),
            OutputBinding::new("publicSubnetId", reference("subnet.id")),
            OutputBinding::new("instance1Id", reference("instance-1.id")),
            OutputBinding::new("instance1PublicIp", reference("instance-1.public_ip")),
            OutputBinding::new("instance2Id", reference("instance-2.id")),
            OutputBinding::new("instance2PublicIp", reference("instance-2.public_ip")),
        ],
    )
}

/// Chain `a <- b <- c` plus an independent `d`
pub fn chain_project() -> Project {
    project(
        vec![
            ResourceDescriptor::new("t:Thing", "a").with_property("size", json!(1)),
            ResourceDescriptor::new("t:Thing", "b").with_property("parent", reference("a.id")),
            ResourceDescriptor::new("t:Thing", "c").with_property("parent", reference("b.id")),
            ResourceDescriptor::new("t:Thing", "d").with_property("size", json!(2)),
        ],
        Vec::new(),
    )
}

pub async fn apply(engine: &Engine, project: &Project, state: &TestState) -> plinth_engine::ApplyOutcome {
    let store = state.open().await;
    let outcome = engine
        .apply(project, &store, &CancelToken::new())
        .await
        .unwrap();
    store.close().await.unwrap();
    outcome
}

pub fn non_empty(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}
