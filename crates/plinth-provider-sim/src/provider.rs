//! Simulated provider implementation

use crate::catalog::{TypeSpec, lookup};
use crate::error::{Result, SimError};
use async_trait::async_trait;
use plinth_engine::{
    Created, Outputs, ProviderResult, ResolvedProperties, ResourceProvider, ResourceSchema,
};
use serde_json::{Value, json};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Comma separated resource names whose calls always fail
pub const FAIL_ENV: &str = "PLINTH_SIM_FAIL";

/// Comma separated `name:count` pairs; the first `count` calls are throttled
pub const THROTTLE_ENV: &str = "PLINTH_SIM_THROTTLE";

/// Artificial latency of every call, in milliseconds
pub const LATENCY_ENV: &str = "PLINTH_SIM_LATENCY_MS";

const DEFAULT_REGION: &str = "ap-southeast-1";
const ACCOUNT_ID: &str = "000000000000";

/// Provider answering like EC2 without calling anything
///
/// The simulator keeps no inventory of its own. Ids are generated on create
/// and updates or deletes of unknown ids succeed, so state written by one
/// process can be applied or destroyed by the next.
pub struct SimProvider {
    failing: HashSet<String>,
    throttled: Mutex<HashMap<String, u32>>,
    latency: Duration,
    counter: AtomicU64,
}

impl Default for SimProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimProvider {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            throttled: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
            counter: AtomicU64::new(0),
        }
    }

    /// Provider configured from `PLINTH_SIM_*` environment variables
    pub fn from_env() -> Self {
        let mut provider = Self::new();

        if let Ok(names) = std::env::var(FAIL_ENV) {
            for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                provider = provider.fail_on(name);
            }
        }

        if let Ok(pairs) = std::env::var(THROTTLE_ENV) {
            for pair in pairs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let (name, count) = pair.split_once(':').unwrap_or((pair, "1"));
                provider = provider.throttle(name, count.parse().unwrap_or(1));
            }
        }

        if let Some(ms) = std::env::var(LATENCY_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            provider = provider.with_latency(Duration::from_millis(ms));
        }

        provider
    }

    /// Make every call for a resource fail permanently
    pub fn fail_on(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    /// Throttle the first `times` calls for a resource
    pub fn throttle(mut self, name: impl Into<String>, times: u32) -> Self {
        self.throttled
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), times);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn spec(&self, resource_type: &str) -> Result<&'static TypeSpec> {
        lookup(resource_type).ok_or_else(|| SimError::UnsupportedType(resource_type.to_string()))
    }

    /// Latency plus injected failures, shared by every call
    async fn round_trip(&self, name: &str) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.contains(name) {
            return Err(SimError::Injected(name.to_string()));
        }
        let mut throttled = self
            .throttled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match throttled.get_mut(name) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(SimError::Throttled(name.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn generate_id(&self, spec: &TypeSpec, name: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut hasher = DefaultHasher::new();
        spec.resource_type.hash(&mut hasher);
        name.hash(&mut hasher);
        nanos.hash(&mut hasher);
        self.counter.fetch_add(1, Ordering::Relaxed).hash(&mut hasher);
        format!("{}-{:017x}", spec.prefix, hasher.finish())
    }

    /// Echo the properties back with the attributes EC2 would assign
    fn outputs(&self, spec: &TypeSpec, id: &str, properties: &ResolvedProperties) -> Outputs {
        let region = properties
            .get("availability_zone")
            .and_then(Value::as_str)
            .map(|zone| zone.trim_end_matches(|c: char| c.is_ascii_alphabetic()))
            .filter(|region| !region.is_empty())
            .unwrap_or(DEFAULT_REGION)
            .to_string();

        let mut outputs = properties.clone();
        outputs.insert("id".into(), json!(id));
        outputs.insert(
            "arn".into(),
            json!(format!("arn:aws:ec2:{region}:{ACCOUNT_ID}:{}/{id}", spec.arn_kind)),
        );

        if spec.resource_type == "aws:ec2:Instance" {
            let [a, b, c, d] = address_bytes(id);
            outputs.insert("private_ip".into(), json!(format!("10.0.{}.{}", a % 255, b.max(4))));
            let public = properties
                .get("associate_public_ip_address")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            if public {
                let ip = format!("203.0.{}.{}", c % 255, d.max(1));
                outputs.insert(
                    "public_dns".into(),
                    json!(format!(
                        "ec2-{}.{region}.compute.amazonaws.com",
                        ip.replace('.', "-")
                    )),
                );
                outputs.insert("public_ip".into(), json!(ip));
            }
        }
        outputs
    }
}

fn address_bytes(id: &str) -> [u8; 4] {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let bytes = hasher.finish().to_be_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

#[async_trait]
impl ResourceProvider for SimProvider {
    fn name(&self) -> &str {
        "sim"
    }

    fn schema(&self, resource_type: &str) -> Option<ResourceSchema> {
        lookup(resource_type).map(TypeSpec::schema)
    }

    async fn create(
        &self,
        resource_type: &str,
        name: &str,
        properties: &ResolvedProperties,
    ) -> ProviderResult<Created> {
        let spec = self.spec(resource_type)?;
        spec.validate(properties)?;
        self.round_trip(name).await?;

        let provider_id = self.generate_id(spec, name);
        info!(resource = name, id = %provider_id, "Created {}", resource_type);
        Ok(Created {
            outputs: self.outputs(spec, &provider_id, properties),
            provider_id,
        })
    }

    async fn update(
        &self,
        resource_type: &str,
        name: &str,
        provider_id: &str,
        properties: &ResolvedProperties,
    ) -> ProviderResult<Outputs> {
        let spec = self.spec(resource_type)?;
        spec.validate(properties)?;
        self.round_trip(name).await?;

        info!(resource = name, id = provider_id, "Updated {}", resource_type);
        Ok(self.outputs(spec, provider_id, properties))
    }

    async fn delete(&self, resource_type: &str, name: &str, provider_id: &str) -> ProviderResult<()> {
        self.spec(resource_type)?;
        self.round_trip(name).await?;

        debug!(resource = name, id = provider_id, "Deleted {}", resource_type);
        Ok(())
    }
}
