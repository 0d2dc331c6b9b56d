//! In-memory provider and HTTP client that record every call
//!
//! Clones share state, so a test can hand one clone to a resolver and inspect
//! the other afterwards.

use crate::http::{HttpClient, HttpResponse};
use crate::provider::{
    AwsError, AwsProvider, AwsResult, SecretMetadata, SecretValue, StackDescription,
    StackResource, StackSummary,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct MockStack {
    region: String,
    description: StackDescription,
    resources: Vec<StackResource>,
}

#[derive(Debug, Clone)]
struct MockSecret {
    region: String,
    arn: String,
    name: String,
    value: SecretValue,
}

#[derive(Debug, Default)]
struct MockState {
    stacks: Vec<MockStack>,
    secrets: Vec<MockSecret>,
    account: Option<String>,
    failures: BTreeMap<String, AwsError>,
    calls: Vec<String>,
    writes: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct MockAwsProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockAwsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_account(self, account: &str) -> Self {
        self.state().account = Some(account.to_string());
        self
    }

    pub fn with_stack(
        self,
        region: &str,
        description: StackDescription,
        resources: Vec<StackResource>,
    ) -> Self {
        self.state().stacks.push(MockStack {
            region: region.to_string(),
            description,
            resources,
        });
        self
    }

    /// Seed a secret; its ARN is derived from `region` and `name`.
    pub fn with_secret(self, region: &str, name: &str, value: SecretValue) -> Self {
        let arn = secret_arn(region, name);
        self.state().secrets.push(MockSecret {
            region: region.to_string(),
            arn,
            name: name.to_string(),
            value,
        });
        self
    }

    /// Make every call of `operation` (e.g. `"update_secret"`) fail.
    pub fn fail(self, operation: &str, error: AwsError) -> Self {
        self.state().failures.insert(operation.to_string(), error);
        self
    }

    /// `operation:argument` for every call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        let prefix = format!("{}:", operation);
        self.state()
            .calls
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    /// `(secret id, value)` for every create and update.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.state().writes.clone()
    }

    pub fn secret_string(&self, name: &str) -> Option<String> {
        self.state()
            .secrets
            .iter()
            .find(|s| s.name == name || s.arn == name)
            .and_then(|s| match &s.value {
                SecretValue::String(v) => Some(v.clone()),
                SecretValue::Binary(_) => None,
            })
    }

    fn record(&self, operation: &str, argument: &str) -> AwsResult<()> {
        let mut state = self.state();
        state.calls.push(format!("{}:{}", operation, argument));
        match state.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn find_secret(&self, region: &str, secret_id: &str) -> AwsResult<MockSecret> {
        self.state()
            .secrets
            .iter()
            .find(|s| s.region == region && (s.arn == secret_id || s.name == secret_id))
            .cloned()
            .ok_or_else(|| AwsError::not_found(format!("secret {}", secret_id)))
    }

    fn find_stack(&self, region: &str, stack: &str) -> AwsResult<MockStack> {
        self.state()
            .stacks
            .iter()
            .find(|s| {
                s.region == region
                    && (s.description.stack_name == stack
                        || s.description.stack_id.as_deref() == Some(stack))
            })
            .cloned()
            .ok_or_else(|| AwsError::not_found(format!("stack {}", stack)))
    }
}

fn secret_arn(region: &str, name: &str) -> String {
    format!(
        "arn:aws:secretsmanager:{}:123456789012:secret:{}-AbCdEf",
        region, name
    )
}

#[async_trait]
impl AwsProvider for MockAwsProvider {
    async fn list_stacks(&self, region: &str) -> AwsResult<Vec<StackSummary>> {
        self.record("list_stacks", region)?;
        Ok(self
            .state()
            .stacks
            .iter()
            .filter(|s| s.region == region)
            .map(|s| StackSummary {
                stack_name: s.description.stack_name.clone(),
                stack_id: s.description.stack_id.clone(),
            })
            .collect())
    }

    async fn list_stack_resources(
        &self,
        region: &str,
        stack: &str,
    ) -> AwsResult<Vec<StackResource>> {
        self.record("list_stack_resources", stack)?;
        Ok(self.find_stack(region, stack)?.resources)
    }

    async fn describe_stack(&self, region: &str, stack: &str) -> AwsResult<StackDescription> {
        self.record("describe_stack", stack)?;
        Ok(self.find_stack(region, stack)?.description)
    }

    async fn caller_account(&self) -> AwsResult<String> {
        self.record("caller_account", "")?;
        self.state().account.clone().ok_or_else(|| AwsError::Service {
            operation: "GetCallerIdentity".to_string(),
            message: "no credentials".to_string(),
        })
    }

    async fn describe_secret(&self, region: &str, secret_id: &str) -> AwsResult<SecretMetadata> {
        self.record("describe_secret", secret_id)?;
        let secret = self.find_secret(region, secret_id)?;
        Ok(SecretMetadata {
            arn: secret.arn,
            name: secret.name,
        })
    }

    async fn get_secret_value(&self, region: &str, secret_id: &str) -> AwsResult<SecretValue> {
        self.record("get_secret_value", secret_id)?;
        Ok(self.find_secret(region, secret_id)?.value)
    }

    async fn create_secret(
        &self,
        region: &str,
        name: &str,
        value: &str,
        _description: &str,
    ) -> AwsResult<SecretMetadata> {
        self.record("create_secret", name)?;
        let arn = secret_arn(region, name);
        let mut state = self.state();
        state.writes.push((name.to_string(), value.to_string()));
        state.secrets.push(MockSecret {
            region: region.to_string(),
            arn: arn.clone(),
            name: name.to_string(),
            value: SecretValue::String(value.to_string()),
        });
        Ok(SecretMetadata {
            arn,
            name: name.to_string(),
        })
    }

    async fn update_secret(&self, region: &str, secret_id: &str, value: &str) -> AwsResult<()> {
        self.record("update_secret", secret_id)?;
        let mut state = self.state();
        let secret = state
            .secrets
            .iter_mut()
            .find(|s| s.region == region && (s.arn == secret_id || s.name == secret_id))
            .ok_or_else(|| AwsError::not_found(format!("secret {}", secret_id)))?;
        secret.value = SecretValue::String(value.to_string());
        state
            .writes
            .push((secret_id.to_string(), value.to_string()));
        Ok(())
    }
}

/// HTTP client serving canned responses by exact URL; unknown URLs get 404.
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<BTreeMap<String, HttpResponse>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(self, url: &str, body: serde_json::Value) -> Self {
        self.with_response(url, 200, body.to_string().as_bytes())
    }

    pub fn with_response(self, url: &str, status: u16, body: &[u8]) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                url.to_string(),
                HttpResponse {
                    status,
                    body: body.to_vec(),
                },
            );
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str) -> anyhow::Result<HttpResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.to_string());
        Ok(self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned()
            .unwrap_or(HttpResponse {
                status: 404,
                body: Vec::new(),
            }))
    }
}
