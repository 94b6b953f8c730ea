#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use nimbus_core::{
    AccountScope, AuthOptions, Credentials, FetchContext, ProviderBackend,
    ProviderDescription, RuleEngine, RunOptions,
    model::{
        Annotation, ProviderKind, ResourceTree, RuleLevel, RuleType,
        RulesetRequest, ServiceTree,
    },
};
use serde_json::json;

pub const ACCOUNT_ID: &str = "123456789012";
pub const REPORT_NAME: &str = "aws-123456789012";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthBehavior {
    Succeed,
    NoCredentials,
    Fail,
}

/// In-memory provider: fixed inventories per service, optional failures
/// and delays, and a record of every fetch it served.
pub struct FakeBackend {
    pub kind: ProviderKind,
    pub auth: AuthBehavior,
    pub services: Vec<String>,
    pub inventories: HashMap<String, ServiceTree>,
    pub failing: HashSet<String>,
    pub fetch_delay: Duration,
    pub calls: Mutex<Vec<String>>,
    /// Limiter grants observed by the most recent fetch.
    pub granted_seen: AtomicU64,
}

impl FakeBackend {
    pub fn aws(services: &[&str]) -> Self {
        let inventories = services
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    ServiceTree::with_resources([(
                        format!("{name}-resource-1"),
                        json!({"public": true, "service": name}),
                    )]),
                )
            })
            .collect();

        Self {
            kind: ProviderKind::Aws,
            auth: AuthBehavior::Succeed,
            services: services.iter().map(|s| s.to_string()).collect(),
            inventories,
            failing: HashSet::new(),
            fetch_delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            granted_seen: AtomicU64::new(0),
        }
    }

    pub fn with_auth(mut self, auth: AuthBehavior) -> Self {
        self.auth = auth;
        self
    }

    pub fn failing(mut self, service: &str) -> Self {
        self.failing.insert(service.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl ProviderBackend for FakeBackend {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn authenticate(
        &self,
        _options: &AuthOptions,
    ) -> anyhow::Result<Option<Credentials>> {
        match self.auth {
            AuthBehavior::Succeed => {
                Ok(Some(Credentials::new(self.kind, "session-token")))
            }
            AuthBehavior::NoCredentials => Ok(None),
            AuthBehavior::Fail => anyhow::bail!("InvalidClientTokenId"),
        }
    }

    async fn describe(
        &self,
        _credentials: &Credentials,
        _scope: &AccountScope,
    ) -> anyhow::Result<ProviderDescription> {
        Ok(ProviderDescription {
            account_id: ACCOUNT_ID.to_string(),
            environment: "default".to_string(),
            services: self.services.clone(),
            report_name: REPORT_NAME.to_string(),
        })
    }

    async fn fetch_service(
        &self,
        credentials: &Credentials,
        context: FetchContext,
    ) -> anyhow::Result<ServiceTree> {
        assert_eq!(credentials.downcast_ref::<&'static str>(), Some(&"session-token"));
        self.calls.lock().unwrap().push(context.service.clone());
        self.granted_seen
            .store(context.throttle.granted(), Ordering::SeqCst);

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        if self.failing.contains(&context.service) {
            anyhow::bail!("AccessDenied for {}", context.service);
        }
        Ok(self
            .inventories
            .get(&context.service)
            .cloned()
            .unwrap_or_default())
    }
}

/// Flags every resource whose attributes carry `"public": true`, one rule
/// per service. Filters hide resources carrying `"hidden": true`.
#[derive(Default)]
pub struct PublicResourceRules {
    pub requests: Mutex<Vec<RulesetRequest>>,
    pub fail_on: Option<RuleType>,
}

impl PublicResourceRules {
    pub fn failing_on(rule_type: RuleType) -> Self {
        Self {
            fail_on: Some(rule_type),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<RulesetRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl RuleEngine for PublicResourceRules {
    fn evaluate(
        &self,
        request: &RulesetRequest,
        tree: &ResourceTree,
    ) -> anyhow::Result<Vec<Annotation>> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_on == Some(request.rule_type) {
            anyhow::bail!("cannot parse {}", request.path.display());
        }

        let attribute = match request.rule_type {
            RuleType::Findings => "public",
            RuleType::Filters => "hidden",
        };

        Ok(tree
            .services()
            .map(|(service, subtree)| Annotation {
                service: service.to_string(),
                rule_id: format!("{service}-{attribute}"),
                description: format!("{service} resource is {attribute}"),
                level: RuleLevel::Danger,
                checked_items: subtree.resource_count() as u64,
                flagged: subtree
                    .resources
                    .iter()
                    .filter(|(_, resource)| resource.attributes[attribute] == json!(true))
                    .map(|(id, _)| id.clone())
                    .collect(),
            })
            .collect())
    }
}

pub fn aws_options(report_dir: &Path) -> RunOptions {
    let mut options = RunOptions::new(AuthOptions::default_for(ProviderKind::Aws));
    options.report_dir = report_dir.to_path_buf();
    options
}

pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn backend(fake: FakeBackend) -> (Arc<FakeBackend>, Arc<dyn ProviderBackend>) {
    let fake = Arc::new(fake);
    let dynamic: Arc<dyn ProviderBackend> = fake.clone();
    (fake, dynamic)
}
