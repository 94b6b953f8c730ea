//! Concurrent, rate-limited gathering of service inventories.

use std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use nimbus_model::{ServiceList, ServiceTree};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    backend::{FetchContext, ProviderBackend, RegionFilter},
    credentials::Credentials,
    error::FetchError,
    limiter::CallThrottle,
};

pub const DEFAULT_MAX_WORKERS: usize = 10;

/// A service whose fetch failed without aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedService {
    pub service: String,
    pub reason: String,
}

impl From<&FetchError> for FailedService {
    fn from(err: &FetchError) -> Self {
        Self {
            service: err.service().unwrap_or_default().to_string(),
            reason: err.to_string(),
        }
    }
}

/// What the handle reports after a completed fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchReport {
    pub fetched: Vec<String>,
    pub failed: Vec<FailedService>,
}

/// Raw result of [`FetchCoordinator::gather`].
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Completed services, in completion order.
    pub services: Vec<(String, ServiceTree)>,
    pub failures: Vec<FetchError>,
    pub cancelled: bool,
}

/// Dispatches one fetch per service onto a bounded pool of tokio tasks.
/// Every dispatch takes exactly one permit from the shared limiter.
#[derive(Debug, Clone)]
pub struct FetchCoordinator {
    max_workers: usize,
    throttle: Arc<dyn CallThrottle>,
}

impl FetchCoordinator {
    pub fn new(max_workers: usize, throttle: Arc<dyn CallThrottle>) -> Self {
        Self {
            max_workers: max_workers.max(1),
            throttle,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn throttle(&self) -> &Arc<dyn CallThrottle> {
        &self.throttle
    }

    pub async fn gather(
        &self,
        backend: Arc<dyn ProviderBackend>,
        credentials: Credentials,
        services: &ServiceList,
        regions: &RegionFilter,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        regions.validate()?;

        let mut pending = services.iter().map(str::to_string);
        let mut in_flight: JoinSet<(String, Result<ServiceTree, FetchError>)> =
            JoinSet::new();
        let mut task_services: HashMap<tokio::task::Id, String> = HashMap::new();
        let mut outcome = FetchOutcome::default();

        loop {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            while in_flight.len() < self.max_workers {
                let Some(service) = pending.next() else {
                    break;
                };
                let context = FetchContext {
                    service: service.clone(),
                    regions: regions.clone(),
                    throttle: Arc::clone(&self.throttle),
                    cancel: cancel.child_token(),
                };
                let task = fetch_one(
                    Arc::clone(&backend),
                    credentials.clone(),
                    context,
                );
                let handle = in_flight.spawn(task);
                task_services.insert(handle.id(), service);
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    outcome.cancelled = true;
                    break;
                }
                joined = in_flight.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    record(&mut outcome, &mut task_services, joined);
                }
            }
        }

        if outcome.cancelled {
            in_flight.abort_all();
            while let Some(joined) = in_flight.join_next_with_id().await {
                // Tasks that finished before the abort landed still count.
                if let Ok((_, (service, Ok(tree)))) = joined {
                    outcome.services.push((service, tree));
                }
            }
            info!(
                target: "nimbus::fetch",
                completed = outcome.services.len(),
                "fetch cancelled; in-flight services aborted"
            );
        }

        Ok(outcome)
    }
}

async fn fetch_one(
    backend: Arc<dyn ProviderBackend>,
    credentials: Credentials,
    context: FetchContext,
) -> (String, Result<ServiceTree, FetchError>) {
    let service = context.service.clone();
    let throttle = Arc::clone(&context.throttle);

    let permit = throttle.acquire().await;
    debug!(
        target: "nimbus::fetch",
        service = %service,
        permit = permit.sequence,
        "dispatching service fetch"
    );

    let result = match AssertUnwindSafe(backend.fetch_service(&credentials, context))
        .catch_unwind()
        .await
    {
        Ok(Ok(tree)) => Ok(tree),
        Ok(Err(source)) => Err(FetchError::Service {
            service: service.clone(),
            source,
        }),
        Err(_) => Err(FetchError::Panicked {
            service: service.clone(),
        }),
    };

    (service, result)
}

fn record(
    outcome: &mut FetchOutcome,
    task_services: &mut HashMap<tokio::task::Id, String>,
    joined: Result<
        (tokio::task::Id, (String, Result<ServiceTree, FetchError>)),
        tokio::task::JoinError,
    >,
) {
    match joined {
        Ok((id, (service, Ok(tree)))) => {
            task_services.remove(&id);
            info!(
                target: "nimbus::fetch",
                service = %service,
                resources = tree.resource_count(),
                "service fetched"
            );
            outcome.services.push((service, tree));
        }
        Ok((id, (service, Err(err)))) => {
            task_services.remove(&id);
            warn!(
                target: "nimbus::fetch",
                service = %service,
                error = %err,
                "service fetch failed"
            );
            outcome.failures.push(err);
        }
        Err(join_err) => {
            let service = task_services
                .remove(&join_err.id())
                .unwrap_or_else(|| "<unknown>".to_string());
            warn!(
                target: "nimbus::fetch",
                service = %service,
                error = %join_err,
                "service fetch task did not complete"
            );
            outcome.failures.push(FetchError::Panicked { service });
        }
    }
}
