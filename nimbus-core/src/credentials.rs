use std::{any::Any, fmt, sync::Arc};

use anyhow::anyhow;
use nimbus_model::ProviderKind;

use crate::{auth::AuthOptions, backend::ProviderBackend, error::PipelineError};

/// Opaque credential bundle produced by a provider authenticator. Only the
/// backend that produced it knows its concrete type.
#[derive(Clone)]
pub struct Credentials {
    provider: ProviderKind,
    bundle: Arc<dyn Any + Send + Sync>,
}

impl Credentials {
    pub fn new<T>(provider: ProviderKind, bundle: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            provider,
            bundle: Arc::new(bundle),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.bundle.downcast_ref::<T>()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("provider", &self.provider)
            .field("bundle", &"<redacted>")
            .finish()
    }
}

/// Authenticate through the backend.
///
/// "No credentials", an authenticator error and a bundle minted for another
/// provider all collapse into [`PipelineError::Authentication`]; a fresh run
/// is the only recovery.
pub async fn resolve(
    backend: &dyn ProviderBackend,
    options: &AuthOptions,
) -> Result<Credentials, PipelineError> {
    let provider = backend.kind();
    if options.provider() != provider {
        return Err(PipelineError::Authentication(anyhow!(
            "{} options supplied to the {} authenticator",
            options.provider(),
            provider
        )));
    }

    tracing::debug!(target: "nimbus::auth", provider = %provider, "authenticating");

    match backend.authenticate(options).await {
        Ok(Some(credentials)) if credentials.provider() == provider => {
            Ok(credentials)
        }
        Ok(Some(credentials)) => Err(PipelineError::Authentication(anyhow!(
            "authenticator for {} returned {} credentials",
            provider,
            credentials.provider()
        ))),
        Ok(None) => Err(PipelineError::Authentication(anyhow!(
            "no credentials returned for {}",
            provider
        ))),
        Err(err) => Err(PipelineError::Authentication(err)),
    }
}
