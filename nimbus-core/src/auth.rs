//! Per-provider authentication options handed to the backend authenticator.
//!
//! Secret values are held in [`SecretString`], which is zeroized on drop and
//! never printed by `Debug`.

use std::{fmt, path::PathBuf};

use nimbus_model::ProviderKind;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AwsAuth {
    pub profile: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub session_token: Option<SecretString>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AzureAuthMethod {
    #[default]
    Cli,
    Msi,
    ServicePrincipal,
    FileAuth,
    UserAccount,
    UserAccountBrowser,
}

#[derive(Debug, Clone, Default)]
pub struct AzureAuth {
    pub method: AzureAuthMethod,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub file_auth: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct GcpAuth {
    /// Service account key file; application default credentials when `None`.
    pub service_account: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct AliyunAuth {
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<SecretString>,
}

#[derive(Debug, Clone, Default)]
pub struct OciAuth {
    pub profile: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KubernetesAuth {
    pub cluster_provider: Option<String>,
    pub config_file: Option<PathBuf>,
    pub context: Option<String>,
    pub persist_config: bool,
    pub azure_subscription_id: Option<String>,
}

impl Default for KubernetesAuth {
    fn default() -> Self {
        Self {
            cluster_provider: None,
            config_file: None,
            context: None,
            persist_config: true,
            azure_subscription_id: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DigitalOceanAuth {
    pub token: Option<SecretString>,
    /// Spaces access key pair.
    pub access_key: Option<String>,
    pub access_secret: Option<SecretString>,
}

/// Authentication options for exactly one provider.
#[derive(Debug, Clone)]
pub enum AuthOptions {
    Aws(AwsAuth),
    Azure(AzureAuth),
    Gcp(GcpAuth),
    Aliyun(AliyunAuth),
    Oci(OciAuth),
    Kubernetes(KubernetesAuth),
    DigitalOcean(DigitalOceanAuth),
}

impl AuthOptions {
    pub fn provider(&self) -> ProviderKind {
        match self {
            AuthOptions::Aws(_) => ProviderKind::Aws,
            AuthOptions::Azure(_) => ProviderKind::Azure,
            AuthOptions::Gcp(_) => ProviderKind::Gcp,
            AuthOptions::Aliyun(_) => ProviderKind::Aliyun,
            AuthOptions::Oci(_) => ProviderKind::Oci,
            AuthOptions::Kubernetes(_) => ProviderKind::Kubernetes,
            AuthOptions::DigitalOcean(_) => ProviderKind::DigitalOcean,
        }
    }

    /// Provider defaults: ambient credentials (profiles, CLI sessions,
    /// application default credentials).
    pub fn default_for(provider: ProviderKind) -> Self {
        match provider {
            ProviderKind::Aws => AuthOptions::Aws(AwsAuth::default()),
            ProviderKind::Azure => AuthOptions::Azure(AzureAuth::default()),
            ProviderKind::Gcp => AuthOptions::Gcp(GcpAuth::default()),
            ProviderKind::Aliyun => AuthOptions::Aliyun(AliyunAuth::default()),
            ProviderKind::Oci => AuthOptions::Oci(OciAuth::default()),
            ProviderKind::Kubernetes => {
                AuthOptions::Kubernetes(KubernetesAuth::default())
            }
            ProviderKind::DigitalOcean => {
                AuthOptions::DigitalOcean(DigitalOceanAuth::default())
            }
        }
    }
}

/// Which accounts, subscriptions or projects a run covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountScope {
    pub subscription_ids: Vec<String>,
    pub all_subscriptions: bool,
    pub project_id: Option<String>,
    pub folder_id: Option<String>,
    pub organization_id: Option<String>,
    pub all_projects: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_contains_secret_material() {
        let options = AuthOptions::Aws(AwsAuth {
            profile: None,
            access_key_id: Some("AKIAEXAMPLE".into()),
            secret_access_key: Some("wJalrXUtnFEMI/K7MDENG".into()),
            session_token: Some("FwoGZXIvYXdzEJr".into()),
        });

        let rendered = format!("{options:?}");
        assert!(!rendered.contains("wJalrXUtnFEMI"));
        assert!(!rendered.contains("FwoGZXIvYXdzEJr"));
        assert!(rendered.contains("SecretString(***)"));
    }

    #[test]
    fn options_report_their_provider() {
        for kind in ProviderKind::ALL {
            assert_eq!(AuthOptions::default_for(kind).provider(), kind);
        }
    }
}
