use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Cloud providers the pipeline knows how to drive. The set is closed: a
/// backend is selected once per run from one of these variants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ProviderKind {
    #[serde(rename = "aws")]
    Aws,
    #[serde(rename = "azure")]
    Azure,
    #[serde(rename = "gcp")]
    Gcp,
    #[serde(rename = "aliyun")]
    Aliyun,
    #[serde(rename = "oci")]
    Oci,
    #[serde(rename = "kubernetes")]
    Kubernetes,
    #[serde(rename = "do")]
    DigitalOcean,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::Aws,
        ProviderKind::Azure,
        ProviderKind::Gcp,
        ProviderKind::Aliyun,
        ProviderKind::Oci,
        ProviderKind::Kubernetes,
        ProviderKind::DigitalOcean,
    ];

    /// Short code used in report names and persisted state.
    pub fn code(&self) -> &'static str {
        match self {
            ProviderKind::Aws => "aws",
            ProviderKind::Azure => "azure",
            ProviderKind::Gcp => "gcp",
            ProviderKind::Aliyun => "aliyun",
            ProviderKind::Oci => "oci",
            ProviderKind::Kubernetes => "kubernetes",
            ProviderKind::DigitalOcean => "do",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Aws => "Amazon Web Services",
            ProviderKind::Azure => "Microsoft Azure",
            ProviderKind::Gcp => "Google Cloud Platform",
            ProviderKind::Aliyun => "Alibaba Cloud",
            ProviderKind::Oci => "Oracle Cloud Infrastructure",
            ProviderKind::Kubernetes => "Kubernetes",
            ProviderKind::DigitalOcean => "DigitalOcean",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ProviderKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(ProviderKind::Aws),
            "azure" => Ok(ProviderKind::Azure),
            "gcp" => Ok(ProviderKind::Gcp),
            "aliyun" => Ok(ProviderKind::Aliyun),
            "oci" => Ok(ProviderKind::Oci),
            "kubernetes" | "k8s" => Ok(ProviderKind::Kubernetes),
            "do" | "digitalocean" => Ok(ProviderKind::DigitalOcean),
            other => Err(ModelError::UnknownProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_from_str() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.code().parse::<ProviderKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = "vsphere".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err, ModelError::UnknownProvider("vsphere".into()));
    }

    #[test]
    fn serde_uses_short_codes() {
        let json = serde_json::to_string(&ProviderKind::DigitalOcean).unwrap();
        assert_eq!(json, "\"do\"");
    }
}
