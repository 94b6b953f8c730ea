use serde::{Deserialize, Serialize};

use crate::{
    metadata::{LastRun, RunMetadata},
    resource::ResourceTree,
    services::ServiceList,
};

/// Current on-disk layout of [`StateBlob`].
pub const STATE_BLOB_VERSION: u16 = 1;

/// Persisted snapshot of a run. The field set is closed: anything else in
/// the serialized form is rejected on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateBlob {
    pub version: u16,
    pub metadata: RunMetadata,
    pub service_list: ServiceList,
    pub services: ResourceTree,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<LastRun>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{provider::ProviderKind, resource::ServiceTree};

    #[test]
    fn unknown_top_level_fields_are_rejected() {
        let blob = StateBlob {
            version: STATE_BLOB_VERSION,
            metadata: RunMetadata::new(ProviderKind::Aws, "123456789012", "prod"),
            service_list: ServiceList::default(),
            services: ResourceTree::new(),
            last_run: None,
        };
        let mut value = serde_json::to_value(&blob).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("credentials".into(), serde_json::json!({"secret": "x"}));

        assert!(serde_json::from_value::<StateBlob>(value).is_err());
    }

    #[test]
    fn unknown_nested_fields_are_rejected() {
        let mut services = ResourceTree::new();
        services.insert_service("s3", ServiceTree::default());
        let blob = StateBlob {
            version: STATE_BLOB_VERSION,
            metadata: RunMetadata::new(ProviderKind::Aws, "123456789012", "prod"),
            service_list: ServiceList::try_from(vec!["s3".to_string()]).unwrap(),
            services,
            last_run: None,
        };
        let clean = serde_json::to_value(&blob).unwrap();
        assert!(serde_json::from_value::<StateBlob>(clean.clone()).is_ok());

        let mut in_metadata = clean.clone();
        in_metadata["metadata"]
            .as_object_mut()
            .unwrap()
            .insert("credentials".into(), serde_json::json!({"secret": "x"}));
        assert!(serde_json::from_value::<StateBlob>(in_metadata).is_err());

        let mut in_service = clean;
        in_service["services"]["s3"]
            .as_object_mut()
            .unwrap()
            .insert("extra_junk".into(), serde_json::json!(1));
        assert!(serde_json::from_value::<StateBlob>(in_service).is_err());
    }

    #[test]
    fn snapshot_survives_serialization() {
        let blob = StateBlob {
            version: STATE_BLOB_VERSION,
            metadata: RunMetadata::new(ProviderKind::Gcp, "project-1", "default"),
            service_list: ServiceList::try_from(vec!["iam".to_string()]).unwrap(),
            services: ResourceTree::new(),
            last_run: None,
        };
        let raw = serde_json::to_string(&blob).unwrap();
        let back: StateBlob = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, blob);
    }
}
