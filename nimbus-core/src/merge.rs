//! Combining a fresh fetch with persisted state, or replacing it outright.

use nimbus_model::{ResourceTree, ServiceList};
use tracing::{debug, info};

use crate::{
    error::StateLoadError, provider::ProviderHandle, state_store::StateStore,
};

/// Copies every service listed in `prior_list` but absent from `list` into
/// `tree`, appending it to `list`. Services present in both keep the current
/// data. Returns the carried-over names in prior-list order.
pub fn carry_over_services(
    tree: &mut ResourceTree,
    list: &mut ServiceList,
    prior_list: &ServiceList,
    mut prior_tree: ResourceTree,
) -> Vec<String> {
    let mut carried = Vec::new();

    for service in prior_list {
        if list.contains(service) {
            continue;
        }
        let Some(subtree) = prior_tree.remove_service(service) else {
            debug!(
                target: "nimbus::merge",
                service = %service,
                "service listed in persisted state without data; skipping"
            );
            continue;
        };

        tree.insert_service(service.clone(), subtree);
        // Names in a deserialized list were validated on load.
        if let Ok(true) = list.push(service.clone()) {
            carried.push(service.clone());
        }
    }

    carried
}

/// Incremental-update mode: extend the freshly fetched tree with services
/// only the previous run covered.
pub async fn merge_with_prior(
    handle: &mut ProviderHandle,
    store: &dyn StateStore,
    key: &str,
) -> Result<Vec<String>, StateLoadError> {
    let prior = store.load(key).await?;
    if prior.metadata.provider != handle.provider() {
        return Err(StateLoadError::ProviderMismatch {
            expected: handle.provider(),
            found: prior.metadata.provider,
        });
    }

    let (tree, list) = handle.parts_mut();
    let carried = carry_over_services(tree, list, &prior.service_list, prior.services);

    info!(
        target: "nimbus::merge",
        key,
        carried_over = carried.len(),
        "merged persisted services"
    );
    Ok(carried)
}

/// Local-data mode: rehydrate the handle entirely from persisted state.
pub async fn load_local(
    handle: &mut ProviderHandle,
    store: &dyn StateStore,
    key: &str,
) -> Result<(), StateLoadError> {
    let blob = store.load(key).await?;
    handle.hydrate(blob)?;

    info!(
        target: "nimbus::merge",
        key,
        services = handle.service_list().len(),
        "loaded persisted run"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_model::ServiceTree;
    use serde_json::json;

    fn list(names: &[&str]) -> ServiceList {
        ServiceList::try_from(
            names.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn services_only_in_prior_run_are_carried_verbatim() {
        let mut tree = ResourceTree::new();
        tree.insert_service(
            "iam",
            ServiceTree::with_resources([("alice", json!({"mfa": true}))]),
        );
        let mut current = list(&["iam"]);

        let mut prior_tree = ResourceTree::new();
        prior_tree.insert_service(
            "iam",
            ServiceTree::with_resources([("alice", json!({"mfa": false}))]),
        );
        let s3 = ServiceTree::with_resources([("bucket-a", json!({"acl": "public"}))]);
        prior_tree.insert_service("s3", s3.clone());

        let carried = carry_over_services(
            &mut tree,
            &mut current,
            &list(&["iam", "s3"]),
            prior_tree,
        );

        assert_eq!(carried, vec!["s3".to_string()]);
        assert_eq!(current, list(&["iam", "s3"]));
        assert_eq!(tree.service("s3"), Some(&s3));
        assert_eq!(
            tree.service("iam").unwrap().resources["alice"].attributes,
            json!({"mfa": true})
        );
    }

    #[test]
    fn listed_services_without_data_are_skipped() {
        let mut tree = ResourceTree::new();
        let mut current = list(&["iam"]);

        let carried = carry_over_services(
            &mut tree,
            &mut current,
            &list(&["iam", "kms"]),
            ResourceTree::new(),
        );

        assert!(carried.is_empty());
        assert_eq!(current, list(&["iam"]));
        assert!(!tree.contains_service("kms"));
    }
}
