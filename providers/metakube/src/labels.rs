//! Project label handling
//!
//! The API copies project labels onto every cluster of the project. They are
//! removed on read so that only the labels declared on the cluster itself show
//! up in the refreshed tree.

use std::collections::BTreeMap;

/// Cluster labels whose key is not a project label
pub fn exclude_project_labels(
    project_labels: &BTreeMap<String, String>,
    cluster_labels: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    cluster_labels
        .into_iter()
        .filter(|(key, _)| !project_labels.contains_key(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_project_labels_are_removed() {
        let project = labels(&[("team", "x")]);
        let cluster = labels(&[("team", "x"), ("env", "prod")]);
        assert_eq!(exclude_project_labels(&project, cluster), labels(&[("env", "prod")]));
    }

    #[test]
    fn test_difference_is_by_key() {
        // An overridden value still belongs to the project
        let project = labels(&[("team", "x")]);
        let cluster = labels(&[("team", "y")]);
        assert!(exclude_project_labels(&project, cluster).is_empty());
    }

    #[test]
    fn test_empty_project() {
        let cluster = labels(&[("env", "prod")]);
        assert_eq!(exclude_project_labels(&BTreeMap::new(), cluster.clone()), cluster);
    }
}
