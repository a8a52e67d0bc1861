//! Unit tests for the node deployment mapper

#[cfg(test)]
mod tests {
    use crate::error::ProviderError;
    use crate::mapper::node_deployment::*;
    use metakube_client::{NodeDeployment, OperatingSystemSpec};
    use metakube_schema::*;
    use std::collections::BTreeMap;

    fn spec(cloud: NodeCloud) -> NodeDeploymentSpecConfig {
        NodeDeploymentSpecConfig {
            replicas: 3,
            dynamic_config: false,
            template: NodeTemplateConfig {
                labels: BTreeMap::from([("role".to_string(), "worker".to_string())]),
                cloud: Some(cloud),
                operating_system: Some(OperatingSystemConfig {
                    ubuntu: Some(DistUpgradeConfig { dist_upgrade_on_boot: true }),
                    ..Default::default()
                }),
                versions: Some(NodeVersionsConfig {
                    kubelet: Some("1.18.8".to_string()),
                }),
                taints: vec![TaintConfig {
                    key: "dedicated".to_string(),
                    value: "gpu".to_string(),
                    effect: "NoSchedule".to_string(),
                }],
            },
        }
    }

    fn openstack() -> NodeCloud {
        NodeCloud::Openstack(OpenstackNodeConfig {
            flavor: "m1.small".to_string(),
            image: "Ubuntu Focal".to_string(),
            disk_size: Some(50),
            use_floating_ip: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_round_trip_per_variant() {
        let clouds = [
            openstack(),
            NodeCloud::Aws(AwsNodeConfig {
                instance_type: "t3.small".to_string(),
                disk_size: 25,
                volume_type: "standard".to_string(),
                availability_zone: "eu-central-1a".to_string(),
                subnet_id: "subnet-1".to_string(),
                ..Default::default()
            }),
            NodeCloud::Azure(AzureNodeConfig {
                size: "Standard_F2".to_string(),
                zones: vec!["1".to_string()],
                ..Default::default()
            }),
        ];
        for cloud in clouds {
            let declared = spec(cloud);
            let expanded = expand_node_deployment_spec(&declared, "1.19.0").unwrap();
            assert_eq!(flatten_node_deployment_spec(&expanded), declared);
        }
    }

    #[test]
    fn test_kubelet_defaults_to_cluster_version() {
        let mut declared = spec(openstack());
        declared.template.versions = None;
        let expanded = expand_node_deployment_spec(&declared, "1.19.0").unwrap();
        assert_eq!(expanded.template.versions.kubelet, "1.19.0");
    }

    #[test]
    fn test_absent_operating_system_expands_to_default() {
        let mut declared = spec(openstack());
        declared.template.operating_system = None;
        let expanded = expand_node_deployment_spec(&declared, "1.19.0").unwrap();
        assert_eq!(expanded.template.operating_system, OperatingSystemSpec::default());
        assert_eq!(flatten_node_deployment_spec(&expanded).template.operating_system, None);
    }

    #[test]
    fn test_negative_replicas_are_a_mapping_error() {
        let mut declared = spec(openstack());
        declared.replicas = -1;
        match expand_node_deployment_spec(&declared, "1.19.0") {
            Err(ProviderError::SchemaMapping { path, .. }) => assert_eq!(path, "spec.replicas"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_unknown_taint_effect_is_rejected() {
        let mut declared = spec(openstack());
        declared.template.taints[0].effect = "Sometimes".to_string();
        assert!(matches!(
            expand_node_deployment_spec(&declared, "1.19.0"),
            Err(ProviderError::SchemaMapping { .. })
        ));
    }

    #[test]
    fn test_flatten_node_deployment_keeps_references() {
        let deployment = NodeDeployment {
            id: "nd1".to_string(),
            name: "workers".to_string(),
            spec: expand_node_deployment_spec(&spec(openstack()), "1.19.0").unwrap(),
            ..Default::default()
        };
        let cfg = flatten_node_deployment(&deployment, None, "p1:dbl1:cl1");
        assert_eq!(cfg.cluster_id, "p1:dbl1:cl1");
        assert_eq!(cfg.name.as_deref(), Some("workers"));
        assert_eq!(cfg.project_id, None);
        assert_eq!(cfg.creation_timestamp, None);
    }
}
