use super::Gvk;

// Built-in kinds that are not namespaced. Anything else is assumed to be namespace-scoped.
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "APIService",
    "CSIDriver",
    "CSINode",
    "CertificateSigningRequest",
    "ClusterRole",
    "ClusterRoleBinding",
    "ComponentStatus",
    "CustomResourceDefinition",
    "FlowSchema",
    "IngressClass",
    "MutatingWebhookConfiguration",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PodSecurityPolicy",
    "PriorityClass",
    "PriorityLevelConfiguration",
    "RuntimeClass",
    "SelfSubjectAccessReview",
    "SelfSubjectRulesReview",
    "StorageClass",
    "SubjectAccessReview",
    "TokenReview",
    "ValidatingAdmissionPolicy",
    "ValidatingAdmissionPolicyBinding",
    "ValidatingWebhookConfiguration",
    "VolumeAttachment",
];

impl Gvk {
    pub fn is_cluster_scoped(&self) -> bool {
        CLUSTER_SCOPED_KINDS.binary_search(&self.kind.as_str()).is_ok()
    }
}

#[cfg(test)]
#[test]
fn cluster_scoped_kinds_sorted() {
    assert!(CLUSTER_SCOPED_KINDS.is_sorted());
    assert!(Gvk::from_api_version("v1", "Namespace").is_cluster_scoped());
    assert!(!Gvk::from_api_version("v1", "ConfigMap").is_cluster_scoped());
}
