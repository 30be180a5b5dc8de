//! Identity-keyed directory of signer instances.
//!
//! Controllers construct one signer per configured issuer and store it here so
//! individual signing requests don't rebuild SDK clients. The registry is an
//! explicit handle created at startup and cloned into every task that needs
//! it; entries are never evicted.
//!
//! # Example
//!
//! ```ignore
//! let registry = SignerRegistry::new();
//! let id = NamespacedName::new("default", "pca-issuer");
//! registry.put(id.clone(), Arc::new(signer));
//! assert!(registry.get(&id).is_some());
//! ```

use crate::signer::Signer;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// A `(namespace, name)` pair identifying an issuer or a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedName {
    namespace: String,
    name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Formats as `<namespace>/<name>`.
impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for NamespacedName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(format!("expected <namespace>/<name>, got: {s}")),
        }
    }
}

/// Concurrent map from issuer identity to signer.
///
/// Cloning the registry yields another handle to the same map. A `put` for
/// an existing identity replaces the previous signer.
#[derive(Clone, Default)]
pub struct SignerRegistry {
    signers: Arc<DashMap<NamespacedName, Arc<dyn Signer>>>,
}

impl SignerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the signer stored for `id`, if any.
    pub fn get(&self, id: &NamespacedName) -> Option<Arc<dyn Signer>> {
        self.signers.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Stores `signer` under `id`, replacing any previous entry.
    pub fn put(&self, id: NamespacedName, signer: Arc<dyn Signer>) {
        debug!(issuer = %id, "Registered signer");
        self.signers.insert(id, signer);
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }
}

impl fmt::Debug for SignerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerRegistry")
            .field("signers", &self.signers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{SignContext, SignedChain, SigningRequest};
    use crate::Result;
    use async_trait::async_trait;

    /// Signer that returns a fixed marker so tests can tell instances apart.
    struct MarkerSigner(&'static str);

    #[async_trait]
    impl Signer for MarkerSigner {
        async fn sign(&self, _request: &SigningRequest, _ctx: &SignContext) -> Result<SignedChain> {
            Ok(SignedChain::new(self.0.as_bytes().to_vec(), Vec::new()))
        }
    }

    async fn marker(signer: &Arc<dyn Signer>) -> Vec<u8> {
        let request = SigningRequest::new(Vec::new(), NamespacedName::new("ns", "req"));
        signer
            .sign(&request, &SignContext::new())
            .await
            .unwrap()
            .certificate_chain()
            .to_vec()
    }

    #[test]
    fn test_namespaced_name_display_and_parse() {
        let id = NamespacedName::new("ns1", "req1");
        assert_eq!(id.to_string(), "ns1/req1");
        assert_eq!("ns1/req1".parse::<NamespacedName>().unwrap(), id);

        assert!("no-slash".parse::<NamespacedName>().is_err());
        assert!("/name".parse::<NamespacedName>().is_err());
        assert!("ns/".parse::<NamespacedName>().is_err());
        assert!("a/b/c".parse::<NamespacedName>().is_err());
    }

    #[test]
    fn test_get_unregistered() {
        let registry = SignerRegistry::new();
        assert!(registry.get(&NamespacedName::new("ns", "missing")).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let registry = SignerRegistry::new();
        let id = NamespacedName::new("ns", "issuer");
        registry.put(id.clone(), Arc::new(MarkerSigner("first")));

        let signer = registry.get(&id).expect("signer registered");
        assert_eq!(marker(&signer).await, b"first");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let registry = SignerRegistry::new();
        let id = NamespacedName::new("ns", "issuer");
        registry.put(id.clone(), Arc::new(MarkerSigner("first")));
        registry.put(id.clone(), Arc::new(MarkerSigner("second")));

        assert_eq!(marker(&registry.get(&id).unwrap()).await, b"second");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let registry = SignerRegistry::new();
        let handle = registry.clone();
        let id = NamespacedName::new("ns", "issuer");
        handle.put(id.clone(), Arc::new(MarkerSigner("shared")));

        assert!(registry.get(&id).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_and_lookup() {
        let registry = SignerRegistry::new();

        let mut tasks = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let id = NamespacedName::new("ns", format!("issuer-{i}"));
                registry.put(id.clone(), Arc::new(MarkerSigner("concurrent")));
                registry.get(&id).is_some()
            }));
        }

        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert_eq!(registry.len(), 32);

        let lookups: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .get(&NamespacedName::new("ns", format!("issuer-{i}")))
                        .is_some()
                })
            })
            .collect();
        for lookup in lookups {
            assert!(lookup.await.unwrap());
        }
    }
}
