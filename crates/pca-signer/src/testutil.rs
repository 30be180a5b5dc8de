//! Shared test utilities.
//!
//! Provides an in-memory [`IssuingService`] and helpers that mint real CSRs
//! and certificates with `rcgen`. Feature-gated behind `testutil` so it stays
//! out of production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! pca-signer = { path = ".", features = ["testutil"] }
//! ```

use crate::ca::{CertificateHandle, IssueCertificateRequest, IssuedCertificate, IssuingService};
use crate::chain::encode_block;
use crate::{Error, Result};
use async_trait::async_trait;
use rcgen::{CertificateParams, DnType, KeyPair, SignatureAlgorithm};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Generates a key pair and a PEM-encoded CSR for `common_name`.
///
/// Returns `(csr_pem, private_key_pem)`.
pub fn generate_csr(alg: &'static SignatureAlgorithm, common_name: &str) -> (String, String) {
    let key_pair = KeyPair::generate_for(alg).expect("key generation");
    let mut params =
        CertificateParams::new(vec![common_name.to_string()]).expect("certificate params");
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);

    let csr = params.serialize_request(&key_pair).expect("CSR serialization");
    (csr.pem().expect("CSR PEM"), key_pair.serialize_pem())
}

/// Generates a self-signed certificate, PEM-encoded the way the chain
/// splitter re-encodes blocks.
pub fn pem_certificate(common_name: &str) -> String {
    let key_pair = KeyPair::generate().expect("key generation");
    let mut params = CertificateParams::new(Vec::<String>::new()).expect("certificate params");
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);

    let cert = params.self_signed(&key_pair).expect("self-signed certificate");
    encode_block(&pem::Pem::new("CERTIFICATE", cert.der().to_vec()))
}

/// Generates `count` distinct PEM certificates, in order.
pub fn generate_chain(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| pem_certificate(&format!("Test Certificate {i}")))
        .collect()
}

/// How [`MockIssuingService::wait_until_issued`] behaves.
#[derive(Debug, Clone)]
pub enum WaitBehavior {
    /// The certificate is issued immediately.
    Issued,
    /// The certificate is issued after a delay; past the timeout this
    /// behaves like [`WaitBehavior::NeverIssued`].
    IssueAfter(Duration),
    /// The certificate stays pending; the wait times out.
    NeverIssued,
    /// The authority reports a failed issuance.
    Fail(String),
}

/// In-memory issuing service that records what it was asked to do.
///
/// Handles are derived from the idempotency token, so resubmitting a request
/// yields the same handle, matching how the real authority deduplicates.
#[derive(Debug)]
pub struct MockIssuingService {
    issued: IssuedCertificate,
    submit_error: Option<String>,
    retrieval_error: Option<String>,
    wait: WaitBehavior,
    requests: Mutex<Vec<IssueCertificateRequest>>,
    wait_timeouts: Mutex<Vec<Duration>>,
    retrievals: AtomicUsize,
}

impl MockIssuingService {
    /// Issues `certs[0]` as the leaf and the remaining certificates, in
    /// order, as its chain.
    pub fn issuing(certs: Vec<String>) -> Self {
        let (leaf, chain) = certs.split_first().expect("at least one certificate");
        Self::with_issued(IssuedCertificate {
            certificate: leaf.trim_end().to_string(),
            certificate_chain: chain.concat(),
        })
    }

    pub fn with_issued(issued: IssuedCertificate) -> Self {
        Self {
            issued,
            submit_error: None,
            retrieval_error: None,
            wait: WaitBehavior::Issued,
            requests: Mutex::new(Vec::new()),
            wait_timeouts: Mutex::new(Vec::new()),
            retrievals: AtomicUsize::new(0),
        }
    }

    pub fn with_submit_error(mut self, message: impl Into<String>) -> Self {
        self.submit_error = Some(message.into());
        self
    }

    pub fn with_retrieval_error(mut self, message: impl Into<String>) -> Self {
        self.retrieval_error = Some(message.into());
        self
    }

    pub fn with_wait(mut self, wait: WaitBehavior) -> Self {
        self.wait = wait;
        self
    }

    /// Issuance requests received so far.
    pub fn requests(&self) -> Vec<IssueCertificateRequest> {
        self.requests.lock().expect("mock state").clone()
    }

    /// Timeouts passed to each wait call.
    pub fn wait_timeouts(&self) -> Vec<Duration> {
        self.wait_timeouts.lock().expect("mock state").clone()
    }

    /// Number of retrieval calls.
    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IssuingService for MockIssuingService {
    async fn issue_certificate(
        &self,
        request: &IssueCertificateRequest,
    ) -> Result<CertificateHandle> {
        self.requests
            .lock()
            .expect("mock state")
            .push(request.clone());

        if let Some(message) = &self.submit_error {
            return Err(Error::IssuanceSubmitFailed(message.clone()));
        }

        Ok(CertificateHandle::new(format!(
            "{}/certificate/{}",
            request.authority_arn,
            request.idempotency_token.replace('/', "-")
        )))
    }

    async fn wait_until_issued(
        &self,
        _certificate: &CertificateHandle,
        _authority_arn: &str,
        timeout: Duration,
    ) -> Result<()> {
        self.wait_timeouts
            .lock()
            .expect("mock state")
            .push(timeout);

        match &self.wait {
            WaitBehavior::Issued => Ok(()),
            WaitBehavior::IssueAfter(delay) if *delay < timeout => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            WaitBehavior::IssueAfter(_) | WaitBehavior::NeverIssued => {
                tokio::time::sleep(timeout).await;
                Err(Error::IssuanceTimeout(timeout))
            }
            WaitBehavior::Fail(message) => Err(Error::IssuanceFailed(message.clone())),
        }
    }

    async fn get_certificate(
        &self,
        _certificate: &CertificateHandle,
        _authority_arn: &str,
    ) -> Result<IssuedCertificate> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);

        match &self.retrieval_error {
            Some(message) => Err(Error::RetrievalFailed(message.clone())),
            None => Ok(self.issued.clone()),
        }
    }
}
