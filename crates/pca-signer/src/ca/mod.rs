//! Issuing service trait and implementations.
//!
//! The issuing service is the certificate authority that actually signs
//! certificates. The signing workflow only needs three operations from it:
//!
//! 1. Submit an issuance request and receive a handle to the pending certificate
//! 2. Wait (bounded by a timeout) until that certificate has been issued
//! 3. Fetch the issued certificate and its chain
//!
//! Implementations:
//!
//! - [`AcmPcaService`] - AWS ACM Private CA (requires the `aws` feature)
//! - `testutil::MockIssuingService` - in-memory double (requires `testutil`)
//!
//! Implementations map their native failures to the service-boundary error
//! variants ([`Error::IssuanceSubmitFailed`](crate::Error::IssuanceSubmitFailed),
//! [`Error::IssuanceTimeout`](crate::Error::IssuanceTimeout),
//! [`Error::IssuanceFailed`](crate::Error::IssuanceFailed),
//! [`Error::RetrievalFailed`](crate::Error::RetrievalFailed)); callers
//! propagate them unchanged.

#[cfg(feature = "aws")]
mod acm_pca;

#[cfg(feature = "aws")]
pub use acm_pca::AcmPcaService;

use crate::algorithm::SigningAlgorithm;
use crate::template::IssuanceTemplate;
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Everything the authority needs to issue one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCertificateRequest {
    /// Identifier (ARN) of the certificate authority that signs.
    pub authority_arn: String,
    pub signing_algorithm: SigningAlgorithm,
    pub template: IssuanceTemplate,
    /// The PEM-encoded CSR exactly as the caller supplied it.
    pub csr: Vec<u8>,
    /// Validity period in whole days.
    pub validity_days: i64,
    /// Deduplicates retried submissions of the same logical request.
    pub idempotency_token: String,
}

/// Opaque identifier of a submitted certificate (an ARN for ACM PCA).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertificateHandle(String);

impl CertificateHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CertificateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An issued certificate as returned by the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    /// PEM-encoded leaf certificate.
    pub certificate: String,
    /// PEM-encoded issuing chain, intermediates first and root last.
    pub certificate_chain: String,
}

/// A certificate authority that can issue certificates from CSRs.
#[async_trait]
pub trait IssuingService: Send + Sync {
    /// Submits an issuance request.
    ///
    /// Resubmitting a request with the same idempotency token must not create
    /// a second certificate.
    async fn issue_certificate(&self, request: &IssueCertificateRequest)
        -> Result<CertificateHandle>;

    /// Polls until the certificate has been issued.
    ///
    /// Returns [`Error::IssuanceTimeout`](crate::Error::IssuanceTimeout) if
    /// `timeout` elapses first and
    /// [`Error::IssuanceFailed`](crate::Error::IssuanceFailed) if the
    /// authority reports that issuance failed.
    async fn wait_until_issued(
        &self,
        certificate: &CertificateHandle,
        authority_arn: &str,
        timeout: Duration,
    ) -> Result<()>;

    /// Fetches an issued certificate and its chain.
    async fn get_certificate(
        &self,
        certificate: &CertificateHandle,
        authority_arn: &str,
    ) -> Result<IssuedCertificate>;
}
