//! AWS ACM Private CA issuing service.
//!
//! Wraps the `aws-sdk-acmpca` client: `IssueCertificate` to submit, the SDK's
//! `CertificateIssued` waiter to wait, and `GetCertificate` to retrieve.
//! Credentials and region come from the standard AWS configuration chain,
//! optionally narrowed by [`SignerConfig`].
//!
//! # Feature Flag
//!
//! This module is only available when the `aws` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! pca-signer = { version = "0.1", features = ["aws"] }
//! ```

use crate::ca::{CertificateHandle, IssueCertificateRequest, IssuedCertificate, IssuingService};
use crate::config::SignerConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_acmpca::client::Waiters;
use aws_sdk_acmpca::error::DisplayErrorContext;
use aws_sdk_acmpca::primitives::Blob;
use aws_sdk_acmpca::types::{SigningAlgorithm, Validity, ValidityPeriodType};
use aws_sdk_acmpca::waiters::certificate_issued::WaitUntilCertificateIssuedError;
use aws_sdk_acmpca::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Issuing service backed by AWS ACM Private CA.
///
/// The SDK client is cheap to clone and safe to share, so one service can
/// back any number of signers.
#[derive(Debug, Clone)]
pub struct AcmPcaService {
    client: Client,
}

impl AcmPcaService {
    /// Creates a service from an existing SDK client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Loads AWS configuration and creates a client.
    ///
    /// `region` and `profile` from the config override the environment; when
    /// unset the default provider chain applies.
    pub async fn from_config(config: &SignerConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }

        let sdk_config = loader.load().await;
        info!(
            region = ?sdk_config.region().map(|r| r.as_ref().to_string()),
            "Loaded ACM PCA client configuration"
        );

        Self::new(Client::new(&sdk_config))
    }
}

#[async_trait]
impl IssuingService for AcmPcaService {
    async fn issue_certificate(
        &self,
        request: &IssueCertificateRequest,
    ) -> Result<CertificateHandle> {
        let validity = Validity::builder()
            .r#type(ValidityPeriodType::Days)
            .value(request.validity_days)
            .build()
            .map_err(|e| Error::IssuanceSubmitFailed(format!("invalid validity: {e}")))?;

        let output = self
            .client
            .issue_certificate()
            .certificate_authority_arn(&request.authority_arn)
            .csr(Blob::new(request.csr.clone()))
            .signing_algorithm(SigningAlgorithm::from(request.signing_algorithm.as_str()))
            .template_arn(request.template.arn())
            .validity(validity)
            .idempotency_token(&request.idempotency_token)
            .send()
            .await
            .map_err(|e| Error::IssuanceSubmitFailed(DisplayErrorContext(&e).to_string()))?;

        let arn = output.certificate_arn().ok_or_else(|| {
            Error::IssuanceSubmitFailed("response did not include a certificate ARN".to_string())
        })?;

        debug!(certificate_arn = %arn, "IssueCertificate accepted");
        Ok(CertificateHandle::new(arn))
    }

    async fn wait_until_issued(
        &self,
        certificate: &CertificateHandle,
        authority_arn: &str,
        timeout: Duration,
    ) -> Result<()> {
        self.client
            .wait_until_certificate_issued()
            .certificate_arn(certificate.as_str())
            .certificate_authority_arn(authority_arn)
            .wait(timeout)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                WaitUntilCertificateIssuedError::ExceededMaxWait(_) => {
                    Error::IssuanceTimeout(timeout)
                }
                other => Error::IssuanceFailed(DisplayErrorContext(&other).to_string()),
            })
    }

    async fn get_certificate(
        &self,
        certificate: &CertificateHandle,
        authority_arn: &str,
    ) -> Result<IssuedCertificate> {
        let output = self
            .client
            .get_certificate()
            .certificate_arn(certificate.as_str())
            .certificate_authority_arn(authority_arn)
            .send()
            .await
            .map_err(|e| Error::RetrievalFailed(DisplayErrorContext(&e).to_string()))?;

        let certificate_pem = output
            .certificate()
            .ok_or_else(|| Error::RetrievalFailed("response has no certificate".to_string()))?;
        let chain_pem = output
            .certificate_chain()
            .ok_or_else(|| Error::RetrievalFailed("response has no certificate chain".to_string()))?;

        Ok(IssuedCertificate {
            certificate: certificate_pem.to_string(),
            certificate_chain: chain_pem.to_string(),
        })
    }
}
