//! The certificate signing workflow.
//!
//! [`PcaSigner`] drives one signing request through these steps, stopping at
//! the first failure:
//!
//! 1. Parse the CSR and inspect its public key
//! 2. Select the signing algorithm and issuance template
//! 3. Build the issuance request (validity, idempotency token)
//! 4. Submit it to the issuing service
//! 5. Wait for issuance (bounded, cancellable by the caller)
//! 6. Retrieve the certificate and chain
//! 7. Split the chain into leaf+intermediates and root
//!
//! There is no retry at any step. Callers that want to retry resubmit the
//! whole request; the idempotency token keeps the authority from issuing a
//! second certificate.

use crate::algorithm::SigningAlgorithm;
use crate::ca::{IssueCertificateRequest, IssuingService};
use crate::chain::split_root_certificate;
use crate::config::SignerConfig;
use crate::csr::ParsedCsr;
use crate::registry::NamespacedName;
use crate::template::{IssuanceTemplate, KeyUsage};
use crate::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Validity used when a request doesn't specify a duration.
pub const DEFAULT_VALIDITY_DAYS: i64 = 30;

/// Upper bound on waiting for the authority to issue a certificate.
pub const DEFAULT_ISSUANCE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// A request to sign a CSR.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    csr: Vec<u8>,
    usages: Vec<KeyUsage>,
    duration: Option<Duration>,
    id: NamespacedName,
}

impl SigningRequest {
    /// Creates a request for a PEM-encoded CSR.
    ///
    /// `id` names the request; it must be the same every time the same
    /// logical request is retried.
    pub fn new(csr: impl Into<Vec<u8>>, id: NamespacedName) -> Self {
        Self {
            csr: csr.into(),
            usages: Vec::new(),
            duration: None,
            id,
        }
    }

    /// Sets the requested key usages, in order.
    pub fn with_usages(mut self, usages: impl IntoIterator<Item = KeyUsage>) -> Self {
        self.usages = usages.into_iter().collect();
        self
    }

    /// Sets the requested certificate lifetime.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn csr(&self) -> &[u8] {
        &self.csr
    }

    pub fn usages(&self) -> &[KeyUsage] {
        &self.usages
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn id(&self) -> &NamespacedName {
        &self.id
    }

    /// Returns `<namespace>/<name>`, the token that makes resubmissions of
    /// this request idempotent.
    pub fn idempotency_token(&self) -> String {
        self.id.to_string()
    }

    /// Whole days of requested validity, truncated; `default_days` when no
    /// duration was requested.
    pub fn validity_days(&self, default_days: i64) -> i64 {
        match self.duration {
            Some(duration) => (duration.as_secs() / SECONDS_PER_DAY) as i64,
            None => default_days,
        }
    }
}

/// Caller-controlled cancellation for a signing request.
///
/// Fires when the token is cancelled or the deadline passes, whichever comes
/// first. A default context never fires.
#[derive(Debug, Clone, Default)]
pub struct SignContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl SignContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing cancellation token, e.g. a child of a shutdown token.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline to `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Completes when the request should be abandoned.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }
}

/// The output of a successful signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedChain {
    certificate_chain: Vec<u8>,
    root_certificate: Vec<u8>,
}

impl SignedChain {
    pub fn new(certificate_chain: Vec<u8>, root_certificate: Vec<u8>) -> Self {
        Self {
            certificate_chain,
            root_certificate,
        }
    }

    /// The leaf certificate followed by any intermediates, PEM-encoded.
    pub fn certificate_chain(&self) -> &[u8] {
        &self.certificate_chain
    }

    /// The root certificate, PEM-encoded.
    pub fn root_certificate(&self) -> &[u8] {
        &self.root_certificate
    }

    /// Consumes self and returns `(certificate_chain, root_certificate)`.
    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.certificate_chain, self.root_certificate)
    }
}

/// Something that can turn a signing request into a certificate chain.
///
/// Stored in the [`SignerRegistry`](crate::SignerRegistry) as
/// `Arc<dyn Signer>` and shared by concurrent requests.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Signs the request.
    ///
    /// Either a complete chain is returned or an error; nothing is issued
    /// locally and no partial output is produced.
    async fn sign(&self, request: &SigningRequest, ctx: &SignContext) -> Result<SignedChain>;
}

/// Signs requests through an [`IssuingService`] for one certificate authority.
///
/// Holds no per-request state; a single instance serves any number of
/// concurrent requests.
pub struct PcaSigner<S: IssuingService + ?Sized> {
    service: Arc<S>,
    authority_arn: String,
    default_validity_days: i64,
    issuance_timeout: Duration,
}

impl<S: IssuingService + ?Sized> PcaSigner<S> {
    /// Creates a signer for the authority identified by `authority_arn`.
    pub fn new(service: Arc<S>, authority_arn: impl Into<String>) -> Self {
        Self {
            service,
            authority_arn: authority_arn.into(),
            default_validity_days: DEFAULT_VALIDITY_DAYS,
            issuance_timeout: DEFAULT_ISSUANCE_TIMEOUT,
        }
    }

    /// Creates a signer using the authority and defaults from `config`.
    pub fn with_config(service: Arc<S>, config: &SignerConfig) -> Self {
        Self {
            service,
            authority_arn: config.authority_arn.clone(),
            default_validity_days: config.default_validity_days,
            issuance_timeout: config.issuance_timeout(),
        }
    }

    pub fn authority_arn(&self) -> &str {
        &self.authority_arn
    }

    pub fn issuance_timeout(&self) -> Duration {
        self.issuance_timeout
    }

    /// Builds the issuance request without contacting the authority.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::MalformedCsr`], [`Error::UnsupportedKeyAlgorithm`]
    /// or [`Error::UnsupportedKeySize`].
    pub fn build_issue_request(
        &self,
        request: &SigningRequest,
    ) -> Result<IssueCertificateRequest> {
        let csr = ParsedCsr::parse(request.csr())?;
        let signing_algorithm = SigningAlgorithm::for_public_key(csr.public_key())?;
        let template = IssuanceTemplate::for_usages(request.usages());

        debug!(
            request = %request.id(),
            subject = %csr.subject(),
            algorithm = %signing_algorithm,
            template = %template,
            "Selected issuance parameters"
        );

        Ok(IssueCertificateRequest {
            authority_arn: self.authority_arn.clone(),
            signing_algorithm,
            template,
            csr: request.csr().to_vec(),
            validity_days: request.validity_days(self.default_validity_days),
            idempotency_token: request.idempotency_token(),
        })
    }
}

#[async_trait]
impl<S: IssuingService + ?Sized> Signer for PcaSigner<S> {
    async fn sign(&self, request: &SigningRequest, ctx: &SignContext) -> Result<SignedChain> {
        let issue = self.build_issue_request(request)?;

        if ctx.is_cancelled() {
            return Err(Error::CancellationRequested);
        }

        let handle = self.service.issue_certificate(&issue).await?;
        info!(
            request = %request.id(),
            certificate = %handle,
            validity_days = issue.validity_days,
            "Submitted certificate for issuance"
        );

        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                warn!(
                    request = %request.id(),
                    certificate = %handle,
                    "Signing cancelled while waiting for issuance"
                );
                return Err(Error::CancellationRequested);
            }
            issued = self.service.wait_until_issued(
                &handle,
                &self.authority_arn,
                self.issuance_timeout,
            ) => issued?,
        }

        let issued = self
            .service
            .get_certificate(&handle, &self.authority_arn)
            .await?;
        let (intermediates, root_certificate) =
            split_root_certificate(issued.certificate_chain.as_bytes())?;

        let mut certificate_chain =
            Vec::with_capacity(issued.certificate.len() + 1 + intermediates.len());
        certificate_chain.extend_from_slice(issued.certificate.as_bytes());
        certificate_chain.push(b'\n');
        certificate_chain.extend_from_slice(&intermediates);

        info!(
            request = %request.id(),
            certificate = %handle,
            "Certificate issued"
        );

        Ok(SignedChain::new(certificate_chain, root_certificate))
    }
}

impl<S: IssuingService + ?Sized> fmt::Debug for PcaSigner<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcaSigner")
            .field("authority_arn", &self.authority_arn)
            .field("default_validity_days", &self.default_validity_days)
            .field("issuance_timeout", &self.issuance_timeout)
            .finish()
    }
}
