//! Certificate signing through a private certificate authority.
//!
//! This crate turns a PEM-encoded Certificate Signing Request (CSR) and a set
//! of requested key usages into an issued certificate chain. It picks the
//! issuance template and signature algorithm, submits the request to an
//! external issuing service (AWS ACM Private CA in production), waits for the
//! certificate to be issued, and splits the returned chain into the
//! leaf-plus-intermediates bundle and the root certificate.
//!
//! # Components
//!
//! - [`algorithm`] - Signature algorithm selection from the CSR's public key
//! - [`template`] - Issuance template selection from requested key usages
//! - [`csr`] - CSR decoding and public key inspection
//! - [`chain`] - Splitting a PEM chain into intermediates and root
//! - [`ca`] - Issuing service trait (and the ACM PCA client with `aws`)
//! - [`signer`] - The signing workflow and the [`Signer`] trait
//! - [`registry`] - Identity-keyed directory of signer instances
//! - [`config`] - TOML signer configuration
//!
//! # Example
//!
//! ```ignore
//! use pca_signer::{NamespacedName, PcaSigner, SignContext, SignerRegistry, SigningRequest};
//! use std::sync::Arc;
//!
//! let registry = SignerRegistry::new();
//! let id = NamespacedName::new("default", "my-issuer");
//! registry.put(id.clone(), Arc::new(PcaSigner::new(service, authority_arn)));
//!
//! let signer = registry.get(&id).unwrap();
//! let request = SigningRequest::new(csr_pem, NamespacedName::new("default", "my-cert"));
//! let signed = signer.sign(&request, &SignContext::new()).await?;
//! ```

pub mod algorithm;
pub mod ca;
pub mod chain;
pub mod config;
pub mod csr;
pub mod registry;
pub mod signer;
pub mod template;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use algorithm::SigningAlgorithm;
#[cfg(feature = "aws")]
pub use ca::AcmPcaService;
pub use ca::{CertificateHandle, IssueCertificateRequest, IssuedCertificate, IssuingService};
pub use chain::split_root_certificate;
pub use config::{Config, IssuerConfig, SignerConfig};
pub use csr::{ParsedCsr, PublicKeyInfo};
pub use registry::{NamespacedName, SignerRegistry};
pub use signer::{PcaSigner, SignContext, SignedChain, Signer, SigningRequest};
pub use template::{IssuanceTemplate, KeyUsage};

use std::time::Duration;

/// Errors that can occur while signing a certificate request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request did not contain a decodable PEM-encoded CSR.
    #[error("malformed CSR: {0}")]
    MalformedCsr(String),

    /// The CSR's public key algorithm cannot be signed by the authority.
    #[error("unsupported public key algorithm: {0}")]
    UnsupportedKeyAlgorithm(String),

    /// The CSR's key is too weak or uses an unsupported curve.
    #[error("unsupported {algorithm} keysize specified: {bits}")]
    UnsupportedKeySize { algorithm: &'static str, bits: usize },

    /// The chain returned by the authority is not a sequence of PEM certificates.
    #[error("invalid certificate chain: {0}")]
    InvalidChain(String),

    /// The issuing service rejected or failed the issuance call.
    #[error("certificate issuance failed to submit: {0}")]
    IssuanceSubmitFailed(String),

    /// The certificate was not issued within the wait timeout.
    #[error("certificate was not issued within {0:?}")]
    IssuanceTimeout(Duration),

    /// The issuing service reported that issuance failed.
    #[error("certificate issuance failed: {0}")]
    IssuanceFailed(String),

    /// The issued certificate could not be fetched.
    #[error("failed to retrieve issued certificate: {0}")]
    RetrievalFailed(String),

    /// The caller cancelled the request or its deadline passed.
    #[error("signing request was cancelled")]
    CancellationRequested,

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pca-signer operations.
pub type Result<T> = std::result::Result<T, Error>;
