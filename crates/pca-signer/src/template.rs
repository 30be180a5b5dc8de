//! Issuance template selection.
//!
//! ACM Private CA shapes the issued certificate's extensions through a
//! template. A request for a single well-known usage gets the matching
//! end-entity template; a request for both TLS usages gets the combined
//! end-entity template; everything else is issued with the passthrough
//! template, which copies extensions from the CSR as-is.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A key usage requested for the issued certificate.
///
/// String forms follow cert-manager's `KeyUsage` vocabulary so requests can
/// be deserialized straight from those resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyUsage {
    #[serde(rename = "signing")]
    Signing,
    #[serde(rename = "digital signature")]
    DigitalSignature,
    #[serde(rename = "content commitment")]
    ContentCommitment,
    #[serde(rename = "key encipherment")]
    KeyEncipherment,
    #[serde(rename = "key agreement")]
    KeyAgreement,
    #[serde(rename = "data encipherment")]
    DataEncipherment,
    #[serde(rename = "cert sign")]
    CertSign,
    #[serde(rename = "crl sign")]
    CrlSign,
    #[serde(rename = "encipher only")]
    EncipherOnly,
    #[serde(rename = "decipher only")]
    DecipherOnly,
    #[serde(rename = "any")]
    Any,
    #[serde(rename = "server auth")]
    ServerAuth,
    #[serde(rename = "client auth")]
    ClientAuth,
    #[serde(rename = "code signing")]
    CodeSigning,
    #[serde(rename = "email protection")]
    EmailProtection,
    #[serde(rename = "s/mime")]
    SMime,
    #[serde(rename = "ipsec end system")]
    IpsecEndSystem,
    #[serde(rename = "ipsec tunnel")]
    IpsecTunnel,
    #[serde(rename = "ipsec user")]
    IpsecUser,
    #[serde(rename = "timestamping")]
    Timestamping,
    #[serde(rename = "ocsp signing")]
    OcspSigning,
    #[serde(rename = "microsoft sgc")]
    MicrosoftSgc,
    #[serde(rename = "netscape sgc")]
    NetscapeSgc,
}

impl KeyUsage {
    /// Every usage, in declaration order.
    pub const ALL: [KeyUsage; 23] = [
        Self::Signing,
        Self::DigitalSignature,
        Self::ContentCommitment,
        Self::KeyEncipherment,
        Self::KeyAgreement,
        Self::DataEncipherment,
        Self::CertSign,
        Self::CrlSign,
        Self::EncipherOnly,
        Self::DecipherOnly,
        Self::Any,
        Self::ServerAuth,
        Self::ClientAuth,
        Self::CodeSigning,
        Self::EmailProtection,
        Self::SMime,
        Self::IpsecEndSystem,
        Self::IpsecTunnel,
        Self::IpsecUser,
        Self::Timestamping,
        Self::OcspSigning,
        Self::MicrosoftSgc,
        Self::NetscapeSgc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signing => "signing",
            Self::DigitalSignature => "digital signature",
            Self::ContentCommitment => "content commitment",
            Self::KeyEncipherment => "key encipherment",
            Self::KeyAgreement => "key agreement",
            Self::DataEncipherment => "data encipherment",
            Self::CertSign => "cert sign",
            Self::CrlSign => "crl sign",
            Self::EncipherOnly => "encipher only",
            Self::DecipherOnly => "decipher only",
            Self::Any => "any",
            Self::ServerAuth => "server auth",
            Self::ClientAuth => "client auth",
            Self::CodeSigning => "code signing",
            Self::EmailProtection => "email protection",
            Self::SMime => "s/mime",
            Self::IpsecEndSystem => "ipsec end system",
            Self::IpsecTunnel => "ipsec tunnel",
            Self::IpsecUser => "ipsec user",
            Self::Timestamping => "timestamping",
            Self::OcspSigning => "ocsp signing",
            Self::MicrosoftSgc => "microsoft sgc",
            Self::NetscapeSgc => "netscape sgc",
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyUsage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|usage| usage.as_str() == wanted)
            .ok_or_else(|| format!("unknown key usage: {s}"))
    }
}

/// Certificate templates offered by ACM Private CA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssuanceTemplate {
    CodeSigning,
    ClientAuth,
    ServerAuth,
    OcspSigning,
    /// Client and server authentication.
    EndEntity,
    /// Issues whatever extensions the CSR asks for.
    BlankPassthrough,
}

impl IssuanceTemplate {
    /// Returns the template ARN sent to the issuing service.
    pub fn arn(&self) -> &'static str {
        match self {
            Self::CodeSigning => "arn:aws:acm-pca:::template/CodeSigningCertificate/V1",
            Self::ClientAuth => "arn:aws:acm-pca:::template/EndEntityClientAuthCertificate/V1",
            Self::ServerAuth => "arn:aws:acm-pca:::template/EndEntityServerAuthCertificate/V1",
            Self::OcspSigning => "arn:aws:acm-pca:::template/OCSPSigningCertificate/V1",
            Self::EndEntity => "arn:aws:acm-pca:::template/EndEntityCertificate/V1",
            Self::BlankPassthrough => {
                "arn:aws:acm-pca:::template/BlankEndEntityCertificate_CSRPassthrough/V1"
            }
        }
    }

    /// Selects the template for the requested usages.
    ///
    /// Never fails: unrecognized combinations fall back to
    /// [`IssuanceTemplate::BlankPassthrough`].
    pub fn for_usages(usages: &[KeyUsage]) -> Self {
        match usages {
            [KeyUsage::CodeSigning] => Self::CodeSigning,
            [KeyUsage::ClientAuth] => Self::ClientAuth,
            [KeyUsage::ServerAuth] => Self::ServerAuth,
            [KeyUsage::OcspSigning] => Self::OcspSigning,
            [KeyUsage::ClientAuth, KeyUsage::ServerAuth]
            | [KeyUsage::ServerAuth, KeyUsage::ClientAuth] => Self::EndEntity,
            _ => Self::BlankPassthrough,
        }
    }
}

impl fmt::Display for IssuanceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.arn())
    }
}
