//! Certificate Signing Request (CSR) decoding.
//!
//! Only the parts of the request that drive issuance decisions are extracted:
//! the public key algorithm and its strength. Everything else in the CSR is
//! forwarded to the authority untouched.

use crate::chain::next_pem_block;
use crate::{Error, Result};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::der_parser::asn1_rs::Tag;
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;
use x509_parser::x509::SubjectPublicKeyInfo;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_RSASSA_PSS: &str = "1.2.840.113549.1.1.10";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_DSA: &str = "1.2.840.10040.4.1";
const OID_ED25519: &str = "1.3.101.112";
const OID_ED448: &str = "1.3.101.113";

/// Named curves and their bit sizes.
const NAMED_CURVES: [(&str, usize); 5] = [
    ("1.2.840.10045.3.1.1", 192),
    ("1.3.132.0.33", 224),
    ("1.2.840.10045.3.1.7", 256),
    ("1.3.132.0.34", 384),
    ("1.3.132.0.35", 521),
];

/// The public key carried by a CSR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyInfo {
    /// RSA key with the bit length of its modulus.
    Rsa { modulus_bits: usize },
    /// Elliptic curve key with the bit size of its curve.
    Ec { curve_bits: usize },
    /// Any other key algorithm, by name or dotted OID.
    Other { algorithm: String },
}

/// The decoded fields of a CSR needed to build an issuance request.
#[derive(Debug, Clone)]
pub struct ParsedCsr {
    public_key: PublicKeyInfo,
    subject: String,
}

impl ParsedCsr {
    /// Decodes the first PEM block of `csr_pem` as a PKCS#10 request.
    ///
    /// The PEM label is not checked; the block's contents must be a
    /// complete DER-encoded CSR.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCsr`] if no PEM block is found, the DER does
    /// not parse, or the key uses an elliptic curve that cannot be identified.
    pub fn parse(csr_pem: &[u8]) -> Result<Self> {
        let (block, _) = next_pem_block(csr_pem)
            .ok_or_else(|| Error::MalformedCsr("failed to decode CSR".to_string()))?;

        let (rest, csr) = X509CertificationRequest::from_der(block.contents())
            .map_err(|e| Error::MalformedCsr(format!("failed to parse CSR: {e}")))?;
        if !rest.is_empty() {
            return Err(Error::MalformedCsr(format!(
                "{} trailing bytes after CSR",
                rest.len()
            )));
        }

        let info = &csr.certification_request_info;
        Ok(Self {
            public_key: PublicKeyInfo::from_spki(&info.subject_pki)?,
            subject: info.subject.to_string(),
        })
    }

    /// Returns the CSR's public key description.
    pub fn public_key(&self) -> &PublicKeyInfo {
        &self.public_key
    }

    /// Returns the requested subject as an RFC 4514 string.
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl PublicKeyInfo {
    fn from_spki(spki: &SubjectPublicKeyInfo<'_>) -> Result<Self> {
        let oid = spki.algorithm.algorithm.to_id_string();
        match oid.as_str() {
            OID_RSA_ENCRYPTION => match spki.parsed() {
                Ok(PublicKey::RSA(rsa)) => Ok(Self::Rsa {
                    modulus_bits: bit_length(rsa.modulus),
                }),
                _ => Err(Error::MalformedCsr("failed to read public key".to_string())),
            },
            OID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .filter(|params| params.tag() == Tag::Oid)
                    .and_then(|params| params.as_oid().ok())
                    .map(|oid| oid.to_id_string())
                    .ok_or_else(|| {
                        Error::MalformedCsr("EC public key without named curve".to_string())
                    })?;

                NAMED_CURVES
                    .iter()
                    .find(|(curve_oid, _)| *curve_oid == curve)
                    .map(|&(_, curve_bits)| Self::Ec { curve_bits })
                    .ok_or_else(|| {
                        Error::MalformedCsr(format!("unsupported elliptic curve: {curve}"))
                    })
            }
            OID_RSASSA_PSS => Ok(Self::other("RSASSA-PSS")),
            OID_DSA => Ok(Self::other("DSA")),
            OID_ED25519 => Ok(Self::other("Ed25519")),
            OID_ED448 => Ok(Self::other("Ed448")),
            _ => Ok(Self::Other { algorithm: oid }),
        }
    }

    fn other(name: &str) -> Self {
        Self::Other {
            algorithm: name.to_string(),
        }
    }
}

/// Bit length of a big-endian unsigned integer.
fn bit_length(bytes: &[u8]) -> usize {
    match bytes.iter().position(|&b| b != 0) {
        Some(first) => {
            let significant = &bytes[first..];
            significant.len() * 8 - significant[0].leading_zeros() as usize
        }
        None => 0,
    }
}
