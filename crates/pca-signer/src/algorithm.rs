//! Signature algorithm selection.
//!
//! The authority signs with a hash strength matched to the requester's key:
//! larger RSA moduli and larger elliptic curves get stronger digests.
//!
//! | Key            | Algorithm          |
//! |----------------|--------------------|
//! | RSA >= 4096    | `SHA512WITHRSA`    |
//! | RSA >= 3072    | `SHA384WITHRSA`    |
//! | RSA >= 2048    | `SHA256WITHRSA`    |
//! | EC P-521       | `SHA512WITHECDSA`  |
//! | EC P-384       | `SHA384WITHECDSA`  |
//! | EC P-256       | `SHA256WITHECDSA`  |
//!
//! A size of zero means the key parser could not determine the strength; it
//! falls back to the SHA-256 variant of the key's family.

use crate::csr::PublicKeyInfo;
use crate::{Error, Result};
use std::fmt;
use tracing::warn;

/// Signing algorithms understood by the issuing service.
///
/// The string forms returned by [`SigningAlgorithm::as_str`] are the wire
/// values of the ACM PCA API and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    Sha256WithRsa,
    Sha384WithRsa,
    Sha512WithRsa,
    Sha256WithEcdsa,
    Sha384WithEcdsa,
    Sha512WithEcdsa,
}

impl SigningAlgorithm {
    /// Returns the issuing service's identifier for this algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256WithRsa => "SHA256WITHRSA",
            Self::Sha384WithRsa => "SHA384WITHRSA",
            Self::Sha512WithRsa => "SHA512WITHRSA",
            Self::Sha256WithEcdsa => "SHA256WITHECDSA",
            Self::Sha384WithEcdsa => "SHA384WITHECDSA",
            Self::Sha512WithEcdsa => "SHA512WITHECDSA",
        }
    }

    /// Selects the signing algorithm for a CSR's public key.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedKeySize`] for RSA keys between 1 and 2047 bits
    ///   and for curves other than P-256, P-384 and P-521.
    /// - [`Error::UnsupportedKeyAlgorithm`] for anything that is neither RSA
    ///   nor ECDSA.
    pub fn for_public_key(key: &PublicKeyInfo) -> Result<Self> {
        match *key {
            PublicKeyInfo::Rsa { modulus_bits } => match modulus_bits {
                b if b >= 4096 => Ok(Self::Sha512WithRsa),
                b if b >= 3072 => Ok(Self::Sha384WithRsa),
                b if b >= 2048 => Ok(Self::Sha256WithRsa),
                0 => {
                    // An empty modulus points at a key-parsing defect upstream
                    warn!("RSA key size is zero; defaulting to SHA256WITHRSA");
                    Ok(Self::Sha256WithRsa)
                }
                bits => Err(Error::UnsupportedKeySize {
                    algorithm: "rsa",
                    bits,
                }),
            },
            PublicKeyInfo::Ec { curve_bits } => match curve_bits {
                521 => Ok(Self::Sha512WithEcdsa),
                384 => Ok(Self::Sha384WithEcdsa),
                256 => Ok(Self::Sha256WithEcdsa),
                0 => {
                    warn!("ECDSA curve size is zero; defaulting to SHA256WITHECDSA");
                    Ok(Self::Sha256WithEcdsa)
                }
                bits => Err(Error::UnsupportedKeySize {
                    algorithm: "ecdsa",
                    bits,
                }),
            },
            PublicKeyInfo::Other { ref algorithm } => {
                Err(Error::UnsupportedKeyAlgorithm(algorithm.clone()))
            }
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa(modulus_bits: usize) -> PublicKeyInfo {
        PublicKeyInfo::Rsa { modulus_bits }
    }

    fn ec(curve_bits: usize) -> PublicKeyInfo {
        PublicKeyInfo::Ec { curve_bits }
    }

    #[test]
    fn test_rsa_thresholds() {
        let cases = [
            (4096, SigningAlgorithm::Sha512WithRsa),
            (3072, SigningAlgorithm::Sha384WithRsa),
            (2048, SigningAlgorithm::Sha256WithRsa),
            (0, SigningAlgorithm::Sha256WithRsa),
        ];
        for (bits, expected) in cases {
            assert_eq!(
                SigningAlgorithm::for_public_key(&rsa(bits)).unwrap(),
                expected,
                "rsa {bits}"
            );
        }
    }

    #[test]
    fn test_rsa_between_thresholds_rounds_down() {
        assert_eq!(
            SigningAlgorithm::for_public_key(&rsa(8192)).unwrap(),
            SigningAlgorithm::Sha512WithRsa
        );
        assert_eq!(
            SigningAlgorithm::for_public_key(&rsa(3500)).unwrap(),
            SigningAlgorithm::Sha384WithRsa
        );
        assert_eq!(
            SigningAlgorithm::for_public_key(&rsa(2049)).unwrap(),
            SigningAlgorithm::Sha256WithRsa
        );
    }

    #[test]
    fn test_rsa_weak_keys_rejected() {
        for bits in [1, 512, 1024, 2047] {
            match SigningAlgorithm::for_public_key(&rsa(bits)) {
                Err(Error::UnsupportedKeySize { algorithm, bits: b }) => {
                    assert_eq!(algorithm, "rsa");
                    assert_eq!(b, bits);
                }
                other => panic!("expected UnsupportedKeySize for {bits}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_ec_curves() {
        let cases = [
            (521, SigningAlgorithm::Sha512WithEcdsa),
            (384, SigningAlgorithm::Sha384WithEcdsa),
            (256, SigningAlgorithm::Sha256WithEcdsa),
            (0, SigningAlgorithm::Sha256WithEcdsa),
        ];
        for (bits, expected) in cases {
            assert_eq!(SigningAlgorithm::for_public_key(&ec(bits)).unwrap(), expected);
        }
    }

    #[test]
    fn test_ec_other_curves_rejected() {
        for bits in [192, 224, 512] {
            assert!(matches!(
                SigningAlgorithm::for_public_key(&ec(bits)),
                Err(Error::UnsupportedKeySize { algorithm: "ecdsa", .. })
            ));
        }
    }

    #[test]
    fn test_other_algorithms_rejected() {
        let key = PublicKeyInfo::Other {
            algorithm: "Ed25519".to_string(),
        };
        match SigningAlgorithm::for_public_key(&key) {
            Err(Error::UnsupportedKeyAlgorithm(name)) => assert_eq!(name, "Ed25519"),
            other => panic!("expected UnsupportedKeyAlgorithm, got {other:?}"),
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(SigningAlgorithm::Sha256WithRsa.to_string(), "SHA256WITHRSA");
        assert_eq!(SigningAlgorithm::Sha384WithRsa.as_str(), "SHA384WITHRSA");
        assert_eq!(SigningAlgorithm::Sha512WithRsa.as_str(), "SHA512WITHRSA");
        assert_eq!(SigningAlgorithm::Sha256WithEcdsa.as_str(), "SHA256WITHECDSA");
        assert_eq!(SigningAlgorithm::Sha384WithEcdsa.as_str(), "SHA384WITHECDSA");
        assert_eq!(SigningAlgorithm::Sha512WithEcdsa.as_str(), "SHA512WITHECDSA");
    }
}
