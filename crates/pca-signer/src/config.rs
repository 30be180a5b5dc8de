//! Signer configuration.
//!
//! Issuers are declared in a TOML file, one `[[issuer]]` table each:
//!
//! ```toml
//! [[issuer]]
//! namespace = "default"
//! name = "pca-issuer"
//! authority_arn = "arn:aws:acm-pca:us-east-1:111122223333:certificate-authority/abc"
//! region = "us-east-1"
//! default_validity_days = 30
//! issuance_timeout_secs = 300
//! ```

use crate::registry::NamespacedName;
use crate::signer::{DEFAULT_ISSUANCE_TIMEOUT, DEFAULT_VALIDITY_DAYS};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for one signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerConfig {
    /// ARN of the certificate authority that signs.
    pub authority_arn: String,

    /// AWS region override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// AWS shared-config profile override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Validity for requests that don't ask for a duration
    #[serde(default = "default_validity_days")]
    pub default_validity_days: i64,

    /// How long to wait for issuance
    #[serde(default = "default_issuance_timeout_secs")]
    pub issuance_timeout_secs: u64,
}

fn default_validity_days() -> i64 {
    DEFAULT_VALIDITY_DAYS
}
fn default_issuance_timeout_secs() -> u64 {
    DEFAULT_ISSUANCE_TIMEOUT.as_secs()
}

impl SignerConfig {
    /// Creates a config for `authority_arn` with default settings.
    pub fn new(authority_arn: impl Into<String>) -> Self {
        Self {
            authority_arn: authority_arn.into(),
            region: None,
            profile: None,
            default_validity_days: default_validity_days(),
            issuance_timeout_secs: default_issuance_timeout_secs(),
        }
    }

    pub fn issuance_timeout(&self) -> Duration {
        Duration::from_secs(self.issuance_timeout_secs)
    }

    /// Checks that the settings can be used to sign.
    pub fn validate(&self) -> Result<()> {
        if !self.authority_arn.starts_with("arn:") {
            return Err(Error::Config(format!(
                "authority_arn must be an ARN, got: {:?}",
                self.authority_arn
            )));
        }
        if self.default_validity_days <= 0 {
            return Err(Error::Config(format!(
                "default_validity_days must be positive, got {}",
                self.default_validity_days
            )));
        }
        if self.issuance_timeout_secs == 0 {
            return Err(Error::Config(
                "issuance_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A signer bound to the identity it is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerConfig {
    pub namespace: String,
    pub name: String,
    #[serde(flatten)]
    pub signer: SignerConfig,
}

impl IssuerConfig {
    pub fn id(&self) -> NamespacedName {
        NamespacedName::new(&self.namespace, &self.name)
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, rename = "issuer")]
    pub issuers: Vec<IssuerConfig>,
}

impl Config {
    /// Reads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates TOML configuration.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every issuer and rejects duplicate identities.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for issuer in &self.issuers {
            let id = issuer.id();
            if issuer.namespace.is_empty() || issuer.name.is_empty() {
                return Err(Error::Config(format!("issuer has an empty identity: {id}")));
            }
            match issuer.signer.validate() {
                Err(Error::Config(msg)) => {
                    return Err(Error::Config(format!("issuer {id}: {msg}")));
                }
                other => other?,
            }
            if !seen.insert(id.clone()) {
                return Err(Error::Config(format!("duplicate issuer: {id}")));
            }
        }
        Ok(())
    }

    /// Returns the issuer registered under `id`.
    pub fn issuer(&self, id: &NamespacedName) -> Option<&IssuerConfig> {
        self.issuers.iter().find(|issuer| &issuer.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ARN: &str = "arn:aws:acm-pca:us-east-1:111122223333:certificate-authority/abc";

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_toml_str(&format!(
            r#"
            [[issuer]]
            namespace = "default"
            name = "pca-issuer"
            authority_arn = "{ARN}"
            "#
        ))
        .unwrap();

        let issuer = &config.issuers[0];
        assert_eq!(issuer.id(), NamespacedName::new("default", "pca-issuer"));
        assert_eq!(issuer.signer, SignerConfig::new(ARN));
        assert_eq!(issuer.signer.default_validity_days, 30);
        assert_eq!(issuer.signer.issuance_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_toml_str(&format!(
            r#"
            [[issuer]]
            namespace = "prod"
            name = "internal"
            authority_arn = "{ARN}"
            region = "eu-west-1"
            profile = "pki"
            default_validity_days = 90
            issuance_timeout_secs = 60
            "#
        ))
        .unwrap();

        let signer = &config.issuers[0].signer;
        assert_eq!(signer.region.as_deref(), Some("eu-west-1"));
        assert_eq!(signer.profile.as_deref(), Some("pki"));
        assert_eq!(signer.default_validity_days, 90);
        assert_eq!(signer.issuance_timeout_secs, 60);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_toml_str("").unwrap();
        assert!(config.issuers.is_empty());
    }

    #[test]
    fn test_rejects_non_arn_authority() {
        let result = Config::from_toml_str(
            r#"
            [[issuer]]
            namespace = "default"
            name = "pca-issuer"
            authority_arn = "my-ca"
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_issuer_error_names_issuer_once() {
        let result = Config::from_toml_str(
            r#"
            [[issuer]]
            namespace = "ns"
            name = "n"
            authority_arn = "my-ca"
            "#,
        );
        let err = result.unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: issuer ns/n: authority_arn must be an ARN, got: \"my-ca\""
        );
    }

    #[test]
    fn test_rejects_zero_validity_and_timeout() {
        let mut config = SignerConfig::new(ARN);
        config.default_validity_days = 0;
        assert!(config.validate().is_err());

        let mut config = SignerConfig::new(ARN);
        config.issuance_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_issuers() {
        let issuer = format!(
            r#"
            [[issuer]]
            namespace = "default"
            name = "pca-issuer"
            authority_arn = "{ARN}"
            "#
        );
        let result = Config::from_toml_str(&format!("{issuer}{issuer}"));
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("duplicate issuer: default/pca-issuer")),
            other => panic!("expected duplicate issuer error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            Config::from_toml_str("[[issuer]\nname ="),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[issuer]]\nnamespace = \"ns\"\nname = \"issuer\"\nauthority_arn = \"{ARN}\""
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        let id = NamespacedName::new("ns", "issuer");
        assert_eq!(config.issuer(&id).unwrap().signer.authority_arn, ARN);
        assert!(config.issuer(&NamespacedName::new("ns", "other")).is_none());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/pca-signer.toml"),
            Err(Error::Io(_))
        ));
    }
}
