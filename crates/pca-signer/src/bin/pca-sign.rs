//! pca-sign - sign a CSR with AWS ACM Private CA
//!
//! Loads issuers from the configuration file, registers a signer for each,
//! and signs one CSR with the selected issuer.
//!
//! # Examples
//!
//! ```bash
//! # Sign a server certificate valid for 90 days
//! pca-sign --issuer default/pca-issuer --csr server.csr \
//!     --request default/web --usage "server auth" --duration-hours 2160 \
//!     --out-chain server.crt --out-root ca.crt
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use pca_signer::{
    AcmPcaService, Config, KeyUsage, NamespacedName, PcaSigner, SignContext, SignerRegistry,
    SigningRequest,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sign a certificate signing request through ACM Private CA
#[derive(Parser, Debug)]
#[command(name = "pca-sign")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PCA_SIGNER_CONFIG", default_value = "pca-signer.toml")]
    config: PathBuf,

    /// Issuer to sign with, as <namespace>/<name>
    #[arg(long, env = "PCA_SIGNER_ISSUER")]
    issuer: NamespacedName,

    /// PEM-encoded CSR to sign
    #[arg(long)]
    csr: PathBuf,

    /// Request identity as <namespace>/<name>; reused on retries for idempotency
    #[arg(long)]
    request: NamespacedName,

    /// Requested key usage (repeatable), e.g. "server auth"
    #[arg(long = "usage")]
    usages: Vec<KeyUsage>,

    /// Requested validity in hours (defaults to the issuer's validity)
    #[arg(long)]
    duration_hours: Option<u64>,

    /// Give up waiting for issuance after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Where to write the leaf and intermediate certificates
    #[arg(long, default_value = "tls.crt")]
    out_chain: PathBuf,

    /// Where to write the root certificate
    #[arg(long, default_value = "ca.crt")]
    out_root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("pca_signer=debug,pca_sign=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

/// Builds a signer for every configured issuer.
async fn build_registry(config: &Config) -> SignerRegistry {
    let registry = SignerRegistry::new();
    for issuer in &config.issuers {
        let service = Arc::new(AcmPcaService::from_config(&issuer.signer).await);
        registry.put(
            issuer.id(),
            Arc::new(PcaSigner::with_config(service, &issuer.signer)),
        );
    }
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    info!(
        config_path = %cli.config.display(),
        issuers = config.issuers.len(),
        "Loaded configuration"
    );

    let registry = build_registry(&config).await;
    let Some(signer) = registry.get(&cli.issuer) else {
        bail!("issuer {} is not configured", cli.issuer);
    };

    let csr = tokio::fs::read(&cli.csr)
        .await
        .with_context(|| format!("failed to read {}", cli.csr.display()))?;
    let mut request = SigningRequest::new(csr, cli.request.clone()).with_usages(cli.usages);
    if let Some(hours) = cli.duration_hours {
        request = request.with_duration(Duration::from_secs(hours * 3600));
    }

    let cancel = CancellationToken::new();
    let mut ctx = SignContext::with_cancellation(cancel.clone());
    if let Some(secs) = cli.deadline_secs {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling signing request");
            cancel.cancel();
        }
    });

    let signed = signer
        .sign(&request, &ctx)
        .await
        .with_context(|| format!("failed to sign {}", cli.request))?;
    let (chain, root) = signed.into_parts();

    tokio::fs::write(&cli.out_chain, &chain)
        .await
        .with_context(|| format!("failed to write {}", cli.out_chain.display()))?;
    tokio::fs::write(&cli.out_root, &root)
        .await
        .with_context(|| format!("failed to write {}", cli.out_root.display()))?;

    info!(
        request = %cli.request,
        chain = %cli.out_chain.display(),
        root = %cli.out_root.display(),
        "Wrote signed certificate"
    );
    Ok(())
}
