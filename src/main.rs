//! kmscert - issue a self-signed certificate for an AWS KMS RSA key.
//!
//! The PEM certificate goes to stdout (or `--out`); logs go to stderr.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kmscert::cert::extensions::ExtendedKeyUsageOption;
use kmscert::cert::params::{CertificateTemplate, DistinguishedName, KeyUsages, Validity};
use kmscert::kms::aws::{AwsKms, DEFAULT_REGION};
use kmscert::kms::{KeyId, KmsClient, KmsSigner};
use kmscert::pem_utils::{CERTIFICATE_LABEL, der_to_pem};

#[derive(Debug, Parser)]
#[command(name = "kmscert", version, about = "Issue a self-signed X.509 certificate signed by an AWS KMS key")]
struct Args {
    /// AWS KMS key id, ARN or alias of an RSA signing key.
    #[arg(long = "kid", env = "KMSCERT_KEY_ID")]
    key_id: KeyId,

    /// AWS region of the key.
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Subject organization name.
    #[arg(long, default_value = "KMS Sign Test")]
    organization: String,

    /// DNS name for the Subject Alternative Name extension; repeatable.
    #[arg(long = "dns-name", default_value = "kms-sign-test.com")]
    dns_names: Vec<String>,

    /// End of the validity window, RFC 3339.
    #[arg(long, default_value = "2030-12-31T00:00:00Z", value_parser = parse_rfc3339)]
    not_after: OffsetDateTime,

    /// Write the certificate here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Log filter, e.g. `info` or `kmscert=debug`.
    #[arg(long, env = "KMSCERT_LOG", default_value = "warn")]
    log_level: String,
}

fn parse_rfc3339(s: &str) -> std::result::Result<OffsetDateTime, String> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| e.to_string())
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(err) = run(args) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let service = AwsKms::connect(Some(args.region)).context("failed to connect to AWS KMS")?;
    let signer = KmsSigner::new(KmsClient::new(Arc::new(service)), args.key_id);

    let mut template = CertificateTemplate::builder()
        .subject(
            DistinguishedName::builder()
                .organization(args.organization)
                .build(),
        )
        .dns_names(args.dns_names)
        .validity(Validity::until(args.not_after))
        .key_usage(KeyUsages::DigitalSignature.into())
        .ext_key_usage(vec![ExtendedKeyUsageOption::ServerAuth])
        .basic_constraints_valid(true)
        .build();

    let der = signer
        .create_certificate(&mut template)
        .context("failed to create certificate")?;
    info!(
        key_id = %signer.key_id(),
        serial = ?template.serial_number,
        "certificate issued"
    );

    let pem = der_to_pem(&der, CERTIFICATE_LABEL);
    match args.out {
        Some(path) => std::fs::write(&path, pem)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => std::io::stdout()
            .lock()
            .write_all(pem.as_bytes())
            .context("failed to encode to pem format")?,
    }
    Ok(())
}
