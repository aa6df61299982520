//! Status command implementation

use anyhow::{Context, Result};
use serde::Serialize;

use crate::output::format_status;
use crate::settings::{credential_store, Overrides};
use opk_agent::CertificateInfo;
use opk_core::IdentityStatus;

#[derive(Serialize)]
struct StatusReport {
    name: String,
    private_key: String,
    certificate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_secs: Option<u64>,
    status: IdentityStatus,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    principals: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_before: Option<u64>,
}

/// Show the age and status of the identity on disk
pub async fn status_command(overrides: &Overrides, json: bool) -> Result<()> {
    let config = overrides.resolve()?;
    let store = credential_store(&config)?;
    let files = store.files(&config.name);

    let age = store
        .age(&config.name)
        .with_context(|| format!("Failed to check identity {:?}", files.private_key))?;
    let status = IdentityStatus::classify(age, config.max_age, config.validity);

    // The certificate is informational; an unreadable one is not fatal
    let certificate = if files.certificate.exists() {
        match CertificateInfo::read(&files.certificate).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!("Could not read certificate {:?}: {}", files.certificate, e);
                None
            }
        }
    } else {
        None
    };

    if json {
        let report = StatusReport {
            name: config.name.clone(),
            private_key: files.private_key.display().to_string(),
            certificate: files.certificate.display().to_string(),
            age_secs: age.duration().map(|d| d.as_secs()),
            summary: status.summary(),
            status,
            key_id: certificate.as_ref().map(|c| c.key_id.clone()),
            principals: certificate.as_ref().map(|c| c.principals.clone()),
            valid_before: certificate.as_ref().map(|c| c.valid_before),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{}",
            format_status(&config.name, age, &status, certificate.as_ref())
        );
    }

    Ok(())
}
