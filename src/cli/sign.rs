//! `exesign`: sign an existing executable without building.

use super::OutputManager;
use crate::builder::{Platform, SigningSettings, request::DEFAULT_TIMESTAMP_URL};
use crate::error::Result;
use crate::sign::{SignRequest, Signer};
use clap::Parser;
use std::path::PathBuf;

/// Sign an executable with the platform's code-signing tool
#[derive(Parser, Debug, Clone)]
#[command(
    name = "exesign",
    version,
    about = "Sign an executable with signtool (Windows) or osslsigncode"
)]
pub struct SignArgs {
    /// Executable to sign
    #[arg(value_name = "EXECUTABLE")]
    pub executable: PathBuf,

    /// Code-signing certificate (.pfx); omitted selects one from the Windows store
    #[arg(long, value_name = "PATH")]
    pub cert: Option<PathBuf>,

    /// Certificate password
    #[arg(
        long,
        env = "EXEBUILD_CERT_PASSWORD",
        hide_env_values = true,
        value_name = "PASSWORD"
    )]
    pub password: Option<String>,

    /// RFC 3161 timestamp server
    #[arg(long, value_name = "URL", default_value = DEFAULT_TIMESTAMP_URL)]
    pub timestamp: String,

    /// Description embedded in the signature
    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    /// Debug logging
    #[arg(long)]
    pub debug: bool,
}

impl SignArgs {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn to_request(&self) -> SignRequest {
        let settings = SigningSettings {
            cert_path: self.cert.clone(),
            cert_password: self.password.clone(),
            timestamp_url: self.timestamp.clone(),
            description: self.description.clone(),
        };
        SignRequest::from_settings(&self.executable, &settings)
    }
}

pub(super) async fn execute(args: &SignArgs) -> Result<i32> {
    let output = OutputManager::new(args.debug, false);
    let request = args.to_request();

    match Signer::new(Platform::current()).sign(&request).await {
        Ok(()) => {
            output.success(&format!("Signed {}", request.artifact.display()));
            Ok(0)
        }
        Err(e) => {
            output.error(&format!("signing failed: {e}"));
            Ok(1)
        }
    }
}
