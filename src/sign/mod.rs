//! Code signing of produced executables.
//!
//! The signing utility is located through a per-platform strategy:
//!
//! - **Windows**: `signtool.exe` probed in a fixed, ordered list of Windows SDK
//!   install locations. Without a certificate file the tool auto-selects one
//!   from the certificate store (`/a`).
//! - **Other platforms**: `osslsigncode` assumed on the search path. There is no
//!   certificate store, so a certificate file is required.
//!
//! A zero exit status from the signing tool is taken as success; the signature
//! is not re-verified.

use crate::builder::{
    Platform, SigningSettings,
    error::{Error, ErrorExt, Result},
};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Digest algorithm used for file and timestamp signatures.
pub const HASH_ALGORITHM: &str = "sha256";

const SIGNTOOL: &str = "signtool.exe";
const OSSLSIGNCODE: &str = "osslsigncode";
const DEFAULT_PROGRAM_FILES_X86: &str = r"C:\Program Files (x86)";

/// A request to sign one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    pub artifact: PathBuf,
    pub cert_path: Option<PathBuf>,
    pub cert_password: Option<String>,
    pub timestamp_url: String,
    pub description: Option<String>,
}

impl SignRequest {
    /// Request for `artifact` with the default timestamp server and no certificate.
    pub fn new(artifact: impl Into<PathBuf>) -> Self {
        Self::from_settings(artifact, &SigningSettings::default())
    }

    pub fn from_settings(artifact: impl Into<PathBuf>, settings: &SigningSettings) -> Self {
        Self {
            artifact: artifact.into(),
            cert_path: settings.cert_path.clone(),
            cert_password: settings.cert_password.clone(),
            timestamp_url: settings.timestamp_url.clone(),
            description: settings.description.clone(),
        }
    }

    /// Check that every referenced input exists and the timestamp URL parses.
    pub fn validate(&self) -> Result<()> {
        if !self.artifact.exists() {
            return Err(Error::PathNotFound {
                what: "executable file",
                path: self.artifact.clone(),
            });
        }
        if let Some(cert) = &self.cert_path {
            if !cert.exists() {
                return Err(Error::PathNotFound {
                    what: "certificate file",
                    path: cert.clone(),
                });
            }
        }
        url::Url::parse(&self.timestamp_url).map_err(|e| {
            Error::GenericError(format!(
                "invalid timestamp server URL '{}': {}",
                self.timestamp_url, e
            ))
        })?;
        Ok(())
    }
}

/// How a platform finds its signing utility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolLocator {
    /// First existing path wins
    Candidates(Vec<PathBuf>),
    /// Looked up on the search path
    SearchPath(&'static str),
}

/// Signing-tool lookup strategy for `platform`.
pub fn locator_for(platform: Platform) -> ToolLocator {
    match platform {
        Platform::Windows => {
            let program_files = std::env::var_os("ProgramFiles(x86)")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM_FILES_X86));
            ToolLocator::Candidates(signtool_candidates(&program_files))
        }
        Platform::MacOs | Platform::Linux | Platform::Other => ToolLocator::SearchPath(OSSLSIGNCODE),
    }
}

/// Windows SDK signtool locations, newest SDK and 64-bit first.
pub fn signtool_candidates(program_files_x86: &Path) -> Vec<PathBuf> {
    let kits = program_files_x86.join("Windows Kits");
    let mut candidates = Vec::new();
    for sdk in ["10", "8.1"] {
        for arch in ["x64", "x86"] {
            candidates.push(kits.join(sdk).join("bin").join(arch).join(SIGNTOOL));
        }
    }
    candidates
}

/// A resolved signing utility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignTool {
    Signtool(PathBuf),
    Osslsigncode(PathBuf),
}

impl SignTool {
    pub fn program(&self) -> &Path {
        match self {
            SignTool::Signtool(path) | SignTool::Osslsigncode(path) => path,
        }
    }

    /// Arguments for signing `request.artifact`.
    pub fn args(&self, request: &SignRequest) -> Vec<String> {
        match self {
            SignTool::Signtool(_) => signtool_args(request),
            SignTool::Osslsigncode(_) => osslsigncode_args(request),
        }
    }
}

fn signtool_args(request: &SignRequest) -> Vec<String> {
    let mut args = vec!["sign".to_string()];
    match &request.cert_path {
        Some(cert) => {
            args.push("/f".into());
            args.push(cert.display().to_string());
            if let Some(password) = &request.cert_password {
                args.push("/p".into());
                args.push(password.clone());
            }
        }
        None => args.push("/a".into()),
    }
    args.extend([
        "/tr".to_string(),
        request.timestamp_url.clone(),
        "/td".into(),
        HASH_ALGORITHM.into(),
    ]);
    if let Some(description) = &request.description {
        args.push("/d".into());
        args.push(description.clone());
    }
    args.extend(["/fd".to_string(), HASH_ALGORITHM.to_string()]);
    args.push(request.artifact.display().to_string());
    args
}

fn osslsigncode_args(request: &SignRequest) -> Vec<String> {
    let mut args = vec!["sign".to_string()];
    if let Some(cert) = &request.cert_path {
        args.push("-pkcs12".into());
        args.push(cert.display().to_string());
        if let Some(password) = &request.cert_password {
            args.push("-pass".into());
            args.push(password.clone());
        }
    }
    args.extend([
        "-ts".to_string(),
        request.timestamp_url.clone(),
        "-h".into(),
        HASH_ALGORITHM.into(),
    ]);
    if let Some(description) = &request.description {
        args.push("-n".into());
        args.push(description.clone());
    }
    args.extend([
        "-in".to_string(),
        request.artifact.display().to_string(),
        "-out".into(),
        signed_output(&request.artifact).display().to_string(),
    ]);
    args
}

/// Temporary output file for tools that cannot sign in place.
fn signed_output(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".signed");
    artifact.with_file_name(name)
}

/// Join arguments for logging with the certificate password masked.
fn redacted(program: &Path, args: &[String]) -> String {
    let mut parts = vec![program.display().to_string()];
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            parts.push("********".into());
            mask_next = false;
            continue;
        }
        mask_next = arg == "/p" || arg == "-pass";
        parts.push(arg.clone());
    }
    parts.join(" ")
}

/// Signs files with the platform's signing utility.
#[derive(Debug, Clone)]
pub struct Signer {
    platform: Platform,
}

impl Signer {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// Locate the signing utility able to handle `request`.
    ///
    /// # Errors
    ///
    /// - [`Error::SignUnsupported`] when no certificate file is given on a
    ///   platform without a certificate store
    /// - [`Error::SignToolNotFound`] when the utility cannot be found
    pub fn resolve_tool(&self, request: &SignRequest) -> Result<SignTool> {
        match locator_for(self.platform) {
            ToolLocator::Candidates(candidates) => {
                match candidates.iter().find(|path| path.is_file()) {
                    Some(path) => Ok(SignTool::Signtool(path.clone())),
                    None => Err(Error::SignToolNotFound {
                        tool: SIGNTOOL.to_string(),
                        searched: candidates,
                    }),
                }
            }
            ToolLocator::SearchPath(tool) => {
                if request.cert_path.is_none() {
                    return Err(Error::SignUnsupported {
                        platform: self.platform.to_string(),
                    });
                }
                which::which(tool)
                    .map(SignTool::Osslsigncode)
                    .map_err(|_| Error::SignToolNotFound {
                        tool: tool.to_string(),
                        searched: Vec::new(),
                    })
            }
        }
    }

    /// Sign `request.artifact`.
    ///
    /// # Errors
    ///
    /// [`Error::PathNotFound`] for a missing artifact or certificate, the
    /// errors of [`Signer::resolve_tool`], and [`Error::SignFailed`] when the
    /// tool exits non-zero.
    pub async fn sign(&self, request: &SignRequest) -> Result<()> {
        request.validate()?;
        let tool = self.resolve_tool(request)?;
        let args = tool.args(request);

        log::info!("Signing {}", request.artifact.display());
        log::debug!("Running: {}", redacted(tool.program(), &args));

        let output = Command::new(tool.program())
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| Error::CommandFailed {
                command: tool.program().display().to_string(),
                error,
            })?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            log::error!("Signing output:\n{}\n{}", stdout.trim(), stderr.trim());
            return Err(Error::SignFailed {
                code: output.status.code(),
                stdout,
                stderr,
            });
        }

        if let SignTool::Osslsigncode(_) = tool {
            let signed = signed_output(&request.artifact);
            tokio::fs::rename(&signed, &request.artifact)
                .await
                .fs_context("replacing artifact with signed copy", &signed)?;
        }

        log::info!("✓ Signed {}", request.artifact.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(artifact: &str) -> SignRequest {
        SignRequest::new(artifact)
    }

    #[test]
    fn signtool_candidates_are_ordered() {
        let candidates = signtool_candidates(Path::new("C:/PF86"));
        let expected: Vec<PathBuf> = [("10", "x64"), ("10", "x86"), ("8.1", "x64"), ("8.1", "x86")]
            .iter()
            .map(|(sdk, arch)| {
                Path::new("C:/PF86")
                    .join("Windows Kits")
                    .join(sdk)
                    .join("bin")
                    .join(arch)
                    .join("signtool.exe")
            })
            .collect();
        assert_eq!(candidates, expected);
    }

    #[test]
    fn store_selection_without_certificate() {
        let args = SignTool::Signtool("signtool.exe".into()).args(&request("app.exe"));
        assert_eq!(
            args,
            vec![
                "sign",
                "/a",
                "/tr",
                "http://timestamp.digicert.com",
                "/td",
                "sha256",
                "/fd",
                "sha256",
                "app.exe"
            ]
        );
    }

    #[test]
    fn certificate_password_and_description() {
        let mut req = request("app.exe");
        req.cert_path = Some("cert.pfx".into());
        req.cert_password = Some("hunter2".into());
        req.description = Some("My App".into());

        let args = SignTool::Signtool("signtool.exe".into()).args(&req);
        assert_eq!(
            args,
            vec![
                "sign",
                "/f",
                "cert.pfx",
                "/p",
                "hunter2",
                "/tr",
                "http://timestamp.digicert.com",
                "/td",
                "sha256",
                "/d",
                "My App",
                "/fd",
                "sha256",
                "app.exe"
            ]
        );
        let shown = redacted(Path::new("signtool.exe"), &args);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("/p ********"));
    }

    #[test]
    fn osslsigncode_writes_to_sibling_file() {
        let mut req = request("dist/app.exe");
        req.cert_path = Some("cert.pfx".into());
        let args = SignTool::Osslsigncode("osslsigncode".into()).args(&req);
        assert_eq!(args[..3], ["sign", "-pkcs12", "cert.pfx"]);
        assert_eq!(args[args.len() - 1], Path::new("dist").join("app.exe.signed").display().to_string());
        assert!(args.contains(&"-ts".to_string()));
    }

    #[test]
    fn no_certificate_off_windows_is_unsupported() {
        let err = Signer::new(Platform::Linux)
            .resolve_tool(&request("app"))
            .unwrap_err();
        assert!(matches!(err, Error::SignUnsupported { .. }));
        assert!(err.to_string().contains("not supported on this platform"));
    }

    #[tokio::test]
    async fn missing_artifact_fails_fast() {
        let err = Signer::new(Platform::Windows)
            .sign(&request("/nonexistent/app.exe"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PathNotFound { what: "executable file", .. }));
    }

    #[tokio::test]
    async fn missing_certificate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("app.exe");
        std::fs::write(&artifact, "MZ").unwrap();

        let mut req = SignRequest::new(&artifact);
        req.cert_path = Some(dir.path().join("missing.pfx"));
        let err = Signer::new(Platform::Linux).sign(&req).await.unwrap_err();
        assert!(matches!(err, Error::PathNotFound { what: "certificate file", .. }));
    }

    #[test]
    fn invalid_timestamp_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("app.exe");
        std::fs::write(&artifact, "MZ").unwrap();

        let mut req = SignRequest::new(&artifact);
        req.timestamp_url = "not a url".into();
        assert!(req.validate().is_err());
    }
}
