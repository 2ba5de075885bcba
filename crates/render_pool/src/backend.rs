//! wkhtmltox command backend
//!
//! Renders by round-tripping through scratch files: the document is written
//! to a temp directory, the converter binary is invoked on it, and the
//! output file is read back. The child process is killed if the invocation
//! future is dropped, which is how the pool enforces its task timeout.

use std::path::Path;
use std::process::Stdio;

use bytes::Bytes;
use contracts::{ContractError, RenderBackend, RenderFormat, RenderRequest};
use tokio::process::Command;
use tracing::{debug, warn};

const PDF_BINARY: &str = "wkhtmltopdf";
const IMAGE_BINARY: &str = "wkhtmltoimage";

/// Rendering backend driving the wkhtmltox binaries.
pub struct CommandBackend {
    pdf_binary: String,
    image_binary: String,
}

impl CommandBackend {
    pub fn new() -> Self {
        Self {
            pdf_binary: PDF_BINARY.to_string(),
            image_binary: IMAGE_BINARY.to_string(),
        }
    }

    /// Override the binary paths, for installs outside `PATH`.
    pub fn with_binaries(pdf_binary: impl Into<String>, image_binary: impl Into<String>) -> Self {
        Self {
            pdf_binary: pdf_binary.into(),
            image_binary: image_binary.into(),
        }
    }

    fn binary_for(&self, format: RenderFormat) -> &str {
        match format {
            RenderFormat::Pdf => &self.pdf_binary,
            RenderFormat::Png | RenderFormat::Jpeg => &self.image_binary,
        }
    }

    async fn check_binary(binary: &str) -> Result<(), ContractError> {
        let output = Command::new(binary)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                ContractError::render_backend(format!("cannot run '{binary}': {e}"))
            })?;

        if output.status.success() {
            let version = String::from_utf8_lossy(&output.stdout);
            debug!(binary, version = %version.trim(), "render binary available");
            Ok(())
        } else {
            Err(ContractError::render_backend(format!(
                "'{binary} --version' exited with {}",
                output.status
            )))
        }
    }

    async fn run_converter(
        &self,
        format: RenderFormat,
        input: &Path,
        output_path: &Path,
    ) -> Result<(), ContractError> {
        let binary = self.binary_for(format);
        let mut command = Command::new(binary);
        command
            .arg("--quiet")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let RenderFormat::Png | RenderFormat::Jpeg = format {
            let fmt = match format {
                RenderFormat::Png => "png",
                _ => "jpg",
            };
            command.arg("--format").arg(fmt);
        }

        let output = command
            .arg(input)
            .arg(output_path)
            .output()
            .await
            .map_err(|e| ContractError::render_backend(format!("spawn '{binary}': {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(binary, status = %output.status, "converter failed");
            return Err(ContractError::render_backend(format!(
                "'{binary}' exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl Default for CommandBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for CommandBackend {
    async fn probe(&self) -> Result<(), ContractError> {
        Self::check_binary(&self.image_binary).await?;
        Self::check_binary(&self.pdf_binary).await
    }

    async fn render(&self, request: &RenderRequest) -> Result<Bytes, ContractError> {
        // the directory and everything in it is removed on drop, including
        // when the pool times this future out
        let scratch = tempfile::tempdir().map_err(|e| {
            ContractError::render_backend(format!("scratch dir: {e}"))
        })?;

        let input = scratch.path().join("document.html");
        let output_path = scratch
            .path()
            .join(format!("output{}", request.format.extension()));

        tokio::fs::write(&input, &request.html).await?;
        self.run_converter(request.format, &input, &output_path)
            .await?;

        let bytes = tokio::fs::read(&output_path).await.map_err(|e| {
            ContractError::render_backend(format!("read converter output: {e}"))
        })?;

        if bytes.is_empty() {
            return Err(ContractError::render_backend(
                "converter produced empty output",
            ));
        }

        Ok(Bytes::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_selection() {
        let backend = CommandBackend::with_binaries("/opt/wkhtmltopdf", "/opt/wkhtmltoimage");
        assert_eq!(backend.binary_for(RenderFormat::Pdf), "/opt/wkhtmltopdf");
        assert_eq!(backend.binary_for(RenderFormat::Png), "/opt/wkhtmltoimage");
        assert_eq!(backend.binary_for(RenderFormat::Jpeg), "/opt/wkhtmltoimage");
    }

    #[tokio::test]
    async fn test_probe_missing_binary() {
        let backend =
            CommandBackend::with_binaries("/nonexistent/wkhtmltopdf", "/nonexistent/wkhtmltoimage");
        let err = backend.probe().await.unwrap_err();
        assert!(matches!(err, ContractError::RenderBackend { .. }));
    }
}
