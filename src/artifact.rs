//! Artifact capture: turn a clean execution report into a portable image.

use crate::config::RenderPolicy;
use crate::errors::{Result, SandboxError};
use crate::executor::ExecutionReport;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// The rendered chart from one successful invocation.
#[derive(Debug, Clone)]
pub struct Artifact {
    png: Vec<u8>,
}

impl Artifact {
    pub fn as_png(&self) -> &[u8] {
        &self.png
    }

    pub fn len(&self) -> usize {
        self.png.len()
    }

    pub fn is_empty(&self) -> bool {
        self.png.is_empty()
    }

    /// Transport encoding handed to downstream collaborators.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.png)
    }
}

/// Extract the artifact from a report. Runs strictly after a clean
/// execution; a report without drawable content is a failure, never an
/// empty or placeholder image.
pub fn capture(report: ExecutionReport, render: &RenderPolicy) -> Result<Artifact> {
    if !report.drew {
        return Err(SandboxError::NoArtifact);
    }
    let encoded = report.image_base64.ok_or(SandboxError::NoArtifact)?;
    let png = BASE64
        .decode(encoded.trim())
        .map_err(|err| SandboxError::Internal(format!("artifact is not valid base64: {err}")))?;
    if png.len() < PNG_SIGNATURE.len() || png[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return Err(SandboxError::Internal(
            "artifact is not a PNG image".to_string(),
        ));
    }
    if png.len() > render.max_artifact_bytes {
        return Err(SandboxError::ArtifactTooLarge {
            bytes: png.len(),
            limit: render.max_artifact_bytes,
        });
    }
    Ok(Artifact { png })
}
