//! Upload preparation: composite, encode to the size window, and assemble
//! the payload for the transport collaborator.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::annotate::AnnotationDocument;
use crate::encode::{self, EncodedArtifact, EncoderBackend, SizeWindow};
use crate::Result;

/// Supplies the per-upload signature token given `(userId, timestamp)`.
/// The pipeline treats the token as an opaque string and appends it to the
/// payload unchanged.
pub trait SignatureProvider {
    fn sign(&self, user_id: &str, timestamp_ms: i64) -> String;
}

/// Everything the transport collaborator needs to submit one artwork.
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    pub artifact: EncodedArtifact,
    pub width: u32,
    pub height: u32,
    pub sign: String,
    pub timestamp_ms: i64,
    pub attempts: u32,
    pub window_met: bool,
}

impl PreparedUpload {
    /// Upstream filename convention: the timestamp plus the artifact
    /// extension.
    pub fn filename(&self) -> String {
        format!("{}.{}", self.timestamp_ms, self.artifact.format.extension())
    }
}

/// Orchestrates composite -> size-constrained encode -> payload assembly.
#[derive(Debug, Clone)]
pub struct UploadPreparer {
    window: SizeWindow,
    backend: EncoderBackend,
}

impl Default for UploadPreparer {
    fn default() -> Self {
        Self {
            window: SizeWindow::NATIVE,
            backend: EncoderBackend::Native,
        }
    }
}

impl UploadPreparer {
    pub fn new(window: SizeWindow, backend: EncoderBackend) -> Self {
        Self { window, backend }
    }

    /// Flatten the document, encode it into the size window, and attach the
    /// signature. A missed window is a warning carried on the result, not an
    /// error.
    pub fn prepare(
        &self,
        document: &AnnotationDocument,
        signer: &dyn SignatureProvider,
        user_id: &str,
        timestamp_ms: i64,
        cancel: Option<&CancellationToken>,
    ) -> Result<PreparedUpload> {
        let composite = document.composite();
        let (width, height) = composite.dimensions();

        let report = encode::encode_to_window(&composite, self.window, self.backend, cancel)?;
        info!(
            size_kb = report.artifact.size_bytes() / 1024,
            attempts = report.attempts,
            window_met = report.window_met,
            "Prepared upload artifact"
        );

        Ok(PreparedUpload {
            sign: signer.sign(user_id, timestamp_ms),
            width,
            height,
            timestamp_ms,
            attempts: report.attempts,
            window_met: report.window_met,
            artifact: report.artifact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::ArtifactFormat;
    use crate::raster::{PixelFormat, RasterBuffer};
    use crate::{TARGET_HEIGHT, TARGET_WIDTH};

    struct FixedSigner;

    impl SignatureProvider for FixedSigner {
        fn sign(&self, user_id: &str, timestamp_ms: i64) -> String {
            format!("sig-{user_id}-{timestamp_ms}")
        }
    }

    fn blank_document() -> AnnotationDocument {
        let bg =
            RasterBuffer::filled(TARGET_WIDTH, TARGET_HEIGHT, PixelFormat::Gray8, 255).unwrap();
        AnnotationDocument::new(bg).unwrap()
    }

    #[test]
    fn prepare_assembles_payload_fields() {
        let doc = blank_document();
        let preparer = UploadPreparer::new(SizeWindow::ESCALATING, EncoderBackend::Escalating);
        let prepared = preparer
            .prepare(&doc, &FixedSigner, "user-7", 1_700_000_000_000, None)
            .unwrap();

        assert_eq!(prepared.width, TARGET_WIDTH);
        assert_eq!(prepared.height, TARGET_HEIGHT);
        assert_eq!(prepared.sign, "sig-user-7-1700000000000");
        assert_eq!(prepared.timestamp_ms, 1_700_000_000_000);
        assert!(prepared.window_met);
        assert_eq!(prepared.filename(), "1700000000000.png");
    }

    #[test]
    fn native_window_miss_is_best_effort() {
        // A blank composite encodes far below 80 KiB; the prepared upload
        // still carries an artifact, flagged as outside the window.
        let doc = blank_document();
        let prepared = UploadPreparer::default()
            .prepare(&doc, &FixedSigner, "u", 1, None)
            .unwrap();

        assert!(!prepared.window_met);
        assert_eq!(prepared.attempts, 20);
        assert!(!prepared.artifact.bytes.is_empty());
        assert_eq!(prepared.artifact.format, ArtifactFormat::Png);
        assert_eq!(prepared.filename(), "1.png");
    }

    #[test]
    fn cancelled_prepare_surfaces_no_artifact() {
        let doc = blank_document();
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();

        let err = UploadPreparer::default().prepare(&doc, &FixedSigner, "u", 1, Some(&token));
        assert!(matches!(err, Err(crate::PipelineError::Cancelled)));
    }
}
