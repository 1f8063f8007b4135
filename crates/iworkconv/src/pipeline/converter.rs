//! The pluggable conversion engine seam.

use async_trait::async_trait;

use crate::error::ConvertError;
use crate::mappings::{SourceKind, TargetFormat};

/// An external conversion engine. Implementations receive the raw source
/// bytes and must return the converted document; any error other than
/// `Unconfigured` fails the job.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(
        &self,
        input: &[u8],
        file_name: &str,
        kind: SourceKind,
        target: TargetFormat,
    ) -> Result<Vec<u8>, ConvertError>;
}

/// Stand-in used when no real engine is wired up. Always fails, which routes
/// every job through placeholder synthesis.
pub struct UnconfiguredConverter;

#[async_trait]
impl Converter for UnconfiguredConverter {
    async fn convert(
        &self,
        _input: &[u8],
        _file_name: &str,
        _kind: SourceKind,
        _target: TargetFormat,
    ) -> Result<Vec<u8>, ConvertError> {
        Err(ConvertError::Unconfigured)
    }
}
