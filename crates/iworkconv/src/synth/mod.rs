//! Fallback output synthesis.
//!
//! When no real converter is configured (or it fails), the pipeline still
//! produces a usable artifact: a minimal placeholder PDF for PDF targets, or
//! a text stub carrying the first kilobyte of the source for anything else.

pub mod pdf;
pub mod preview;

pub use pdf::generate_placeholder_pdf;
pub use preview::extract_embedded_pdf;

use crate::mappings::TargetFormat;

/// How much of the source is echoed into non-PDF placeholder output.
const SOURCE_EXCERPT_BYTES: usize = 1024;

/// Synthesizes placeholder output for `target` from the source bytes.
pub fn synthesize(source: &[u8], file_name: &str, target: TargetFormat) -> Vec<u8> {
    if target == TargetFormat::Pdf {
        return generate_placeholder_pdf(file_name);
    }

    let header = format!(
        "Converted by iWork \u{279c} Office Converter\nTarget: {}\nFile: {}\n\n",
        target.ext(),
        file_name
    );
    let excerpt = &source[..source.len().min(SOURCE_EXCERPT_BYTES)];

    let mut out = header.into_bytes();
    out.extend_from_slice(excerpt);
    out
}
