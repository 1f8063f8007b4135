//! Source-kind and target-format model with the fixed conversion table.

use serde::{Deserialize, Serialize};

/// Kind of iWork container a source file is assumed to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Pages,
    Numbers,
    Keynote,
}

impl SourceKind {
    /// Infers the kind from a file name's extension. Unknown extensions
    /// default to `Pages`, matching the submission form's behavior.
    pub fn from_file_name(name: &str) -> Self {
        match file_ext(name).as_str() {
            "pages" => SourceKind::Pages,
            "numbers" => SourceKind::Numbers,
            "key" => SourceKind::Keynote,
            _ => SourceKind::Pages,
        }
    }

    /// The fixed set of legal targets for this kind.
    pub fn allowed_targets(&self) -> &'static [TargetFormat] {
        match self {
            SourceKind::Pages => &[TargetFormat::Docx, TargetFormat::Rtf, TargetFormat::Pdf],
            SourceKind::Numbers => &[TargetFormat::Xlsx, TargetFormat::Csv, TargetFormat::Pdf],
            SourceKind::Keynote => &[TargetFormat::Pptx, TargetFormat::Pdf],
        }
    }

    pub fn is_valid_mapping(&self, target: TargetFormat) -> bool {
        self.allowed_targets().contains(&target)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Pages => write!(f, "pages"),
            SourceKind::Numbers => write!(f, "numbers"),
            SourceKind::Keynote => write!(f, "keynote"),
        }
    }
}

/// Output format a job converts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetFormat {
    Docx,
    Rtf,
    Pdf,
    Xlsx,
    Csv,
    Pptx,
}

impl TargetFormat {
    pub fn from_ext(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" => Some(TargetFormat::Docx),
            "rtf" => Some(TargetFormat::Rtf),
            "pdf" => Some(TargetFormat::Pdf),
            "xlsx" => Some(TargetFormat::Xlsx),
            "csv" => Some(TargetFormat::Csv),
            "pptx" => Some(TargetFormat::Pptx),
            _ => None,
        }
    }

    pub fn ext(&self) -> &'static str {
        match self {
            TargetFormat::Docx => "docx",
            TargetFormat::Rtf => "rtf",
            TargetFormat::Pdf => "pdf",
            TargetFormat::Xlsx => "xlsx",
            TargetFormat::Csv => "csv",
            TargetFormat::Pptx => "pptx",
        }
    }

    /// Fixed extension-to-MIME table used for downloads.
    pub fn mime(&self) -> &'static str {
        match self {
            TargetFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            TargetFormat::Rtf => "application/rtf",
            TargetFormat::Pdf => "application/pdf",
            TargetFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            TargetFormat::Csv => "text/csv",
            TargetFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ext())
    }
}

/// Lowercased final extension of a file name, or an empty string.
pub fn file_ext(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// MIME type for an arbitrary stored name, falling back to octet-stream when
/// the extension is not one of the six conversion targets.
pub fn mime_for_name(name: &str) -> &'static str {
    TargetFormat::from_ext(&file_ext(name))
        .map(|t| t.mime())
        .unwrap_or("application/octet-stream")
}

/// Replaces the input's extension with the target's.
pub fn derive_output_name(input_name: &str, target: TargetFormat) -> String {
    let stem = match input_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => input_name,
    };
    format!("{}.{}", stem, target.ext())
}

/// Human-readable byte count for logs and listings.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let i = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let i = i.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(i as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[i])
}
