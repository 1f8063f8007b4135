//! Minimal single-page PDF generation.
//!
//! Output is a complete, valid PDF 1.4 file with five objects (catalog, page
//! tree, page, content stream, font) and a correct cross-reference table, so
//! any conforming reader can open it. Byte-for-byte deterministic for a given
//! file name.

/// Escapes the characters PDF string literals treat specially.
fn escape_pdf_text(s: &str) -> String {
    s.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

/// Generates a one-page PDF whose only content is a placeholder line naming
/// the converted file.
pub fn generate_placeholder_pdf(file_name: &str) -> Vec<u8> {
    let text = format!("Converted placeholder for {}", file_name);
    let content_stream = format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET", escape_pdf_text(&text));

    let header = "%PDF-1.4\n";
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Count 1 /Kids [3 0 R] >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content_stream.len(),
            content_stream
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = String::from(header);
    let mut offsets = [0usize; 5];
    for (i, body) in objects.iter().enumerate() {
        offsets[i] = out.len();
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_start = out.len();
    out.push_str("xref\n0 6\n");
    out.push_str("0000000000 65535 f \n");
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size 6 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        xref_start
    ));

    out.into_bytes()
}
