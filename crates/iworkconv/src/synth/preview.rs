//! Best-effort extraction of the QuickLook preview PDF embedded in iWork
//! documents. Modern `.pages`/`.numbers`/`.key` files are ZIP containers that
//! usually ship one.

use std::io::{Cursor, Read};

use zip::ZipArchive;

/// Preview entry names, in lookup order. Matched case-insensitively.
const CANDIDATE_NAMES: [&str; 5] = [
    "QuickLook/Preview.pdf",
    "QuickLook/preview.pdf",
    "preview.pdf",
    "Preview.pdf",
    "QuickLook/Thumbnail.pdf",
];

/// Returns the embedded preview PDF if the input is a ZIP container holding
/// one, `None` otherwise. Never errors; any malformed input simply yields
/// `None`.
pub fn extract_embedded_pdf(input: &[u8]) -> Option<Vec<u8>> {
    if input.len() < 4 {
        return None;
    }
    // Local-file-header magic, or the end-of-central-directory magic an empty
    // archive starts with.
    if &input[..4] != b"PK\x03\x04" && &input[..4] != b"PK\x05\x06" {
        return None;
    }

    let mut archive = match ZipArchive::new(Cursor::new(input)) {
        Ok(archive) => archive,
        Err(e) => {
            log::debug!("Input looks like a ZIP but did not parse: {}", e);
            return None;
        }
    };

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    for candidate in CANDIDATE_NAMES {
        let Some(found) = names
            .iter()
            .find(|name| name.eq_ignore_ascii_case(candidate))
        else {
            continue;
        };

        let mut entry = match archive.by_name(found) {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        let mut data = Vec::new();
        if entry.read_to_end(&mut data).is_err() {
            continue;
        }
        if data.starts_with(b"%PDF-") {
            return Some(data);
        }
    }
    None
}
