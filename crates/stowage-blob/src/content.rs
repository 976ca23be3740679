//! Content type detection

use std::path::Path;

/// Fallback content type
pub const OCTET_STREAM: &str = "application/octet-stream";

const BY_EXTENSION: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("zip", "application/zip"),
];

const BY_SIGNATURE: &[(&[u8], &str)] = &[
    (&[0xFF, 0xD8, 0xFF], "image/jpeg"),
    (&[0x89, b'P', b'N', b'G'], "image/png"),
    (b"GIF8", "image/gif"),
    (b"%PDF", "application/pdf"),
    (&[b'P', b'K', 0x03, 0x04], "application/zip"),
];

/// Detect a content type from a name's extension, then from magic numbers
pub fn detect_content_type(name: &str, data: &[u8]) -> String {
    let by_extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .and_then(|ext| {
            BY_EXTENSION
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        });

    by_extension
        .or_else(|| sniff(data))
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

fn sniff(data: &[u8]) -> Option<&'static str> {
    // RIFF container with a WEBP form type
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    BY_SIGNATURE
        .iter()
        .find(|(magic, _)| data.starts_with(magic))
        .map(|(_, mime)| *mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_content_type() {
        assert_eq!(detect_content_type("photo.JPG", &[]), "image/jpeg");
        assert_eq!(detect_content_type("notes.txt", &[]), "text/plain");
        assert_eq!(detect_content_type("report.pdf", &[]), "application/pdf");

        let png_data = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_content_type("3f2a-uuid", &png_data), "image/png");

        let webp_data = *b"RIFF\0\0\0\0WEBPVP8 ";
        assert_eq!(detect_content_type("noext", &webp_data), "image/webp");

        assert_eq!(detect_content_type("unknown", &[0x00, 0x01, 0x02, 0x03]), OCTET_STREAM);
        assert_eq!(detect_content_type("unknown", b"ab"), OCTET_STREAM);
    }
}
