use std::path::Path;

use tokio::io::AsyncReadExt;

/// Bytes inspected for magic numbers and UTF-8 validity
const SNIFF_LEN: usize = 8192;

/// Infers the MIME type of a staged artifact from its content
///
/// Magic numbers win; otherwise UTF-8 text is `text/plain` and anything
/// else `application/octet-stream`. Empty files are reported as
/// `application/x-empty`. Returns `None` when the file cannot be read.
pub async fn detect_mime(path: &Path) -> Option<String> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut head).await.ok()?;
    Some(mime_from_bytes(&head).to_string())
}

pub fn mime_from_bytes(head: &[u8]) -> &'static str {
    if head.is_empty() {
        return "application/x-empty";
    }
    if let Some(kind) = infer::get(head) {
        return kind.mime_type();
    }
    if is_text(head) {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

/// UTF-8 check that tolerates a multi-byte sequence cut off by the sniff window
fn is_text(head: &[u8]) -> bool {
    match std::str::from_utf8(head) {
        Ok(text) => !text.contains('\0'),
        Err(e) => e.error_len().is_none() && !head[..e.valid_up_to()].contains(&0),
    }
}
