//! Magic-byte type classification.
//!
//! Only a bounded prefix of the file is inspected. Client-supplied names and
//! extensions play no part in the decision.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::TypeCategory;

/// Raster formats recognized as images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Gif,
    Jpeg,
    Bmp,
}

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Tunables for classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// How many leading bytes to inspect
    pub prefix_bytes: usize,

    /// Fraction of suspicious bytes above which content counts as binary
    pub binary_threshold: f64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            prefix_bytes: 4100,
            binary_threshold: 0.10,
        }
    }
}

/// Classifies files by their leading bytes
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    settings: ClassifierSettings,
}

impl Classifier {
    pub fn new(settings: ClassifierSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    /// Read the prefix of `path` and classify it
    pub fn classify(&self, path: &Path) -> std::io::Result<TypeCategory> {
        let prefix = self.read_prefix(path)?;
        let category = self.classify_bytes(&prefix);

        tracing::debug!(
            file = %path.display(),
            bytes = prefix.len(),
            category = %category,
            "Classified file"
        );

        Ok(category)
    }

    /// Classify an already-read prefix.
    ///
    /// Images win over PDF, PDF over the text heuristic. Short and empty
    /// inputs go straight to the heuristic.
    pub fn classify_bytes(&self, prefix: &[u8]) -> TypeCategory {
        let prefix = &prefix[..prefix.len().min(self.settings.prefix_bytes)];

        if sniff_image(prefix).is_some() {
            return TypeCategory::Image;
        }

        if prefix.starts_with(PDF_MAGIC) {
            return TypeCategory::Pdf;
        }

        if is_binary(prefix, self.settings.binary_threshold) {
            TypeCategory::Unusable
        } else {
            TypeCategory::Plaintext
        }
    }

    fn read_prefix(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        let file = File::open(path)?;
        let mut prefix = Vec::with_capacity(self.settings.prefix_bytes);
        file.take(self.settings.prefix_bytes as u64)
            .read_to_end(&mut prefix)?;
        Ok(prefix)
    }
}

/// Match the prefix against the supported raster signatures
pub fn sniff_image(prefix: &[u8]) -> Option<ImageKind> {
    if prefix.starts_with(PNG_MAGIC) {
        return Some(ImageKind::Png);
    }

    if prefix.starts_with(b"GIF87a") || prefix.starts_with(b"GIF89a") {
        return Some(ImageKind::Gif);
    }

    if prefix.starts_with(JPEG_MAGIC) {
        return Some(ImageKind::Jpeg);
    }

    // "BM" alone is too common in text; require the zeroed reserved fields
    if prefix.len() >= 14 && prefix.starts_with(b"BM") && prefix[6..10] == [0, 0, 0, 0] {
        return Some(ImageKind::Bmp);
    }

    None
}

/// Binary-vs-text heuristic.
///
/// Any NUL byte means binary. Otherwise control characters outside the usual
/// whitespace set and bytes that are not part of valid UTF-8 count as
/// suspicious; a suspicious ratio above `threshold` means binary. Empty input
/// is text.
pub fn is_binary(prefix: &[u8], threshold: f64) -> bool {
    if prefix.is_empty() {
        return false;
    }

    // UTF-16 text carries NULs; accept it when it announces itself
    if prefix.starts_with(&[0xFE, 0xFF]) || prefix.starts_with(&[0xFF, 0xFE]) {
        return false;
    }

    let body = prefix.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(prefix);

    if body.contains(&0) {
        return true;
    }

    let control = body
        .iter()
        .filter(|&&b| b < 7 || (b > 14 && b < 32 && b != 0x1B) || b == 0x7F)
        .count();
    let suspicious = control + invalid_utf8_bytes(body);

    (suspicious as f64 / prefix.len() as f64) > threshold
}

/// Count bytes that don't belong to a valid UTF-8 sequence.
///
/// A sequence cut off by the prefix bound is not counted.
fn invalid_utf8_bytes(mut bytes: &[u8]) -> usize {
    let mut invalid = 0;
    loop {
        match std::str::from_utf8(bytes) {
            Ok(_) => return invalid,
            Err(e) => match e.error_len() {
                Some(len) => {
                    invalid += len;
                    bytes = &bytes[e.valid_up_to() + len..];
                }
                None => return invalid,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(bytes: &[u8]) -> TypeCategory {
        Classifier::default().classify_bytes(bytes)
    }

    #[test]
    fn test_image_signatures() {
        let mut png = PNG_MAGIC.to_vec();
        png.extend_from_slice(&[0, 0, 0, 13]);
        assert_eq!(sniff_image(&png), Some(ImageKind::Png));
        assert_eq!(sniff_image(b"GIF89a\x01\x00"), Some(ImageKind::Gif));
        assert_eq!(sniff_image(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageKind::Jpeg));

        let mut bmp = b"BM".to_vec();
        bmp.extend_from_slice(&[0x46, 0, 0, 0, 0, 0, 0, 0, 0x36, 0, 0, 0]);
        assert_eq!(sniff_image(&bmp), Some(ImageKind::Bmp));
    }

    #[test]
    fn test_bm_text_is_not_bmp() {
        assert_eq!(sniff_image(b"BMW drivers are everywhere"), None);
        assert_eq!(classify(b"BMW drivers are everywhere"), TypeCategory::Plaintext);
    }

    #[test]
    fn test_truncated_png_magic_is_not_image() {
        assert_eq!(sniff_image(&PNG_MAGIC[..4]), None);
    }

    #[test]
    fn test_pdf() {
        assert_eq!(classify(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n"), TypeCategory::Pdf);
    }

    #[test]
    fn test_text_and_binary() {
        assert_eq!(classify(b"hello world\n"), TypeCategory::Plaintext);
        assert_eq!(classify("grüße, 你好\r\n\t".as_bytes()), TypeCategory::Plaintext);
        assert_eq!(classify(&[0x7F, b'E', b'L', b'F', 2, 1, 1, 0]), TypeCategory::Unusable);
        assert_eq!(classify(&[0x50, 0x4B, 0x03, 0x04, 0x14, 0x00]), TypeCategory::Unusable);
    }

    #[test]
    fn test_empty_input_is_plaintext() {
        assert_eq!(classify(b""), TypeCategory::Plaintext);
    }

    #[test]
    fn test_mostly_invalid_utf8_is_binary() {
        let noise: Vec<u8> = (0..200).map(|i| 0x80 + (i % 64) as u8).collect();
        assert!(is_binary(&noise, 0.10));
    }

    #[test]
    fn test_sparse_latin1_is_text() {
        // One stray Latin-1 byte in a long line stays under the threshold
        let mut text = b"caf".to_vec();
        text.push(0xE9);
        text.extend_from_slice(&[b' '; 40]);
        assert!(!is_binary(&text, 0.10));
    }

    #[test]
    fn test_cut_utf8_sequence_at_prefix_end() {
        let mut text = "ok ".repeat(10).into_bytes();
        text.extend_from_slice(&[0xE4, 0xBD]); // first two bytes of a 3-byte char
        assert_eq!(invalid_utf8_bytes(&text), 0);
    }

    #[test]
    fn test_prefix_bound_is_respected() {
        let classifier = Classifier::new(ClassifierSettings {
            prefix_bytes: 8,
            binary_threshold: 0.10,
        });
        // NUL sits beyond the inspected prefix
        let mut bytes = b"plain text".to_vec();
        bytes.push(0);
        assert_eq!(classifier.classify_bytes(&bytes), TypeCategory::Plaintext);
    }
}
