/// Type registry
///
/// Static table of accepted upload types. Each extension maps to exactly one
/// declared MIME type and one or more binary signatures; a file is accepted
/// when its leading bytes match any one of them.
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Accepted type for a single extension
#[derive(Debug, PartialEq, Eq)]
pub struct TypeRule {
    pub extension: &'static str,
    pub mime_type: &'static str,
    pub signatures: &'static [&'static [u8]],
}

impl TypeRule {
    /// True if `prefix` starts with any of the registered signatures
    pub fn matches_signature(&self, prefix: &[u8]) -> bool {
        self.signatures
            .iter()
            .any(|signature| prefix.len() >= signature.len() && prefix.starts_with(signature))
    }
}

const JPEG_SIGNATURES: &[&[u8]] = &[
    &[0xFF, 0xD8, 0xFF, 0xE0], // JFIF
    &[0xFF, 0xD8, 0xFF, 0xE1], // EXIF
];

const RULES: &[TypeRule] = &[
    TypeRule {
        extension: "pdf",
        mime_type: "application/pdf",
        signatures: &[&[0x25, 0x50, 0x44, 0x46]], // %PDF
    },
    TypeRule {
        extension: "png",
        mime_type: "image/png",
        signatures: &[&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]],
    },
    TypeRule {
        extension: "jpeg",
        mime_type: "image/jpeg",
        signatures: JPEG_SIGNATURES,
    },
    TypeRule {
        extension: "jpg",
        mime_type: "image/jpeg",
        signatures: JPEG_SIGNATURES,
    },
    TypeRule {
        extension: "mp4",
        mime_type: "video/mp4",
        // ftyp box preceded by its size
        signatures: &[
            &[0x00, 0x00, 0x00, 0x18, 0x66, 0x74, 0x79, 0x70],
            &[0x00, 0x00, 0x00, 0x20, 0x66, 0x74, 0x79, 0x70],
        ],
    },
];

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, &'static TypeRule> =
        RULES.iter().map(|rule| (rule.extension, rule)).collect();
}

/// Look up the rule for an extension (with or without leading dot, any case)
pub fn lookup(extension: &str) -> Option<&'static TypeRule> {
    let normalized = extension.trim_start_matches('.').to_ascii_lowercase();
    REGISTRY.get(normalized.as_str()).copied()
}

/// Extension of the last path segment of a client-supplied filename
///
/// Returns None for names without a dot or ending in a dot.
pub fn extension_of(filename: &str) -> Option<&str> {
    let name = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);

    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Some(ext),
        _ => None,
    }
}
