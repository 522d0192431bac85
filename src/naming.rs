//! Package naming and application identity.
//!
//! Every directory, file, and identifier derived from a package uses the
//! normalized name produced here. The raw title survives only as the
//! display name inside generated resources.

use unicode_normalization::UnicodeNormalization;

use crate::error::PipelineError;

/// Upper bound on a normalized name, in characters.
pub const MAX_NAME_LEN: usize = 50;

/// Fold `raw` to a lower-case `[a-z0-9_]` token of at most [`MAX_NAME_LEN`] chars.
///
/// Accented letters fold to their base letter; everything else outside the
/// allowed set is dropped.
pub fn normalize_name(raw: &str) -> String {
    raw.nfkd()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .take(MAX_NAME_LEN)
        .collect()
}

/// Java reserved words and literals; none may appear as a package segment.
const JAVA_RESERVED: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "false", "final",
    "finally", "float", "for", "goto", "if", "implements", "import", "instanceof", "int",
    "interface", "long", "native", "new", "null", "package", "private", "protected", "public",
    "return", "short", "static", "strictfp", "super", "switch", "synchronized", "this", "throw",
    "throws", "transient", "true", "try", "void", "volatile", "while", "_",
];

/// Turn a normalized name into a valid Java/Android package segment.
///
/// A segment must start with a letter and must not be a reserved word.
pub fn package_segment(name: &str) -> String {
    let segment = match name.chars().next() {
        Some(c) if c.is_ascii_lowercase() => name.to_string(),
        _ => format!("app_{}", name),
    };
    if JAVA_RESERVED.contains(&segment.as_str()) {
        format!("{}_", segment)
    } else {
        segment
    }
}

/// Identity fields written into the native project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    /// Normalized package name, used for directories and files.
    pub name: String,
    /// Reverse-domain application identifier.
    pub app_id: String,
    /// Title as the user typed it, shown under the launcher icon.
    pub display_name: String,
}

impl AppIdentity {
    pub fn new(raw_name: &str, app_id_prefix: &str) -> Result<Self, PipelineError> {
        let name = normalize_name(raw_name);
        if name.is_empty() {
            return Err(PipelineError::Validation(format!(
                "package name '{}' has no usable characters",
                raw_name
            )));
        }
        Ok(Self {
            app_id: format!(
                "{}.{}",
                app_id_prefix.trim_end_matches('.'),
                package_segment(&name)
            ),
            display_name: raw_name.split_whitespace().collect::<Vec<_>>().join(" "),
            name,
        })
    }

    /// Path segments of the application identifier, for the Java source tree.
    pub fn package_path(&self) -> std::path::PathBuf {
        self.app_id.split('.').collect()
    }
}
