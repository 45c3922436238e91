// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Path Security Validator
//!
//! Two-phase validation of file paths before the file-read tool touches
//! the file system.
//!
//! ## Phase 1: Pre-Resolution
//!
//! The raw input string is screened without any file system access:
//!
//! - **Input validation**: blank input, oversized paths, disallowed
//!   control characters, NUL bytes, Unicode NFC normalization changes,
//!   absolute paths, excessive component counts
//! - **Categorised screens**: encoded traversal (including overlong
//!   UTF-8), Windows reserved device names, extended-length and
//!   separator-count bombs, invisible and bidirectional format
//!   characters, mixed separators, template-engine sigils, case-varied
//!   sensitive directory names. Each category rejects with its own
//!   reason so operators can tell why a path was denied.
//! - **Syntactic screen**: a single regex covering parent traversal,
//!   root and drive prefixes, UNC paths, URI schemes, forbidden filename
//!   characters, control bytes, expression-injection sigils, and shell
//!   metacharacters.
//!
//! ## Phase 2: Post-Resolution
//!
//! The candidate is joined to the sandbox base directory and resolved to
//! its real path. The resolved path must remain a descendant of the base
//! directory; with symlinks disallowed, no traversed component may be a
//! symlink; hidden-file components with embedded traversal characters are
//! rejected.
//!
//! ## Contract
//!
//! The validator is immutable after construction and thread-safe. Apart
//! from canonicalising the base directory at construction time, the only
//! file system access is the real-path resolution of phase 2 (plus the
//! per-component symlink probe when symlinks are disallowed).

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

use agent_workflow_domain::WorkflowError;

/// Default pre-resolution length cap in characters.
pub const DEFAULT_MAX_PATH_LENGTH: usize = 4096;

/// Default ceiling on path component count.
pub const DEFAULT_MAX_COMPONENTS: usize = 10;

/// Windows extended-path ceiling; longer input is a length-limit bypass.
const EXTENDED_PATH_LIMIT: usize = 32767;

/// Ceiling on separator characters; more is a nesting bomb.
const MAX_SEPARATORS: usize = 100;

/// Single-regex syntactic attack screen. Any match rejects the path.
static SUSPICIOUS_PATTERNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?ix)
        (^|[/\\]) \.\. ([/\\]|$)                                   # parent traversal
        | ^ /                                                      # host root
        | ^ [a-z] : [/\\]                                          # drive letter
        | ^ \\\\                                                   # UNC prefix
        | ^ [a-z][a-z0-9+.\-]* ://                                 # URI scheme
        | (^|[/\\]) (con|prn|aux|nul|com[1-9]|lpt[1-9]) (\.[^/\\]*)? ([/\\]|$)  # device names
        | [<>:"|?*;&]                                              # forbidden and shell chars
        | [\x00-\x1f]                                              # control bytes
        | \$\{ | \#\{ | %\{ | \$\( | `                             # expression injection
        | % (25)* (2e|2f|5c)                                       # percent-encoded . / \
        | \\x2[ef] | \\u002[ef] | \\x5c | \\u005c                  # alternative escapes
        "#,
    )
    .expect("syntactic screen regex is valid")
});

/// Encoded traversal variants, including overlong UTF-8 encodings.
static ENCODED_TRAVERSAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)%(25)*(2e|2f|5c)|%c0%ae|%c0%af|%c1%9c|%e0%80%ae|\\x2[ef]|\\u002[ef]")
        .expect("encoded traversal regex is valid")
});

/// Windows reserved device names at any path position.
static DEVICE_NAMES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|[/\\])(con|prn|aux|nul|com[1-9]|lpt[1-9])(\.[^/\\]*)?([/\\]|$)")
        .expect("device name regex is valid")
});

/// Template and expression sigils that must never appear in a path.
const TEMPLATE_SIGILS: [&str; 11] = [
    "${", "#{", "%{", "$(", "{{", "{%", "<%", "[%", "[[", "]]", "}}",
];

/// Sensitive directory names probed with case folding.
const SENSITIVE_DIRECTORIES: [&str; 7] = [
    "/system32/",
    "/windows/",
    "/etc/",
    "/usr/",
    "/var/",
    "/bin/",
    "/sbin/",
];

/// Configuration for [`PathSecurityValidator`].
#[derive(Debug, Clone)]
pub struct PathSecurityConfig {
    /// Sandbox root; canonicalised at validator construction
    pub base_dir: PathBuf,

    /// Whether resolved paths may traverse symlinks
    pub allow_symlinks: bool,

    /// Pre-resolution length cap in characters
    pub max_path_length: usize,

    /// Ceiling on path component count
    pub max_components: usize,
}

impl PathSecurityConfig {
    /// Creates a config with default limits for the given sandbox root.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            allow_symlinks: false,
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
            max_components: DEFAULT_MAX_COMPONENTS,
        }
    }
}

/// Validation verdict. `Valid` carries the resolved real path inside the
/// sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathValidation {
    Valid(PathBuf),
    Invalid { reason: String },
}

impl PathValidation {
    /// Whether the path was accepted
    pub fn is_valid(&self) -> bool {
        matches!(self, PathValidation::Valid(_))
    }

    /// Rejection reason, present iff invalid
    pub fn reason(&self) -> Option<&str> {
        match self {
            PathValidation::Valid(_) => None,
            PathValidation::Invalid { reason } => Some(reason),
        }
    }

    /// Resolved path, present iff valid
    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            PathValidation::Valid(path) => Some(path),
            PathValidation::Invalid { .. } => None,
        }
    }
}

/// Stateless, thread-safe path validator bound to one sandbox root.
#[derive(Debug, Clone)]
pub struct PathSecurityValidator {
    base_dir: PathBuf,
    allow_symlinks: bool,
    max_path_length: usize,
    max_components: usize,
}

impl PathSecurityValidator {
    /// Creates a validator, resolving the base directory to its real path.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::SecurityViolation` when the configured base
    /// directory does not exist or cannot be canonicalised.
    pub fn new(config: PathSecurityConfig) -> Result<Self, WorkflowError> {
        let base_dir = std::fs::canonicalize(&config.base_dir).map_err(|e| {
            WorkflowError::security_violation(format!(
                "Cannot resolve base directory '{}': {}",
                config.base_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            base_dir,
            allow_symlinks: config.allow_symlinks,
            max_path_length: config.max_path_length,
            max_components: config.max_components,
        })
    }

    /// The canonicalised sandbox root
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Validates a candidate path against the sandbox.
    ///
    /// Screens that recognise a specific attack family (encoded traversal,
    /// device names) run before the generic syntactic screen so their
    /// rejection reasons are not masked by the catch-all pattern.
    pub fn validate(&self, raw: &str) -> PathValidation {
        let screens = [
            Self::check_input,
            Self::check_encoding_and_devices,
            Self::check_syntactic,
            Self::check_categories,
        ];
        for screen in screens {
            if let Err(reason) = screen(self, raw) {
                warn!(reason = %reason, "rejected file path");
                return PathValidation::Invalid { reason };
            }
        }

        match self.resolve_within_base(raw) {
            Ok(resolved) => PathValidation::Valid(resolved),
            Err(reason) => {
                warn!(reason = %reason, "rejected file path after resolution");
                PathValidation::Invalid { reason }
            }
        }
    }

    // -- phase 1: input validation -----------------------------------------

    fn check_input(&self, raw: &str) -> Result<(), String> {
        if raw.trim().is_empty() {
            return Err("path is empty or blank".to_string());
        }

        let char_count = raw.chars().count();
        if char_count > self.max_path_length {
            return Err(format!(
                "path length {} exceeds the {} character limit",
                char_count, self.max_path_length
            ));
        }

        if raw.contains('\0') {
            return Err("path contains a NUL byte".to_string());
        }

        if raw
            .chars()
            .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r'))
        {
            return Err("path contains control characters".to_string());
        }

        if raw.nfc().collect::<String>() != raw {
            return Err("path changes under unicode normalization".to_string());
        }

        if raw.starts_with('/') || raw.starts_with('\\') || Path::new(raw).is_absolute() || has_drive_prefix(raw) {
            return Err("absolute paths are not permitted".to_string());
        }

        let components = raw
            .split(['/', '\\'])
            .filter(|part| !part.is_empty())
            .count();
        if components > self.max_components {
            return Err(format!(
                "path has {} components, more than the {} allowed",
                components, self.max_components
            ));
        }

        Ok(())
    }

    // -- phase 1: categorised screens --------------------------------------

    fn check_encoding_and_devices(&self, raw: &str) -> Result<(), String> {
        if ENCODED_TRAVERSAL.is_match(raw) {
            return Err("path contains encoded traversal sequences".to_string());
        }

        if DEVICE_NAMES.is_match(raw) {
            return Err("path references a Windows reserved device name".to_string());
        }

        Ok(())
    }

    fn check_categories(&self, raw: &str) -> Result<(), String> {
        if raw.chars().count() > EXTENDED_PATH_LIMIT {
            return Err("path exceeds the extended path length limit".to_string());
        }

        if raw.chars().filter(|c| matches!(c, '/' | '\\')).count() > MAX_SEPARATORS {
            return Err("path contains excessive separator nesting".to_string());
        }

        if raw.chars().any(is_invisible_or_format) {
            return Err("path contains invisible or format characters".to_string());
        }

        if raw.contains('/') && raw.contains('\\') {
            return Err("path mixes forward and backward separators".to_string());
        }

        if TEMPLATE_SIGILS.iter().any(|sigil| raw.contains(sigil)) {
            return Err("path contains template expression sigils".to_string());
        }

        let folded = format!("/{}/", raw.to_lowercase().replace('\\', "/").trim_matches('/'));
        if SENSITIVE_DIRECTORIES.iter().any(|dir| folded.contains(dir)) {
            return Err("path targets a sensitive system directory".to_string());
        }

        Ok(())
    }

    // -- phase 1: syntactic screen -----------------------------------------

    fn check_syntactic(&self, raw: &str) -> Result<(), String> {
        if SUSPICIOUS_PATTERNS.is_match(raw) {
            return Err("path contains suspicious patterns".to_string());
        }
        Ok(())
    }

    // -- phase 2: resolution -----------------------------------------------

    fn resolve_within_base(&self, raw: &str) -> Result<PathBuf, String> {
        for component in Path::new(raw).components() {
            if let Component::Normal(name) = component {
                let name = name.to_string_lossy();
                if name.starts_with('.') && name.len() > 1 && name[1..].contains(['.', '/', '\\']) {
                    return Err("hidden file component with embedded traversal characters".to_string());
                }
            }
        }

        if !self.allow_symlinks {
            let mut probe = self.base_dir.clone();
            for component in Path::new(raw).components() {
                probe.push(component);
                if let Ok(metadata) = std::fs::symlink_metadata(&probe) {
                    if metadata.file_type().is_symlink() {
                        return Err("path traverses a symbolic link".to_string());
                    }
                }
            }
        }

        let joined = self.base_dir.join(raw);
        let resolved = std::fs::canonicalize(&joined).map_err(|e| format!("cannot resolve path: {}", e))?;

        if !resolved.starts_with(&self.base_dir) {
            return Err("resolved path escapes the sandbox".to_string());
        }

        Ok(resolved)
    }
}

fn has_drive_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Invisible, zero-width, bidirectional, and other Unicode format
/// characters that can disguise a hostile path.
fn is_invisible_or_format(c: char) -> bool {
    if c.is_control() && !matches!(c, '\t' | '\n' | '\r') {
        return true;
    }
    matches!(
        c as u32,
        0x00AD                      // soft hyphen
        | 0x0600..=0x0605           // Arabic format signs
        | 0x061C                    // Arabic letter mark
        | 0x06DD
        | 0x070F
        | 0x08E2
        | 0x180E                    // Mongolian vowel separator
        | 0x200B..=0x200F           // zero-width space/joiners, directional marks
        | 0x202A..=0x202E           // bidirectional embeddings and overrides
        | 0x2060..=0x2064           // word joiner, invisible operators
        | 0x2066..=0x2069           // directional isolates
        | 0xFEFF                    // byte order mark
        | 0xFFF9..=0xFFFB           // interlinear annotations
        | 0x110BD
        | 0x110CD
        | 0x1D173..=0x1D17A
        | 0xE0001
        | 0xE0020..=0xE007F
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sandbox() -> (tempfile::TempDir, PathSecurityValidator) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs").join("guide.md"), "guide").unwrap();
        let validator = PathSecurityValidator::new(PathSecurityConfig::new(dir.path())).unwrap();
        (dir, validator)
    }

    #[test]
    fn test_accepts_simple_relative_path() {
        let (_dir, validator) = sandbox();
        let verdict = validator.validate("notes.txt");
        assert!(verdict.is_valid(), "unexpected reason: {:?}", verdict.reason());
    }

    #[test]
    fn test_accepts_nested_relative_path() {
        let (_dir, validator) = sandbox();
        assert!(validator.validate("docs/guide.md").is_valid());
    }

    #[test]
    fn test_rejects_parent_traversal() {
        let (_dir, validator) = sandbox();
        let verdict = validator.validate("../etc/passwd");
        assert!(!verdict.is_valid());
        assert!(verdict.reason().unwrap().contains("suspicious patterns"));
    }

    #[test]
    fn test_rejects_encoded_traversal() {
        let (_dir, validator) = sandbox();
        let verdict = validator.validate("a/%2e%2e/b");
        assert!(!verdict.is_valid());
        assert!(verdict.reason().unwrap().contains("encoded"));
    }

    #[test]
    fn test_rejects_double_encoded_traversal() {
        let (_dir, validator) = sandbox();
        let verdict = validator.validate("a/%252e%252e/b");
        assert!(!verdict.is_valid());
        assert!(verdict.reason().unwrap().contains("encoded"));
    }

    #[test]
    fn test_rejects_overlong_utf8_traversal() {
        let (_dir, validator) = sandbox();
        let verdict = validator.validate("a/%c0%ae%c0%ae/b");
        assert!(!verdict.is_valid());
        assert!(verdict.reason().unwrap().contains("encoded"));
    }

    #[test]
    fn test_rejects_blank_input() {
        let (_dir, validator) = sandbox();
        assert!(!validator.validate("").is_valid());
        assert!(!validator.validate("   ").is_valid());
    }

    #[test]
    fn test_rejects_nul_byte() {
        let (_dir, validator) = sandbox();
        let verdict = validator.validate("notes\0.txt");
        assert!(verdict.reason().unwrap().contains("NUL"));
    }

    #[test]
    fn test_rejects_absolute_paths() {
        let (_dir, validator) = sandbox();
        assert!(!validator.validate("/etc/passwd").is_valid());
        assert!(!validator.validate("C:\\windows\\system.ini").is_valid());
        assert!(!validator.validate("\\\\server\\share").is_valid());
    }

    #[test]
    fn test_rejects_windows_device_names() {
        let (_dir, validator) = sandbox();
        for path in ["CON", "prn.txt", "docs/NUL", "aux.log", "COM1", "lpt9.dat"] {
            let verdict = validator.validate(path);
            assert!(!verdict.is_valid(), "accepted device name path {path}");
            assert!(verdict.reason().unwrap().contains("device name"), "path {path}");
        }
    }

    #[test]
    fn test_rejects_uri_scheme() {
        let (_dir, validator) = sandbox();
        assert!(!validator.validate("file:///etc/passwd").is_valid());
        assert!(!validator.validate("http://host/x").is_valid());
    }

    #[test]
    fn test_rejects_expression_injection() {
        let (_dir, validator) = sandbox();
        for path in ["${jndi}", "#{expr}", "%{expr}", "$(id)", "`id`", "a;b", "a|b", "a&&b"] {
            assert!(!validator.validate(path).is_valid(), "accepted {path}");
        }
    }

    #[test]
    fn test_rejects_template_sigils() {
        let (_dir, validator) = sandbox();
        for path in ["{{name}}", "a{%tag%}", "x<%eval%>", "[[x]]", "y]]z"] {
            let verdict = validator.validate(path);
            assert!(!verdict.is_valid(), "accepted {path}");
        }
    }

    #[test]
    fn test_rejects_invisible_characters() {
        let (_dir, validator) = sandbox();
        for path in [
            "notes\u{200B}.txt",
            "notes\u{FEFF}.txt",
            "notes\u{202E}.txt",
            "notes\u{2066}.txt",
        ] {
            let verdict = validator.validate(path);
            assert!(!verdict.is_valid());
            assert!(verdict.reason().unwrap().contains("invisible"), "path {path:?}");
        }
    }

    #[test]
    fn test_rejects_mixed_separators() {
        let (_dir, validator) = sandbox();
        let verdict = validator.validate("docs/sub\\guide.md");
        assert!(!verdict.is_valid());
        assert!(verdict.reason().unwrap().contains("separators") || verdict.reason().unwrap().contains("mixes"));
    }

    #[test]
    fn test_rejects_sensitive_directories_with_case_variation() {
        let (_dir, validator) = sandbox();
        for path in ["EtC/passwd", "System32/config", "wInDoWs/win.ini"] {
            let verdict = validator.validate(path);
            assert!(!verdict.is_valid(), "accepted {path}");
            assert!(verdict.reason().unwrap().contains("sensitive"), "path {path}");
        }
    }

    #[test]
    fn test_rejects_component_count_over_ceiling() {
        let (_dir, validator) = sandbox();
        let deep = (0..11).map(|i| format!("d{i}")).collect::<Vec<_>>().join("/");
        let verdict = validator.validate(&deep);
        assert!(!verdict.is_valid());
        assert!(verdict.reason().unwrap().contains("components"));
    }

    #[test]
    fn test_path_length_boundary() {
        let (dir, _validator) = sandbox();
        let validator = PathSecurityValidator::new(PathSecurityConfig {
            max_components: 1,
            ..PathSecurityConfig::new(dir.path())
        })
        .unwrap();

        // Exactly at the cap: passes the length check and fails later only
        // because the file does not exist.
        let at_cap = "a".repeat(DEFAULT_MAX_PATH_LENGTH);
        let verdict = validator.validate(&at_cap);
        assert!(verdict
            .reason()
            .map(|r| !r.contains("character limit"))
            .unwrap_or(true));

        // One past the cap is rejected for length alone.
        let over_cap = "a".repeat(DEFAULT_MAX_PATH_LENGTH + 1);
        let verdict = validator.validate(&over_cap);
        assert!(verdict.reason().unwrap().contains("character limit"));
    }

    #[test]
    fn test_rejects_unicode_normalization_change() {
        let (_dir, validator) = sandbox();
        // 'e' followed by a combining acute accent is not NFC.
        let verdict = validator.validate("cafe\u{0301}.txt");
        assert!(!verdict.is_valid());
        assert!(verdict.reason().unwrap().contains("normalization"));
    }

    #[test]
    fn test_rejects_hidden_component_with_embedded_dots() {
        let (dir, validator) = sandbox();
        fs::write(dir.path().join(".hidden.cfg"), "x").unwrap();
        let verdict = validator.validate(".hidden.cfg");
        assert!(!verdict.is_valid());
        assert!(verdict.reason().unwrap().contains("hidden"));
    }

    #[test]
    fn test_plain_dotfile_is_allowed() {
        let (dir, validator) = sandbox();
        fs::write(dir.path().join(".envrc"), "x").unwrap();
        assert!(validator.validate(".envrc").is_valid());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_escape() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("link.txt")).unwrap();

        let validator = PathSecurityValidator::new(PathSecurityConfig::new(dir.path())).unwrap();
        let verdict = validator.validate("link.txt");
        assert!(!verdict.is_valid());
        assert!(verdict.reason().unwrap().contains("symbolic link") || verdict.reason().unwrap().contains("escapes"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_sandbox_allowed_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("real.txt"), "data").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("alias.txt")).unwrap();

        let validator = PathSecurityValidator::new(PathSecurityConfig {
            allow_symlinks: true,
            ..PathSecurityConfig::new(dir.path())
        })
        .unwrap();
        assert!(validator.validate("alias.txt").is_valid());

        let strict = PathSecurityValidator::new(PathSecurityConfig::new(dir.path())).unwrap();
        assert!(!strict.validate("alias.txt").is_valid());
    }

    #[test]
    fn test_missing_base_dir_rejected_at_construction() {
        let result = PathSecurityValidator::new(PathSecurityConfig::new("/does/not/exist/anywhere"));
        assert!(result.is_err());
    }

    #[test]
    fn test_valid_verdict_resolves_inside_base() {
        let (_dir, validator) = sandbox();
        let resolved = validator.validate("notes.txt").into_path().unwrap();
        assert!(resolved.starts_with(validator.base_dir()));
    }
}
