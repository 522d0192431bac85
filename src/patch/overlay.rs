//! Key/value overlay for Gradle build files.
//!
//! Each [`Directive`] owns one declaration, identified by its leading key
//! (`namespace`, `applicationId`, `buildDir`). Applying a directive replaces
//! the existing declaration in place, or inserts it right after the first
//! line that opens its anchor block. Applying the same overlay twice yields
//! the same text as applying it once.

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    key: &'static str,
    value: String,
    anchor: &'static str,
}

impl Directive {
    pub fn namespace(app_id: &str) -> Self {
        Self {
            key: "namespace",
            value: format!("\"{}\"", app_id),
            anchor: "android",
        }
    }

    pub fn application_id(app_id: &str) -> Self {
        Self {
            key: "applicationId",
            value: format!("\"{}\"", app_id),
            anchor: "defaultConfig",
        }
    }

    pub fn build_dir(path: &std::path::Path) -> Self {
        // Gradle accepts forward slashes on every host.
        let path = path.display().to_string().replace('\\', "/");
        Self {
            key: "buildDir",
            value: format!("= file(\"{}\")", path),
            anchor: "android",
        }
    }

    fn render(&self, indent: &str) -> String {
        format!("{}{} {}", indent, self.key, self.value)
    }

    /// Declaration lines start with the key followed by whitespace or `=`.
    fn matches(&self, line: &str) -> bool {
        line.trim_start()
            .strip_prefix(self.key)
            .map(|rest| rest.starts_with(|c: char| c.is_whitespace() || c == '=' || c == '('))
            .unwrap_or(false)
    }
}

fn is_anchor(line: &str, block: &str) -> bool {
    line.trim_start()
        .strip_prefix(block)
        .map(|rest| rest.trim() == "{")
        .unwrap_or(false)
}

fn indent_of(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// An ordered set of directives.
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    directives: Vec<Directive>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn apply(&self, text: &str) -> Result<String, PipelineError> {
        let trailing_newline = text.ends_with('\n');
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();

        for directive in &self.directives {
            if let Some(idx) = lines.iter().position(|l| directive.matches(l)) {
                let indent = indent_of(&lines[idx]).to_string();
                lines[idx] = directive.render(&indent);
                // Drop any later duplicates left by hand edits.
                let mut i = idx + 1;
                while i < lines.len() {
                    if directive.matches(&lines[i]) {
                        lines.remove(i);
                    } else {
                        i += 1;
                    }
                }
                continue;
            }
            let Some(anchor_idx) = lines.iter().position(|l| is_anchor(l, directive.anchor)) else {
                return Err(PipelineError::ConfigPatch(format!(
                    "no '{} {{' block to hold '{}'",
                    directive.anchor, directive.key
                )));
            };
            let indent = format!("{}    ", indent_of(&lines[anchor_idx]));
            lines.insert(anchor_idx + 1, directive.render(&indent));
        }

        let mut out = lines.join("\n");
        if trailing_newline {
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const GRADLE: &str = "apply plugin: 'com.android.application'\n\nandroid {\n    compileSdkVersion 34\n    defaultConfig {\n        minSdkVersion 24\n    }\n}\n";

    fn overlay() -> Overlay {
        Overlay::new()
            .with(Directive::namespace("com.librosdar.libro"))
            .with(Directive::application_id("com.librosdar.libro"))
            .with(Directive::build_dir(Path::new("/mnt/alt/build/libro")))
    }

    #[test]
    fn test_inserts_after_anchor() {
        let out = overlay().apply(GRADLE).unwrap();
        assert!(out.contains(
            "android {\n    buildDir = file(\"/mnt/alt/build/libro\")\n    namespace \"com.librosdar.libro\"\n"
        ));
        assert!(out.contains("defaultConfig {\n        applicationId \"com.librosdar.libro\"\n"));
        assert!(out.ends_with("}\n"));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let once = overlay().apply(GRADLE).unwrap();
        let twice = overlay().apply(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_replaces_existing_declaration_in_place() {
        let text = "android {\n  namespace \"com.old.app\"\n  defaultConfig {\n    applicationId \"com.old.app\"\n  }\n}\n";
        let out = Overlay::new()
            .with(Directive::namespace("com.new.app"))
            .with(Directive::application_id("com.new.app"))
            .apply(text)
            .unwrap();
        assert_eq!(
            out,
            "android {\n  namespace \"com.new.app\"\n  defaultConfig {\n    applicationId \"com.new.app\"\n  }\n}\n"
        );
    }

    #[test]
    fn test_collapses_duplicate_declarations() {
        let text = "android {\n    buildDir = file(\"a\")\n    buildDir = file(\"b\")\n}";
        let out = Overlay::new()
            .with(Directive::build_dir(Path::new("c")))
            .apply(text)
            .unwrap();
        assert_eq!(out, "android {\n    buildDir = file(\"c\")\n}");
    }

    #[test]
    fn test_does_not_match_longer_keys() {
        let d = Directive::namespace("x");
        assert!(!d.matches("    namespaceSuffix \"y\""));
        assert!(d.matches("namespace=\"y\""));
    }

    #[test]
    fn test_missing_anchor_is_config_error() {
        let err = Overlay::new()
            .with(Directive::namespace("com.x"))
            .apply("dependencies {\n}\n")
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigPatch(_)));
    }
}
