//! Plaintext migration tooling
//!
//! - `KEY=VALUE` parsing for importing existing `.env` files
//! - template rendering for a shareable, value-free `.env.template`

use zeroize::Zeroizing;

use crate::models::{Category, ImportWarning, SecretInfo};

/// Placeholder written instead of a value
pub const TEMPLATE_PLACEHOLDER: &str = "<set actual value>";

/// One parsed assignment
pub struct EnvEntry {
    /// 1-based source line
    pub line: usize,
    pub key: String,
    pub value: Zeroizing<String>,
}

impl std::fmt::Debug for EnvEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvEntry")
            .field("line", &self.line)
            .field("key", &self.key)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct ParsedEnv {
    pub entries: Vec<EnvEntry>,
    pub warnings: Vec<ImportWarning>,
}

/// Secret names: ASCII letters, digits, `_`, `.` and `-`
pub fn is_valid_env_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

/// Lenient `.env` parser.
///
/// Blank lines and `#` comments are ignored, a leading `export ` is dropped,
/// and one pair of matching surrounding quotes is stripped from the value.
/// Lines that are not a valid assignment become warnings.
pub fn parse_env(content: &str) -> ParsedEnv {
    let mut parsed = ParsedEnv::default();
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
        let Some((k, v)) = line.split_once('=') else {
            parsed.warnings.push(ImportWarning {
                line: line_no,
                message: "expected KEY=VALUE".to_string(),
            });
            continue;
        };

        let key = k.trim();
        if !is_valid_env_key(key) {
            parsed.warnings.push(ImportWarning {
                line: line_no,
                message: format!("invalid key {:?}", key),
            });
            continue;
        }

        parsed.entries.push(EnvEntry {
            line: line_no,
            key: key.to_string(),
            value: Zeroizing::new(unquote(v.trim()).to_string()),
        });
    }

    parsed
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Render a value-free template, one section per category.
pub fn render_template(infos: &[SecretInfo]) -> String {
    let mut out = String::new();
    out.push_str("# Secure environment template\n");
    out.push_str("# Contains no secret values; safe to commit to version control.\n");

    for category in Category::ALL {
        let mut items: Vec<&SecretInfo> = infos.iter().filter(|i| i.category == category).collect();
        if items.is_empty() {
            continue;
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));

        out.push('\n');
        out.push_str(&format!(
            "# ==================== {} ====================\n",
            category.as_str().to_uppercase()
        ));
        for item in items {
            if let Some(desc) = item.description.as_deref().filter(|d| !d.trim().is_empty()) {
                // keep multi-line descriptions inside the comment
                for desc_line in desc.lines() {
                    out.push_str(&format!("# {}\n", desc_line));
                }
            }
            out.push_str(&format!("{}={}\n", item.name, TEMPLATE_PLACEHOLDER));
        }
    }

    out
}
