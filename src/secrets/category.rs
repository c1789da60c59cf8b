//! Category inference
//!
//! Ordered rule table, first match wins. Patterns are matched as
//! case-insensitive substrings of the secret name.

use crate::models::Category;

/// Inference rules, in priority order.
///
/// `KEY` is checked after the api rule, so `OPENAI_API_KEY` and
/// `RECAPTCHA_SITE_KEY` land in `api`; only otherwise unclaimed `*_KEY`
/// names become `security`.
pub const CATEGORY_RULES: &[(Category, &[&str])] = &[
    (Category::Database, &["DATABASE", "POSTGRES", "DB_", "PASSWORD"]),
    (Category::Security, &["JWT", "SECRET", "TOKEN"]),
    (Category::Api, &["API", "OPENAI", "RECAPTCHA"]),
    (Category::Email, &["SMTP", "EMAIL", "MAIL"]),
    (Category::Cache, &["REDIS", "CACHE"]),
    (Category::Security, &["KEY"]),
];

/// Category used when no rule matches
pub const DEFAULT_CATEGORY: Category = Category::General;

/// Infer a category from a secret name.
pub fn infer_category(name: &str) -> Category {
    let upper = name.to_ascii_uppercase();
    CATEGORY_RULES
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| upper.contains(p)))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}
