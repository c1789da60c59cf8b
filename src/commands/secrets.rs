//! Secret commands
//!
//! `set`, `get`, `delete`, `list`, `stats` and `load`. Values reach the
//! output only when the caller asks for them with `reveal`.

use std::io::Write;
use std::path::Path;

use zeroize::Zeroizing;

use crate::commands::{confirm, prompt_value, OutputFormat, MASKED_VALUE};
use crate::error::{CommandResult, SecretError};
use crate::models::Category;
use crate::secrets::{infer_category, SecretManager};

/// `set` arguments
#[derive(Debug, Default)]
pub struct SetArgs {
    pub name: String,
    /// Prompted for when absent
    pub value: Option<String>,
    pub category: Option<Category>,
    pub description: Option<String>,
}

pub fn set_secret(manager: &SecretManager, args: SetArgs, out: &mut impl Write) -> CommandResult<()> {
    let value = match args.value {
        Some(value) => Zeroizing::new(value),
        None => prompt_value(&args.name)?,
    };
    let category = args
        .category
        .unwrap_or_else(|| infer_category(args.name.trim()));

    manager.set(&args.name, &value, Some(category), args.description.as_deref())?;
    writeln!(out, "Stored {} ({})", args.name.trim(), category)?;
    Ok(())
}

/// One name, or every name (optionally of one category)
pub fn get_secret(
    manager: &SecretManager,
    name: Option<&str>,
    reveal: bool,
    category: Option<Category>,
    out: &mut impl Write,
) -> CommandResult<()> {
    let show = |value: &str| if reveal { value.to_string() } else { MASKED_VALUE.to_string() };

    if let Some(name) = name {
        let value = Zeroizing::new(manager.get(name)?);
        writeln!(out, "{}={}", name.trim(), show(&value))?;
        return Ok(());
    }

    let values = manager.reveal_all(category)?;
    if values.is_empty() {
        writeln!(out, "No secrets found")?;
        return Ok(());
    }
    for (name, value) in &values {
        writeln!(out, "{}={}", name, show(value))?;
    }
    Ok(())
}

pub fn delete_secret(
    manager: &SecretManager,
    name: &str,
    force: bool,
    out: &mut impl Write,
) -> CommandResult<()> {
    if !manager.contains(name)? {
        return Err(SecretError::NotFound(name.trim().to_string()).into());
    }
    if !force && !confirm(&format!("Delete secret '{}'?", name.trim()))? {
        writeln!(out, "Aborted")?;
        return Ok(());
    }

    if manager.delete(name)? {
        writeln!(out, "Deleted {}", name.trim())?;
    } else {
        // removed by someone else after the check
        return Err(SecretError::NotFound(name.trim().to_string()).into());
    }
    Ok(())
}

pub fn list_secrets(
    manager: &SecretManager,
    category: Option<Category>,
    format: OutputFormat,
    out: &mut impl Write,
) -> CommandResult<()> {
    let infos = manager.list(category)?;

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &infos)?;
            writeln!(out)?;
        }
        OutputFormat::Table => {
            if infos.is_empty() {
                writeln!(out, "No secrets found")?;
                return Ok(());
            }
            let width = infos.iter().map(|i| i.name.len()).max().unwrap_or(0).max(4);
            writeln!(
                out,
                "{:<width$}  {:<8}  {:<19}  DESCRIPTION",
                "NAME",
                "CATEGORY",
                "UPDATED",
                width = width
            )?;
            for info in &infos {
                writeln!(
                    out,
                    "{:<width$}  {:<8}  {:<19}  {}",
                    info.name,
                    info.category.as_str(),
                    info.updated_at.format("%Y-%m-%d %H:%M:%S"),
                    info.description.as_deref().unwrap_or("-"),
                    width = width
                )?;
            }
            writeln!(out, "\n{} secret(s)", infos.len())?;
        }
    }
    Ok(())
}

pub fn show_stats(manager: &SecretManager, out: &mut impl Write) -> CommandResult<()> {
    let stats = manager.stats()?;

    writeln!(out, "Store:        {}", stats.store_path.display())?;
    writeln!(out, "Master key:   {}", manager.key_source())?;
    writeln!(out, "Total:        {}", stats.total)?;
    writeln!(out, "Cached:       {}", stats.cached_count)?;
    for (category, count) in &stats.by_category {
        writeln!(out, "  {:<10} {}", category.as_str(), count)?;
    }
    Ok(())
}

/// `load` arguments
#[derive(Debug, Default)]
pub struct LoadArgs<'a> {
    pub category: Option<Category>,
    /// Seed an empty store from this file first
    pub env_file: Option<&'a Path>,
    /// List the loaded names
    pub show: bool,
    pub reveal: bool,
}

/// Export stored values into this process's environment
pub fn load_env(
    manager: &SecretManager,
    args: LoadArgs<'_>,
    out: &mut impl Write,
) -> CommandResult<()> {
    if let Some(env_file) = args.env_file {
        let report = manager.bootstrap(env_file, false)?;
        if let Some(imported) = report.imported {
            writeln!(
                out,
                "Seeded empty store with {} secret(s) from {}",
                imported.imported,
                env_file.display()
            )?;
        }
    }

    let loaded = manager.load_into_env(args.category)?;
    writeln!(out, "Loaded {} secret(s) into the environment", loaded)?;

    if args.show {
        for (name, value) in &manager.reveal_all(args.category)? {
            let shown = if args.reveal { value.as_str() } else { MASKED_VALUE };
            writeln!(out, "  {}={}", name, shown)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretsConfig;
    use tempfile::{tempdir, TempDir};

    fn open_temp() -> (TempDir, SecretManager) {
        let dir = tempdir().unwrap();
        let manager = SecretManager::open(&SecretsConfig::in_dir(dir.path())).unwrap();
        (dir, manager)
    }

    fn set(manager: &SecretManager, name: &str, value: &str) {
        let args = SetArgs {
            name: name.to_string(),
            value: Some(value.to_string()),
            ..Default::default()
        };
        set_secret(manager, args, &mut Vec::new()).unwrap();
    }

    fn run(f: impl FnOnce(&mut Vec<u8>) -> CommandResult<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_set_reports_inferred_category() {
        let (_dir, manager) = open_temp();
        let out = run(|out| {
            set_secret(
                &manager,
                SetArgs {
                    name: "SMTP_PASSWORD".into(),
                    value: Some("pw".into()),
                    ..Default::default()
                },
                out,
            )
        });
        assert_eq!(out, "Stored SMTP_PASSWORD (database)\n");
    }

    #[test]
    fn test_get_masks_unless_revealed() {
        let (_dir, manager) = open_temp();
        set(&manager, "JWT_SECRET_KEY", "s3cr3t");
        set(&manager, "REDIS_HOST", "localhost");

        let masked = run(|out| get_secret(&manager, Some("JWT_SECRET_KEY"), false, None, out));
        assert_eq!(masked, "JWT_SECRET_KEY=<set>\n");

        let revealed = run(|out| get_secret(&manager, Some("JWT_SECRET_KEY"), true, None, out));
        assert_eq!(revealed, "JWT_SECRET_KEY=s3cr3t\n");

        let all = run(|out| get_secret(&manager, None, false, None, out));
        assert!(!all.contains("s3cr3t") && !all.contains("localhost"));

        let cache = run(|out| get_secret(&manager, None, true, Some(Category::Cache), out));
        assert_eq!(cache, "REDIS_HOST=localhost\n");
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let (_dir, manager) = open_temp();
        let err = get_secret(&manager, Some("NOPE"), false, None, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code, "NOT_FOUND");
    }

    #[test]
    fn test_delete_with_force() {
        let (_dir, manager) = open_temp();
        set(&manager, "API_TOKEN", "t");

        let out = run(|out| delete_secret(&manager, "API_TOKEN", true, out));
        assert_eq!(out, "Deleted API_TOKEN\n");

        let err = delete_secret(&manager, "API_TOKEN", true, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code, "NOT_FOUND");
    }

    #[test]
    fn test_list_formats() {
        let (_dir, manager) = open_temp();
        set(&manager, "OPENAI_API_KEY", "sk-1");
        set(&manager, "DATABASE_HOST", "db");

        let table = run(|out| list_secrets(&manager, None, OutputFormat::Table, out));
        assert!(table.starts_with("NAME"));
        assert!(table.find("DATABASE_HOST").unwrap() < table.find("OPENAI_API_KEY").unwrap());
        assert!(table.contains("2 secret(s)"));
        assert!(!table.contains("sk-1"));

        let json = run(|out| list_secrets(&manager, Some(Category::Api), OutputFormat::Json, out));
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
        assert_eq!(parsed[0]["name"], "OPENAI_API_KEY");
        assert_eq!(parsed[0]["category"], "api");
        assert!(!json.contains("sk-1"));
    }

    #[test]
    fn test_delete_missing_fails_before_prompting() {
        let (_dir, manager) = open_temp();
        let err = delete_secret(&manager, "NEVER_SET", false, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code, "NOT_FOUND");
    }

    #[test]
    fn test_load_seeds_and_masks() {
        let (dir, manager) = open_temp();
        let env_path = dir.path().join(".env");
        std::fs::write(&env_path, "LOADCMD_TEST_TOKEN=abc123\n").unwrap();

        let args = LoadArgs {
            env_file: Some(&env_path),
            show: true,
            ..Default::default()
        };
        let out = run(|out| load_env(&manager, args, out));
        assert!(out.contains("Seeded empty store with 1 secret(s)"));
        assert!(out.contains("Loaded 1 secret(s)"));
        assert!(out.contains("LOADCMD_TEST_TOKEN=<set>"));
        assert!(!out.contains("abc123"));
        assert_eq!(std::env::var("LOADCMD_TEST_TOKEN").unwrap(), "abc123");

        let args = LoadArgs {
            show: true,
            reveal: true,
            ..Default::default()
        };
        let out = run(|out| load_env(&manager, args, out));
        assert!(!out.contains("Seeded"));
        assert!(out.contains("LOADCMD_TEST_TOKEN=abc123"));
    }

    #[test]
    fn test_stats_output() {
        let (_dir, manager) = open_temp();
        set(&manager, "REDIS_PASSWORD", "x");
        let out = run(|out| show_stats(&manager, out));
        assert!(out.contains("Total:        1"));
        assert!(out.contains("database"));
        assert!(out.contains("Master key:   generated"));
    }
}
