//! Storage Commands (import / export / backup / restore / init)
//!
//! Every user-supplied path goes through `validate_path` first.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::commands::confirm;
use crate::error::CommandResult;
use crate::secrets::SecretManager;
use crate::settings::AppSettings;
use crate::utils::validate_path;

/// Default `export` target
pub const DEFAULT_TEMPLATE_FILE: &str = ".env.template";

/// Default `init` source
pub const DEFAULT_ENV_FILE: &str = ".env";

/// `<path><suffix>`, e.g. `secure_env.db` -> `secure_env.db.backup`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

pub fn import_env(manager: &SecretManager, file: &Path, out: &mut impl Write) -> CommandResult<()> {
    let path = validate_path(file)?;
    let report = manager.import_file(&path)?;

    writeln!(out, "Imported {} secret(s) from {}", report.imported, file.display())?;
    for warning in &report.warnings {
        writeln!(out, "  skipped {}", warning)?;
    }
    Ok(())
}

pub fn export_template(
    manager: &SecretManager,
    output: Option<&Path>,
    out: &mut impl Write,
) -> CommandResult<()> {
    let target = validate_path(output.unwrap_or(Path::new(DEFAULT_TEMPLATE_FILE)))?;
    let count = manager.export_template(&target)?;
    writeln!(out, "Wrote template with {} name(s) to {}", count, target.display())?;
    Ok(())
}

/// Snapshot the store; defaults to `<store>.backup`
pub fn backup_store(
    manager: &SecretManager,
    output: Option<&Path>,
    out: &mut impl Write,
) -> CommandResult<()> {
    let target = match output {
        Some(path) => path.to_path_buf(),
        None => with_suffix(manager.store_path(), ".backup"),
    };
    let target = validate_path(&target)?;

    manager.backup(&target)?;
    writeln!(out, "Backed up {} to {}", manager.store_path().display(), target.display())?;
    Ok(())
}

pub fn restore_store(
    manager: &SecretManager,
    file: &Path,
    force: bool,
    out: &mut impl Write,
) -> CommandResult<()> {
    let source = validate_path(file)?;
    if !force
        && !confirm(&format!(
            "Replace every secret in {} with the contents of {}?",
            manager.store_path().display(),
            source.display()
        ))?
    {
        writeln!(out, "Aborted")?;
        return Ok(());
    }

    manager.restore(&source)?;
    let total = manager.stats()?.total;
    writeln!(out, "Restored {} secret(s) from {}", total, source.display())?;
    Ok(())
}

/// Import an existing `.env` (when present), write `<env>.template` next to
/// it and report what the host configuration still lacks.
pub fn init(
    manager: &SecretManager,
    env_file: Option<&Path>,
    out: &mut impl Write,
) -> CommandResult<()> {
    let env_file = env_file.unwrap_or(Path::new(DEFAULT_ENV_FILE));

    if env_file.is_file() {
        import_env(manager, env_file, out)?;
        let template = validate_path(&with_suffix(env_file, ".template"))?;
        let count = manager.export_template(&template)?;
        writeln!(out, "Wrote template with {} name(s) to {}", count, template.display())?;
    } else {
        writeln!(out, "No {} found, nothing imported", env_file.display())?;
    }

    let stats = manager.stats()?;
    writeln!(out, "Store {} holds {} secret(s)", stats.store_path.display(), stats.total)?;
    for (category, count) in &stats.by_category {
        writeln!(out, "  {:<10} {}", category.as_str(), count)?;
    }

    let problems = AppSettings::load(manager)?.validate();
    if !problems.is_empty() {
        writeln!(out, "Configuration incomplete:")?;
        for problem in &problems {
            writeln!(out, "  - {}", problem)?;
        }
    }
    Ok(())
}
