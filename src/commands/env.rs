//! Env store command handlers (`aitk env ...`).

use std::path::Path;

use age::secrecy::ExposeSecret;
use chrono_humanize::HumanTime;

use crate::credentials::CredentialResolver;
use crate::crypto::CryptoBackend;
use crate::error::{AitkError, Result};
use crate::keys::{ENV_STORE_KEY, ENV_STORE_PUBLIC_KEY, ENV_STORE_REPO, KeyManager};
use crate::store::{DiffReport, ENV_STORE_BACKEND, EnvStore, FilePresence, KeyChange, ProjectRef};

fn backend(resolver: &CredentialResolver) -> Result<CryptoBackend> {
    match resolver.resolve(ENV_STORE_BACKEND) {
        Some(value) => value.parse(),
        None => Ok(CryptoBackend::default()),
    }
}

/// Handle `aitk env init`.
pub fn handle_env_init(resolver: &CredentialResolver, force: bool) -> Result<()> {
    let backend = backend(resolver)?;
    let manager = KeyManager::new(resolver, backend.key_generator());
    let pair = manager.init(force)?;

    println!("Generated env store key pair ({}).", backend);
    println!();
    println!("Add to {}:", resolver.config().path().display());
    println!();
    println!("  {}={}", ENV_STORE_KEY, pair.private_key.expose_secret());
    println!("  {}={}", ENV_STORE_PUBLIC_KEY, pair.public_key);
    match resolver.resolve(ENV_STORE_REPO) {
        Some(repo) => println!("  {}={}", ENV_STORE_REPO, repo),
        None => println!("  {}=<owner>/<private-repo>", ENV_STORE_REPO),
    }
    println!();
    eprintln!("The private key is shown only once and has not been saved anywhere.");
    eprintln!("Anyone holding ENV_STORE_KEY can decrypt every file in the store.");
    Ok(())
}

/// Handle `aitk env push <owner/repo>`.
pub fn handle_env_push(resolver: &CredentialResolver, project: &str, root: &Path) -> Result<()> {
    let project: ProjectRef = project.parse()?;
    let store = EnvStore::from_resolver(resolver)?;
    let report = store.push(&project, root)?;

    for file in &report.skipped {
        eprintln!("Skipped {} (no KEY=VALUE entries)", file);
    }
    if report.committed {
        for file in &report.pushed {
            println!("✓ {} → {}", file, project);
        }
    } else {
        println!("Store already up to date for {}", project);
    }
    Ok(())
}

/// Handle `aitk env pull <owner/repo>`.
pub fn handle_env_pull(resolver: &CredentialResolver, project: &str, root: &Path) -> Result<()> {
    let project: ProjectRef = project.parse()?;
    let store = EnvStore::from_resolver(resolver)?;
    let report = store.pull(&project, root)?;

    for file in &report.written {
        println!("✓ {}", file);
    }
    for failure in &report.failed {
        eprintln!("✗ {}: {}", failure.file, failure.reason);
    }

    if report.failed.is_empty() {
        return Ok(());
    }
    let summary = format!(
        "{} of {} file(s) could not be restored",
        report.failed.len(),
        report.failed.len() + report.written.len()
    );
    if report.failed.iter().any(|f| f.decryption) {
        Err(AitkError::decryption(summary))
    } else {
        Err(AitkError::Other(summary))
    }
}

/// Handle `aitk env diff <owner/repo>`.
pub fn handle_env_diff(
    resolver: &CredentialResolver,
    project: &str,
    root: &Path,
    json: bool,
) -> Result<()> {
    let project: ProjectRef = project.parse()?;
    let store = EnvStore::from_resolver(resolver)?;
    let report = store.diff(&project, root)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_diff(&report);
    }

    let failed = report.failures().count();
    if failed == 0 {
        return Ok(());
    }
    let summary = format!("{} file(s) could not be compared", failed);
    if report.failures().any(|f| f.decryption) {
        Err(AitkError::decryption(summary))
    } else {
        Err(AitkError::Other(summary))
    }
}

fn print_diff(report: &DiffReport) {
    if report.files.is_empty() {
        println!("No .env files locally or in the store for {}", report.project);
        return;
    }
    if !report.has_changes() {
        println!("No differences for {}", report.project);
        return;
    }

    for file in &report.files {
        let presence = match file.presence {
            FilePresence::Both => "",
            FilePresence::LocalOnly => " (local only)",
            FilePresence::StoreOnly => " (store only)",
        };
        println!("{}{}", file.file, presence);

        if let Some(error) = &file.error {
            println!("  ! {}", error);
            continue;
        }
        for key in file.keys.iter().filter(|k| k.change != KeyChange::Unchanged) {
            println!("  {} {} ({})", key.change.symbol(), key.key, key.change);
        }
        let unchanged = file.count(KeyChange::Unchanged);
        if unchanged > 0 {
            println!("  {} unchanged", unchanged);
        }
    }
}

/// Handle `aitk env list [owner/repo]`.
pub fn handle_env_list(
    resolver: &CredentialResolver,
    project: Option<&str>,
    json: bool,
) -> Result<()> {
    let store = EnvStore::from_resolver(resolver)?;

    let Some(project) = project else {
        let projects = store.list()?;
        if json {
            let names: Vec<String> = projects.iter().map(ToString::to_string).collect();
            println!("{}", serde_json::to_string_pretty(&names)?);
        } else if projects.is_empty() {
            eprintln!("The env store is empty. Push a project with 'aitk env push <owner/repo>'.");
        } else {
            for project in projects {
                println!("{}", project);
            }
        }
        return Ok(());
    };

    let project: ProjectRef = project.parse()?;
    let files = store.list_files(&project)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
    } else if files.is_empty() {
        eprintln!("No .env files stored for {}", project);
    } else {
        for file in files {
            match file.updated {
                Some(when) => println!("{:<24} updated {}", file.file, HumanTime::from(when)),
                None => println!("{}", file.file),
            }
        }
    }
    Ok(())
}
