//! Config command handlers - managing stored credentials.

use std::io::{self, Write};

use crate::credentials::{CREDENTIAL_HELP, CredentialResolver};
use crate::error::{AitkError, Result};
use crate::utils::mask_value;

/// Handle interactive setup (`aitk config`).
///
/// Prompts for every known API key with hidden input. Blank input keeps the
/// current value; entries not prompted for are preserved.
pub fn handle_interactive_setup(resolver: &CredentialResolver) -> Result<()> {
    let config = resolver.config();
    let mut entries = config.load()?;

    println!("aitk credential setup");
    println!("=====================");
    println!("Config: {}", config.path().display());
    println!("Press Enter to keep the current value.\n");

    let mut changed = 0usize;
    for (name, url) in CREDENTIAL_HELP {
        let status = match resolver.lookup(name) {
            Some(cred) => format!(" [configured: {}]", cred.source),
            None => String::new(),
        };
        println!("{}{}", name, status);
        println!("  Get key: {}", url);

        let value = prompt_secret(&format!("  {}", name))?;
        if value.is_empty() {
            continue;
        }
        match entries.iter_mut().find(|(k, _)| k.as_str() == *name) {
            Some(entry) => entry.1 = value,
            None => entries.push((name.to_string(), value)),
        }
        changed += 1;
    }

    println!();
    if changed == 0 {
        println!("No changes.");
        return Ok(());
    }
    config.write_all(entries)?;
    println!("Saved {} key(s) to {}", changed, config.path().display());
    Ok(())
}

/// Read a value with hidden input.
fn prompt_secret(message: &str) -> Result<String> {
    eprint!("{}: ", message);
    io::stderr().flush()?;
    Ok(rpassword::read_password()?.trim().to_string())
}

/// Handle `aitk config get <KEY>`.
pub fn handle_config_get(resolver: &CredentialResolver, key: &str, reveal: bool) -> Result<()> {
    let cred = resolver
        .lookup(key)
        .ok_or_else(|| AitkError::not_found(format!("{} is not set", key)))?;
    let shown = if reveal {
        cred.value.clone()
    } else {
        mask_value(&cred.value)
    };
    println!("{}", shown);
    eprintln!("(from {})", cred.source);
    Ok(())
}

/// Handle `aitk config set <KEY> <VALUE>`.
pub fn handle_config_set(resolver: &CredentialResolver, key: &str, value: &str) -> Result<()> {
    let config = resolver.config();
    config.set(key, value)?;
    println!("Set {} in {}", key, config.path().display());
    Ok(())
}

/// Handle `aitk config unset <KEY>`.
pub fn handle_config_unset(resolver: &CredentialResolver, key: &str) -> Result<()> {
    let config = resolver.config();
    if config.unset(key)? {
        println!("Removed {} from {}", key, config.path().display());
        Ok(())
    } else {
        Err(AitkError::not_found(format!(
            "{} is not in {}",
            key,
            config.path().display()
        )))
    }
}

/// Handle `aitk config list`.
pub fn handle_config_list(resolver: &CredentialResolver) -> Result<()> {
    let config = resolver.config();
    let entries = config.load()?;
    if entries.is_empty() {
        eprintln!(
            "No entries in {}. Run 'aitk config' to set up credentials.",
            config.path().display()
        );
        return Ok(());
    }
    for (key, value) in entries {
        println!("{}={}", key, mask_value(&value));
    }
    Ok(())
}

/// Handle `aitk config path`.
pub fn handle_config_path(resolver: &CredentialResolver) -> Result<()> {
    println!("{}", resolver.config().path().display());
    Ok(())
}
