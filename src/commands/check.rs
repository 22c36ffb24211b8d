//! `aitk check`: the credential gate tool commands run before any API call.

use crate::credentials::{CREDENTIAL_HELP, CredentialResolver};
use crate::error::Result;

/// Handle `aitk check [KEY...]`. With no keys, checks every known API key.
pub fn handle_check(resolver: &CredentialResolver, keys: &[String]) -> Result<()> {
    let names: Vec<String> = if keys.is_empty() {
        CREDENTIAL_HELP
            .iter()
            .map(|(name, _)| name.to_string())
            .collect()
    } else {
        keys.to_vec()
    };

    for cred in resolver.require_all(names.as_slice())? {
        println!("✓ {} ({})", cred.name, cred.source);
    }
    Ok(())
}
