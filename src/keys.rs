//! KeyManager: the env store's age key pair.
//!
//! `env init` generates a pair and hands it back for display. Nothing is
//! written to disk here: the user decides where the private key lives (the
//! config file, a password manager, a CI secret).

use std::path::PathBuf;
use std::process::Command;

use age::secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::credentials::CredentialResolver;
use crate::crypto::AGE_INSTALL_HINT;
use crate::error::{AitkError, Result};

/// Config key holding the private key (decrypts).
pub const ENV_STORE_KEY: &str = "ENV_STORE_KEY";
/// Config key holding the public key (encrypts).
pub const ENV_STORE_PUBLIC_KEY: &str = "ENV_STORE_PUBLIC_KEY";
/// Config key naming the store repository.
pub const ENV_STORE_REPO: &str = "ENV_STORE_REPO";

/// The store's key pair. `Debug` redacts the private key.
#[derive(Debug, Clone)]
pub struct EnvStoreKeyPair {
    /// `age1...` recipient.
    pub public_key: String,
    /// `AGE-SECRET-KEY-...` identity.
    pub private_key: SecretString,
}

/// Produces new key pairs.
pub trait KeyGenerator {
    fn generate(&self) -> Result<EnvStoreKeyPair>;
}

/// In-process X25519 key generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeKeygen;

impl KeyGenerator for NativeKeygen {
    fn generate(&self) -> Result<EnvStoreKeyPair> {
        let identity = age::x25519::Identity::generate();
        Ok(EnvStoreKeyPair {
            public_key: identity.to_public().to_string(),
            private_key: identity.to_string(),
        })
    }
}

/// Key generation through the `age-keygen` binary.
#[derive(Debug, Clone)]
pub struct AgeKeygenCli {
    binary: PathBuf,
}

impl Default for AgeKeygenCli {
    fn default() -> Self {
        Self::new("age-keygen")
    }
}

impl AgeKeygenCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl KeyGenerator for AgeKeygenCli {
    fn generate(&self) -> Result<EnvStoreKeyPair> {
        debug!(binary = %self.binary.display(), "running age-keygen");
        let output = Command::new(&self.binary).output().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AitkError::key_generation(format!(
                "'{}' not found. {}",
                self.binary.display(),
                AGE_INSTALL_HINT
            )),
            _ => AitkError::key_generation(e.to_string()),
        })?;

        if !output.status.success() {
            return Err(AitkError::key_generation(format!(
                "'{}' exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| AitkError::key_generation("age-keygen output is not UTF-8"))?;
        parse_keygen_output(&stdout)
    }
}

/// Parse `age-keygen` output:
///
/// ```text
/// # created: 2026-01-01T00:00:00Z
/// # public key: age1...
/// AGE-SECRET-KEY-1...
/// ```
pub fn parse_keygen_output(output: &str) -> Result<EnvStoreKeyPair> {
    let mut public_key = None;
    let mut private_key = None;

    for line in output.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("# public key:") {
            public_key = Some(rest.trim().to_string());
        } else if line.starts_with("AGE-SECRET-KEY-") {
            private_key = Some(SecretString::from(line.to_string()));
        }
    }

    match (public_key, private_key) {
        (Some(public_key), Some(private_key)) => Ok(EnvStoreKeyPair {
            public_key,
            private_key,
        }),
        _ => Err(AitkError::key_generation(
            "could not find both keys in age-keygen output",
        )),
    }
}

/// Derive the public key of an identity.
pub fn public_key_for(private_key: &SecretString) -> Result<String> {
    let identity = crate::crypto::parse_identity(private_key)?;
    Ok(identity.to_public().to_string())
}

/// Creates the env store key pair.
pub struct KeyManager<'a> {
    resolver: &'a CredentialResolver,
    generator: Box<dyn KeyGenerator>,
}

impl<'a> KeyManager<'a> {
    pub fn new(resolver: &'a CredentialResolver, generator: Box<dyn KeyGenerator>) -> Self {
        Self {
            resolver,
            generator,
        }
    }

    /// Generate a new pair. Refuses when a key is already configured unless
    /// `force` is set, so an existing store key is not replaced by accident.
    pub fn init(&self, force: bool) -> Result<EnvStoreKeyPair> {
        if !force && let Some(existing) = self.resolver.lookup(ENV_STORE_KEY) {
            return Err(AitkError::validation(format!(
                "{} already configured in {}. Refusing to overwrite (use --force to generate a new pair anyway).",
                ENV_STORE_KEY, existing.source
            )));
        }
        self.generator.generate()
    }
}

/// The config lines a user adds after `env init`.
pub fn config_lines(pair: &EnvStoreKeyPair) -> [String; 2] {
    [
        format!("{}={}", ENV_STORE_KEY, pair.private_key.expose_secret()),
        format!("{}={}", ENV_STORE_PUBLIC_KEY, pair.public_key),
    ]
}
