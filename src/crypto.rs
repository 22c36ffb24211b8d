//! EnvCrypto: age encryption of `.env` contents.
//!
//! Two interchangeable backends produce the same age v1 format:
//!
//! - [`NativeAge`] uses the `age` crate in-process (default),
//! - [`AgeCli`] shells out to the `age` binary.
//!
//! Plaintext and key material never appear in errors or logs. Decryption
//! failures are always [`AitkError::Decryption`] so the store can tell a
//! wrong key or corrupt blob apart from a missing file.

use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;

use age::secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AitkError, Result};
use crate::keys::{AgeKeygenCli, KeyGenerator, NativeKeygen};
use crate::utils::write_private_file_atomic;

/// Install hint shown whenever an age binary is missing.
pub const AGE_INSTALL_HINT: &str =
    "Install age (https://age-encryption.org), e.g. 'brew install age' or 'apt install age'";

/// Encrypt-to-recipient / decrypt-with-identity over byte buffers.
pub trait EnvCipher: Send + Sync {
    /// Encrypt `plaintext` so only the holder of the identity matching
    /// `recipient` (an `age1...` public key) can read it.
    fn encrypt(&self, plaintext: &[u8], recipient: &str) -> Result<Vec<u8>>;

    /// Decrypt `ciphertext` with `identity` (an `AGE-SECRET-KEY-...` key).
    fn decrypt(&self, ciphertext: &[u8], identity: &SecretString) -> Result<Vec<u8>>;
}

/// Which implementation performs key generation and encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CryptoBackend {
    #[default]
    Native,
    AgeCli,
}

impl FromStr for CryptoBackend {
    type Err = AitkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "" => Ok(CryptoBackend::Native),
            "age-cli" | "cli" | "age" => Ok(CryptoBackend::AgeCli),
            other => Err(AitkError::validation(format!(
                "Unknown ENV_STORE_BACKEND '{}'. Valid values: native, age-cli",
                other
            ))),
        }
    }
}

impl fmt::Display for CryptoBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoBackend::Native => f.write_str("native (built-in age)"),
            CryptoBackend::AgeCli => f.write_str("age-cli (age and age-keygen binaries)"),
        }
    }
}

impl CryptoBackend {
    pub fn cipher(self) -> Box<dyn EnvCipher> {
        match self {
            CryptoBackend::Native => Box::new(NativeAge),
            CryptoBackend::AgeCli => Box::new(AgeCli::default()),
        }
    }

    pub fn key_generator(self) -> Box<dyn KeyGenerator> {
        match self {
            CryptoBackend::Native => Box::new(NativeKeygen),
            CryptoBackend::AgeCli => Box::new(AgeKeygenCli::default()),
        }
    }
}

// =============================================================================
// Native backend
// =============================================================================

/// In-process age encryption (X25519 recipients).
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeAge;

impl EnvCipher for NativeAge {
    fn encrypt(&self, plaintext: &[u8], recipient: &str) -> Result<Vec<u8>> {
        let recipient = parse_recipient(recipient)?;
        let encryptor =
            age::Encryptor::with_recipients(std::iter::once(&recipient as &dyn age::Recipient))
                .map_err(|e| AitkError::encryption(e.to_string()))?;

        let mut encrypted = Vec::new();
        let mut writer = encryptor.wrap_output(&mut encrypted)?;
        writer.write_all(plaintext)?;
        writer.finish()?;

        Ok(encrypted)
    }

    fn decrypt(&self, ciphertext: &[u8], identity: &SecretString) -> Result<Vec<u8>> {
        let identity = parse_identity(identity)?;
        let decryptor = age::Decryptor::new(ciphertext)
            .map_err(|e| AitkError::decryption(format!("invalid ciphertext: {}", e)))?;

        let mut reader = decryptor
            .decrypt(std::iter::once(&identity as &dyn age::Identity))
            .map_err(|e| AitkError::decryption(e.to_string()))?;

        let mut decrypted = Vec::new();
        reader
            .read_to_end(&mut decrypted)
            .map_err(|e| AitkError::decryption(format!("corrupt ciphertext: {}", e)))?;

        Ok(decrypted)
    }
}

fn parse_recipient(recipient: &str) -> Result<age::x25519::Recipient> {
    recipient
        .trim()
        .parse::<age::x25519::Recipient>()
        .map_err(|e| AitkError::encryption(format!("invalid public key: {}", e)))
}

/// Parse an identity, accepting identity-file content (comment lines are
/// skipped, the first key line is used).
pub(crate) fn parse_identity(identity: &SecretString) -> Result<age::x25519::Identity> {
    let key_line = identity
        .expose_secret()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .ok_or_else(|| AitkError::decryption("ENV_STORE_KEY has no key material"))?;

    key_line
        .parse::<age::x25519::Identity>()
        .map_err(|_| AitkError::decryption("ENV_STORE_KEY is not a valid age secret key"))
}

// =============================================================================
// age binary backend
// =============================================================================

/// Encryption through the `age` command-line tool.
#[derive(Debug, Clone)]
pub struct AgeCli {
    binary: PathBuf,
}

impl Default for AgeCli {
    fn default() -> Self {
        Self::new("age")
    }
}

impl AgeCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run the binary with `args`, feeding `input` on stdin.
    fn run(&self, args: &[&str], input: &[u8]) -> std::io::Result<std::process::Output> {
        debug!(binary = %self.binary.display(), ?args, "running age");
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin from a thread so a full stdout pipe cannot deadlock us.
        let mut stdin = child.stdin.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "age stdin unavailable")
        })?;
        let input = input.to_vec();
        let feeder = std::thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output()?;
        match feeder.join() {
            Ok(Ok(())) => {}
            // age exits early on bad input and closes stdin; its stderr says why.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(std::io::Error::other("age stdin writer panicked"));
            }
        }
        Ok(output)
    }

    fn missing(&self) -> String {
        format!("'{}' not found. {}", self.binary.display(), AGE_INSTALL_HINT)
    }
}

impl EnvCipher for AgeCli {
    fn encrypt(&self, plaintext: &[u8], recipient: &str) -> Result<Vec<u8>> {
        let output = self
            .run(&["-r", recipient.trim()], plaintext)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AitkError::encryption(self.missing()),
                _ => AitkError::encryption(e.to_string()),
            })?;

        if !output.status.success() {
            return Err(AitkError::encryption(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output.stdout)
    }

    fn decrypt(&self, ciphertext: &[u8], identity: &SecretString) -> Result<Vec<u8>> {
        // age reads identities from a file; keep it private and short-lived.
        let key_file = TempKeyFile::write(identity)?;
        let key_path = key_file.path.to_string_lossy().to_string();

        let output = self
            .run(&["-d", "-i", &key_path], ciphertext)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AitkError::decryption(self.missing()),
                _ => AitkError::decryption(e.to_string()),
            })?;

        if !output.status.success() {
            return Err(AitkError::decryption(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output.stdout)
    }
}

/// Owner-only identity file removed on drop.
struct TempKeyFile {
    path: PathBuf,
}

impl TempKeyFile {
    fn write(identity: &SecretString) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("aitk-{}.key", Uuid::new_v4()));
        write_private_file_atomic(&path, identity.expose_secret().as_bytes())?;
        Ok(Self { path })
    }
}

impl Drop for TempKeyFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
