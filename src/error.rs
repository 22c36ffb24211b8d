//! Unified error type for aitk.
//!
//! All public APIs return `Result<T, AitkError>`. The variants follow the
//! failure categories a user can act on: a missing credential, an unreadable
//! config file, a key or crypto failure, and the two ways the remote store can
//! refuse an operation (conflict vs. unavailable).

use std::fmt;
use std::path::PathBuf;

/// A credential that could not be resolved from any source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingCredential {
    /// Credential name, e.g. `OPENAI_API_KEY`.
    pub name: String,
    /// Where the user can obtain the credential, when known.
    pub help_url: Option<&'static str>,
    /// Command that supplies it; `aitk config` when unset.
    pub remedy: Option<&'static str>,
}

const DEFAULT_REMEDY: &str = "aitk config";

/// The unified error type for all aitk operations.
#[derive(Debug)]
pub enum AitkError {
    // ── I/O & serialization ────────────────────────────────────────────
    /// Filesystem or I/O operation failed.
    Io(std::io::Error),

    /// JSON serialization error.
    Json(serde_json::Error),

    // ── Credentials & config ───────────────────────────────────────────
    /// One or more required credentials are not set anywhere in the chain.
    MissingCredentials(Vec<MissingCredential>),

    /// The config file exists but could not be read or decoded.
    ConfigRead { path: PathBuf, message: String },

    // ── Keys & encryption ──────────────────────────────────────────────
    /// The key pair could not be generated.
    KeyGeneration(String),

    /// Encryption failed (bad recipient, missing tool).
    Encryption(String),

    /// Decryption failed: wrong key or corrupt ciphertext.
    Decryption(String),

    // ── Remote store ───────────────────────────────────────────────────
    /// The remote advanced since the mirror was fetched.
    StoreConflict(String),

    /// The remote could not be reached (network, auth, missing git).
    StoreUnavailable(String),

    /// A local git command against the mirror failed.
    Git(String),

    // ── Lookup & input ─────────────────────────────────────────────────
    /// A requested project, file or entry was not found.
    NotFound(String),

    /// User input validation failed.
    Validation(String),

    // ── Catch-all ──────────────────────────────────────────────────────
    /// Any other error.
    Other(String),
}

// ── Display ────────────────────────────────────────────────────────────

impl fmt::Display for AitkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AitkError::Io(e) => write!(f, "{}", e),
            AitkError::Json(e) => write!(f, "JSON error: {}", e),
            AitkError::MissingCredentials(missing) => {
                for (i, cred) in missing.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "Missing: {}", cred.name)?;
                    if let Some(url) = cred.help_url {
                        write!(f, "\n  Get key: {}", url)?;
                    }
                }
                let mut remedies: Vec<&str> = Vec::new();
                for cred in missing {
                    let remedy = cred.remedy.unwrap_or(DEFAULT_REMEDY);
                    if !remedies.contains(&remedy) {
                        remedies.push(remedy);
                    }
                }
                for remedy in remedies {
                    write!(f, "\nRun: {}", remedy)?;
                }
                Ok(())
            }
            AitkError::ConfigRead { path, message } => {
                write!(f, "cannot read config {}: {}", path.display(), message)
            }
            AitkError::KeyGeneration(msg) => write!(f, "key generation failed: {}", msg),
            AitkError::Encryption(msg) => write!(f, "encryption failed: {}", msg),
            AitkError::Decryption(msg) => write!(f, "decryption failed: {}", msg),
            AitkError::StoreConflict(msg) => write!(
                f,
                "env store rejected the update: {}\nThe remote has changed. Run 'aitk env pull' or 'aitk env diff' and retry.",
                msg
            ),
            AitkError::StoreUnavailable(msg) => write!(f, "env store unavailable: {}", msg),
            AitkError::Git(msg) => write!(f, "git error: {}", msg),
            AitkError::NotFound(msg) => write!(f, "{}", msg),
            AitkError::Validation(msg) => write!(f, "{}", msg),
            AitkError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AitkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AitkError::Io(e) => Some(e),
            AitkError::Json(e) => Some(e),
            _ => None,
        }
    }
}

// ── From implementations for common error types ────────────────────────

impl From<std::io::Error> for AitkError {
    fn from(e: std::io::Error) -> Self {
        AitkError::Io(e)
    }
}

impl From<serde_json::Error> for AitkError {
    fn from(e: serde_json::Error) -> Self {
        AitkError::Json(e)
    }
}

impl From<String> for AitkError {
    fn from(s: String) -> Self {
        AitkError::Other(s)
    }
}

impl From<&str> for AitkError {
    fn from(s: &str) -> Self {
        AitkError::Other(s.to_string())
    }
}

// ── Convenience constructors ───────────────────────────────────────────

impl AitkError {
    /// Create a config read error for `path`.
    pub fn config_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        AitkError::ConfigRead {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a key generation error.
    pub fn key_generation(message: impl Into<String>) -> Self {
        AitkError::KeyGeneration(message.into())
    }

    /// Create an encryption error.
    pub fn encryption(message: impl Into<String>) -> Self {
        AitkError::Encryption(message.into())
    }

    /// Create a decryption error.
    pub fn decryption(message: impl Into<String>) -> Self {
        AitkError::Decryption(message.into())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        AitkError::NotFound(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        AitkError::Validation(message.into())
    }

    /// Create a store-unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        AitkError::StoreUnavailable(message.into())
    }

    /// Whether this is a decryption failure (wrong key or corrupt blob), as
    /// opposed to a missing file or an I/O problem.
    pub fn is_decryption(&self) -> bool {
        matches!(self, AitkError::Decryption(_))
    }

    /// Process exit code for this error. Only `main` should call this.
    pub fn exit_code(&self) -> u8 {
        match self {
            AitkError::MissingCredentials(_) => 2,
            AitkError::StoreConflict(_) => 3,
            AitkError::StoreUnavailable(_) => 4,
            AitkError::Decryption(_) => 5,
            _ => 1,
        }
    }
}

/// Convenience type alias for Results using AitkError.
pub type Result<T> = std::result::Result<T, AitkError>;
