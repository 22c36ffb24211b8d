//! aitk - credential resolution and an encrypted `.env` store for AI tools.
//!
//! This crate provides:
//! - A layered credential chain: process environment, the aitk config file,
//!   then the nearest project `.env`
//! - An age key pair for the env store
//! - push/pull/diff/list of age-encrypted `.env` files kept in a git repository
//!
//! # Example
//!
//! ```no_run
//! use aitk::CredentialResolver;
//!
//! fn main() -> aitk::Result<()> {
//!     let resolver = CredentialResolver::for_project(std::env::current_dir()?);
//!     let creds = resolver.require_all(&["OPENAI_API_KEY"])?;
//!     println!("using {} from {}", creds[0].name, creds[0].source);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod store;
pub mod utils;

// Re-export commonly used types at the crate root
pub use config::ConfigStore;
pub use credentials::{Credential, CredentialResolver, CredentialSource, EnvSource};
pub use crypto::{CryptoBackend, EnvCipher};
pub use error::{AitkError, Result};
pub use keys::{EnvStoreKeyPair, KeyManager};
pub use store::{EnvStore, Mirror, ProjectRef, StoreRemote};
