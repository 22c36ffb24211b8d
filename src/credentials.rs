//! Credential resolution chain.
//!
//! A credential is looked up in three places, first non-empty match wins:
//!
//! 1. the process environment,
//! 2. the ConfigStore file (`$XDG_CONFIG_HOME/aitk/config`),
//! 3. the nearest `.env` file found walking up from the project directory.
//!
//! Tool commands gate on [`CredentialResolver::require_all`] before they make
//! any outbound call, so an incomplete setup fails before any side effect.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{ConfigStore, dotenv};
use crate::error::{AitkError, MissingCredential, Result};
use crate::keys::{ENV_STORE_KEY, ENV_STORE_PUBLIC_KEY};

/// Maximum number of directories examined by the `.env` search, counting the
/// starting directory.
pub const MAX_DOTENV_SEARCH_DEPTH: usize = 10;

/// Name of the project-level env file.
pub const DOTENV_FILE: &str = ".env";

/// Where users can obtain each known credential.
pub const CREDENTIAL_HELP: &[(&str, &str)] = &[
    ("OPENAI_API_KEY", "https://platform.openai.com/api-keys"),
    ("PERPLEXITY_API_KEY", "https://perplexity.ai/settings/api"),
    ("FIRECRAWL_API_KEY", "https://firecrawl.dev/app/api-keys"),
    ("NOTION_API_KEY", "https://www.notion.so/my-integrations"),
    (
        "ELEVENLABS_API_KEY",
        "https://elevenlabs.io/app/settings/api-keys",
    ),
];

/// Look up the help URL for a credential name.
pub fn help_url(name: &str) -> Option<&'static str> {
    CREDENTIAL_HELP
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, url)| *url)
}

/// Command that supplies a credential aitk manages itself.
pub fn remedy(name: &str) -> Option<&'static str> {
    match name {
        ENV_STORE_KEY | ENV_STORE_PUBLIC_KEY => Some("aitk env init"),
        _ => None,
    }
}

/// Report entry for a credential no tier could supply.
pub(crate) fn missing_credential(name: &str) -> MissingCredential {
    MissingCredential {
        name: name.to_string(),
        help_url: help_url(name),
        remedy: remedy(name),
    }
}

/// Which tier of the chain produced a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    ConfigFile(PathBuf),
    ProjectDotEnv(PathBuf),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::ConfigFile(path) => write!(f, "config ({})", path.display()),
            CredentialSource::ProjectDotEnv(path) => write!(f, ".env ({})", path.display()),
        }
    }
}

/// A resolved credential. `Debug` never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub value: String,
    pub source: CredentialSource,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// The environment tier of the chain.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// The real process environment.
    #[default]
    Process,
    /// A fixed set of variables (tests, embedding).
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    /// Non-empty value of `name`.
    pub fn get(&self, name: &str) -> Option<String> {
        let value = match self {
            EnvSource::Process => std::env::var(name).ok(),
            EnvSource::Fixed(vars) => vars.get(name).cloned(),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// Resolves named credentials through the chain. Holds explicit handles to
/// every source; there is no process-wide state.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    env: EnvSource,
    config: ConfigStore,
    search_start: PathBuf,
}

impl CredentialResolver {
    /// Resolver over explicit sources.
    pub fn new(env: EnvSource, config: ConfigStore, search_start: impl Into<PathBuf>) -> Self {
        Self {
            env,
            config,
            search_start: search_start.into(),
        }
    }

    /// Resolver over the process environment, the standard config location,
    /// and `.env` files above `project_dir`.
    pub fn for_project(project_dir: impl Into<PathBuf>) -> Self {
        let env = EnvSource::Process;
        let config = ConfigStore::locate(env.get("XDG_CONFIG_HOME").as_deref());
        Self::new(env, config, project_dir)
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn env(&self) -> &EnvSource {
        &self.env
    }

    pub fn search_start(&self) -> &Path {
        &self.search_start
    }

    /// Value of `name`, or `None` when no tier defines it.
    pub fn resolve(&self, name: &str) -> Option<String> {
        self.lookup(name).map(|cred| cred.value)
    }

    /// Value of `name` together with the tier it came from.
    pub fn lookup(&self, name: &str) -> Option<Credential> {
        if let Some(value) = self.env.get(name) {
            return Some(credential(name, value, CredentialSource::Environment));
        }

        // An unreadable config file degrades to "absent" here; commands that
        // operate on the file directly surface the error.
        match self.config.read(name) {
            Ok(Some(value)) => {
                let source = CredentialSource::ConfigFile(self.config.path().to_path_buf());
                return Some(credential(name, value, source));
            }
            Ok(None) => {}
            Err(e) => warn!("ignoring config file: {}", e),
        }

        let dotenv_path = find_dotenv(&self.search_start)?;
        let content = match std::fs::read_to_string(&dotenv_path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %dotenv_path.display(), "cannot read .env: {}", e);
                return None;
            }
        };
        let value = dotenv::lookup(&content, name)?;
        Some(credential(
            name,
            value,
            CredentialSource::ProjectDotEnv(dotenv_path),
        ))
    }

    /// Resolve every name, or fail with all of the missing ones.
    ///
    /// Returns the credentials in the order requested.
    pub fn require_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Credential>> {
        let mut found = Vec::with_capacity(names.len());
        let mut missing = Vec::new();

        for name in names {
            let name = name.as_ref();
            match self.lookup(name) {
                Some(cred) => found.push(cred),
                None => missing.push(missing_credential(name)),
            }
        }

        if missing.is_empty() {
            Ok(found)
        } else {
            Err(AitkError::MissingCredentials(missing))
        }
    }
}

fn credential(name: &str, value: String, source: CredentialSource) -> Credential {
    debug!(credential = name, source = %source, "credential resolved");
    Credential {
        name: name.to_string(),
        value,
        source,
    }
}

/// Nearest `.env` at or above `start`, examining at most
/// [`MAX_DOTENV_SEARCH_DEPTH`] directories. A relative `start` is taken
/// from the current directory, so the walk continues past it.
pub fn find_dotenv(start: &Path) -> Option<PathBuf> {
    let start = std::path::absolute(start).ok()?;
    let mut current = Some(start.as_path());
    for _ in 0..MAX_DOTENV_SEARCH_DEPTH {
        let dir = current?;
        let candidate = dir.join(DOTENV_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(vars: &[(&str, &str)]) -> EnvSource {
        EnvSource::Fixed(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn environment_beats_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigStore::new(dir.path().join("config"));
        config.write_all([("OPENAI_API_KEY", "from-config")]).unwrap();

        let resolver = CredentialResolver::new(
            fixed(&[("OPENAI_API_KEY", "from-env")]),
            config,
            dir.path(),
        );
        let cred = resolver.lookup("OPENAI_API_KEY").unwrap();
        assert_eq!(cred.value, "from-env");
        assert_eq!(cred.source, CredentialSource::Environment);
    }

    #[test]
    fn empty_environment_value_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigStore::new(dir.path().join("config"));
        config.write_all([("TOKEN", "from-config")]).unwrap();

        let resolver = CredentialResolver::new(fixed(&[("TOKEN", "")]), config, dir.path());
        assert_eq!(resolver.resolve("TOKEN").as_deref(), Some("from-config"));
    }

    #[test]
    fn config_beats_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigStore::new(dir.path().join("cfg/config"));
        config.write_all([("TOKEN", "from-config")]).unwrap();
        std::fs::write(dir.path().join(".env"), "TOKEN=from-dotenv\n").unwrap();

        let resolver = CredentialResolver::new(fixed(&[]), config, dir.path());
        assert_eq!(resolver.resolve("TOKEN").as_deref(), Some("from-config"));
    }

    #[test]
    fn nearest_dotenv_decides_even_when_key_missing() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(dir.path().join(".env"), "TOKEN=outer\n").unwrap();
        std::fs::write(inner.join(".env"), "OTHER=1\n").unwrap();

        let config = ConfigStore::new(dir.path().join("none/config"));
        let resolver = CredentialResolver::new(fixed(&[]), config, &inner);
        assert_eq!(resolver.resolve("TOKEN"), None);
        assert_eq!(resolver.resolve("OTHER").as_deref(), Some("1"));
    }

    #[test]
    fn credential_debug_hides_value() {
        let cred = Credential {
            name: "K".to_string(),
            value: "super-secret".to_string(),
            source: CredentialSource::Environment,
        };
        assert!(!format!("{:?}", cred).contains("super-secret"));
    }

    #[test]
    fn help_urls_cover_tool_credentials() {
        assert!(help_url("OPENAI_API_KEY").is_some());
        assert!(help_url("NOTION_API_KEY").is_some());
        assert_eq!(help_url("ENV_STORE_KEY"), None);
    }

    #[test]
    fn missing_store_keys_suggest_env_init() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigStore::new(dir.path().join("none/config"));
        let resolver = CredentialResolver::new(fixed(&[]), config, dir.path());

        let msg = resolver
            .require_all(&["OPENAI_API_KEY", "ENV_STORE_KEY"])
            .unwrap_err()
            .to_string();
        assert!(msg.contains("Run: aitk config"));
        assert!(msg.contains("Run: aitk env init"));
        assert_eq!(remedy("ENV_STORE_PUBLIC_KEY"), Some("aitk env init"));
        assert_eq!(remedy("OPENAI_API_KEY"), None);
    }
}
