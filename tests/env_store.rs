//! Integration tests for the encrypted env store.
//!
//! A local bare repository stands in for the remote; each "machine" gets its
//! own mirror directory. Requires the `git` binary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use age::secrecy::SecretString;
use tempfile::TempDir;

use aitk::config::ConfigStore;
use aitk::credentials::{CredentialResolver, EnvSource};
use aitk::crypto::CryptoBackend;
use aitk::error::AitkError;
use aitk::keys::{KeyGenerator, NativeKeygen};
use aitk::store::{EnvStore, FilePresence, KeyChange, Mirror, ProjectRef};

struct Fixture {
    tmp: TempDir,
    remote: String,
    public_key: String,
    private_key: SecretString,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let remote = tmp.path().join("store.git");
        let status = Command::new("git")
            .args(["init", "--quiet", "--bare"])
            .arg(&remote)
            .status()
            .unwrap();
        assert!(status.success());

        let pair = NativeKeygen.generate().unwrap();
        Self {
            remote: remote.to_string_lossy().to_string(),
            public_key: pair.public_key,
            private_key: pair.private_key,
            tmp,
        }
    }

    fn mirror(&self, machine: &str) -> Mirror {
        Mirror::open(&self.remote, self.tmp.path().join(machine).join("mirror"), "main")
    }

    fn store(&self, machine: &str) -> EnvStore {
        EnvStore::new(
            self.mirror(machine),
            CryptoBackend::Native.cipher(),
            Some(self.public_key.clone()),
            Some(self.private_key.clone()),
        )
    }

    fn store_with_key(&self, machine: &str, private_key: SecretString) -> EnvStore {
        EnvStore::new(
            self.mirror(machine),
            CryptoBackend::Native.cipher(),
            None,
            Some(private_key),
        )
    }

    fn project_dir(&self, machine: &str) -> PathBuf {
        let dir = self.tmp.path().join(machine).join("project");
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}

fn project(s: &str) -> ProjectRef {
    s.parse().unwrap()
}

const ENV: &str = "# api\nOPENAI_API_KEY=sk-live-123\nexport DB_URL=\"postgres://u:p@h/db\"\n\nEMPTY=\n";
const ENV_LOCAL: &str = "DEBUG=1\nNAME='café ☕'\n";

#[test]
fn test_push_then_pull_is_byte_identical() {
    let fx = Fixture::new();
    let dir = fx.project_dir("laptop");
    std::fs::write(dir.join(".env"), ENV).unwrap();
    std::fs::write(dir.join(".env.local"), ENV_LOCAL).unwrap();
    std::fs::write(dir.join(".env.example"), "OPENAI_API_KEY=\n").unwrap();

    let store = fx.store("laptop");
    let pushed = store.push(&project("acme/api"), &dir).unwrap();
    assert_eq!(pushed.pushed, vec![".env", ".env.local"]);
    assert!(pushed.committed);

    // Same machine, no intervening change.
    let pulled = store.pull(&project("acme/api"), &dir).unwrap();
    assert!(pulled.failed.is_empty());
    assert_eq!(std::fs::read_to_string(dir.join(".env")).unwrap(), ENV);
    assert_eq!(std::fs::read_to_string(dir.join(".env.local")).unwrap(), ENV_LOCAL);

    // Another machine with its own mirror.
    let other = fx.project_dir("desktop");
    let pulled = fx.store("desktop").pull(&project("acme/api"), &other).unwrap();
    assert_eq!(pulled.written, vec![".env", ".env.local"]);
    assert_eq!(std::fs::read(other.join(".env")).unwrap(), ENV.as_bytes());
    assert!(!other.join(".env.example").exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(other.join(".env")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_store_holds_only_ciphertext() {
    let fx = Fixture::new();
    let dir = fx.project_dir("laptop");
    std::fs::write(dir.join(".env"), ENV).unwrap();
    fx.store("laptop").push(&project("acme/api"), &dir).unwrap();

    let mirror = fx.mirror("inspect");
    mirror.sync().unwrap();
    let blob = mirror
        .read_blob(Path::new("acme/api/.env.age"))
        .unwrap()
        .unwrap();
    assert!(blob.starts_with(b"age-encryption.org/v1"));
    let text = String::from_utf8_lossy(&blob);
    assert!(!text.contains("sk-live-123"));
    assert!(!text.contains("OPENAI_API_KEY"));
}

#[test]
fn test_repeat_push_publishes_fresh_ciphertext() {
    let fx = Fixture::new();
    let dir = fx.project_dir("laptop");
    std::fs::write(dir.join(".env"), ENV).unwrap();
    let store = fx.store("laptop");

    assert!(store.push(&project("acme/api"), &dir).unwrap().committed);
    // Fresh ciphertext differs every time, so an unchanged file still commits.
    assert!(store.push(&project("acme/api"), &dir).unwrap().committed);
}

#[test]
fn test_diff_reports_changed_key_without_values() {
    let fx = Fixture::new();
    let dir = fx.project_dir("laptop");
    std::fs::write(dir.join(".env"), "TOKEN=old-secret-value\nKEEP=same\nGONE=x\n").unwrap();
    let store = fx.store("laptop");
    store.push(&project("acme/api"), &dir).unwrap();

    std::fs::write(dir.join(".env"), "TOKEN=new-secret-value\nKEEP=same\nFRESH=y\n").unwrap();
    let report = store.diff(&project("acme/api"), &dir).unwrap();

    assert_eq!(report.files.len(), 1);
    let file = &report.files[0];
    assert_eq!(file.presence, FilePresence::Both);
    let change = |key: &str| file.keys.iter().find(|k| k.key == key).unwrap().change;
    assert_eq!(change("TOKEN"), KeyChange::Changed);
    assert_eq!(change("KEEP"), KeyChange::Unchanged);
    assert_eq!(change("FRESH"), KeyChange::Added);
    assert_eq!(change("GONE"), KeyChange::Removed);

    let json = serde_json::to_string(&report).unwrap();
    assert!(!json.contains("old-secret-value"));
    assert!(!json.contains("new-secret-value"));
    assert!(format!("{:?}", report).find("secret-value").is_none());
}

#[test]
fn test_diff_marks_one_sided_files() {
    let fx = Fixture::new();
    let dir = fx.project_dir("laptop");
    std::fs::write(dir.join(".env"), "A=1\n").unwrap();
    let store = fx.store("laptop");
    store.push(&project("acme/api"), &dir).unwrap();

    std::fs::remove_file(dir.join(".env")).unwrap();
    std::fs::write(dir.join(".env.test"), "B=2\n").unwrap();
    let report = store.diff(&project("acme/api"), &dir).unwrap();

    let presence: HashMap<&str, FilePresence> = report
        .files
        .iter()
        .map(|f| (f.file.as_str(), f.presence))
        .collect();
    assert_eq!(presence[".env"], FilePresence::StoreOnly);
    assert_eq!(presence[".env.test"], FilePresence::LocalOnly);
    assert!(report.has_changes());
}

#[test]
fn test_push_rejected_when_remote_advanced() {
    let fx = Fixture::new();
    let project_ref = project("acme/api");

    let laptop_dir = fx.project_dir("laptop");
    std::fs::write(laptop_dir.join(".env"), "VERSION=1\n").unwrap();
    fx.store("laptop").push(&project_ref, &laptop_dir).unwrap();

    // The desktop fetches, then the laptop publishes a second version.
    let desktop = fx.mirror("desktop");
    desktop.sync().unwrap();

    std::fs::write(laptop_dir.join(".env"), "VERSION=2\n").unwrap();
    fx.store("laptop").push(&project_ref, &laptop_dir).unwrap();

    // The desktop's stale commit must be refused.
    desktop
        .write_blob(Path::new("acme/api/.env.age"), b"stale ciphertext")
        .unwrap();
    let err = desktop
        .commit_and_publish(Path::new("acme/api"), "stale update")
        .unwrap_err();
    assert!(matches!(err, AitkError::StoreConflict(_)), "{err}");
    assert_eq!(err.exit_code(), 3);

    // The remote still holds version 2.
    let check_dir = fx.project_dir("check");
    fx.store("check").pull(&project_ref, &check_dir).unwrap();
    assert_eq!(
        std::fs::read_to_string(check_dir.join(".env")).unwrap(),
        "VERSION=2\n"
    );
}

#[test]
fn test_store_push_conflict_then_pull_restores_remote() {
    let fx = Fixture::new();
    let project_ref = project("acme/api");

    let laptop_dir = fx.project_dir("laptop");
    std::fs::write(laptop_dir.join(".env"), "VERSION=1\n").unwrap();
    fx.store("laptop").push(&project_ref, &laptop_dir).unwrap();

    // The desktop syncs and stages its copy, then the laptop publishes first.
    let desktop_dir = fx.project_dir("desktop");
    std::fs::write(desktop_dir.join(".env"), "VERSION=desktop\n").unwrap();
    let desktop = fx.store("desktop");
    let staged = desktop.stage(&project_ref, &desktop_dir).unwrap();
    assert_eq!(staged.files(), [".env"]);

    std::fs::write(laptop_dir.join(".env"), "VERSION=2\n").unwrap();
    assert!(fx.store("laptop").push(&project_ref, &laptop_dir).unwrap().committed);

    let err = desktop.publish(staged).unwrap_err();
    assert!(matches!(err, AitkError::StoreConflict(_)), "{err}");
    assert_eq!(err.exit_code(), 3);

    // The rejected commit is dropped on the next operation.
    let pulled = desktop.pull(&project_ref, &desktop_dir).unwrap();
    assert_eq!(pulled.written, vec![".env"]);
    assert_eq!(
        std::fs::read_to_string(desktop_dir.join(".env")).unwrap(),
        "VERSION=2\n"
    );

    // And a retry from the desktop now goes through.
    std::fs::write(desktop_dir.join(".env"), "VERSION=3\n").unwrap();
    assert!(desktop.push(&project_ref, &desktop_dir).unwrap().committed);
    let check_dir = fx.project_dir("check");
    fx.store("check").pull(&project_ref, &check_dir).unwrap();
    assert_eq!(
        std::fs::read_to_string(check_dir.join(".env")).unwrap(),
        "VERSION=3\n"
    );
}

#[test]
fn test_pushes_sharing_a_mirror_are_serialized() {
    let fx = Fixture::new();
    let project_ref = project("acme/api");
    let dir_a = fx.project_dir("a");
    let dir_b = fx.project_dir("b");
    std::fs::write(dir_a.join(".env"), "FROM=a\n").unwrap();
    std::fs::write(dir_b.join(".env.local"), "FROM=b\n").unwrap();

    // Both invocations use the same mirror directory.
    let first = fx.store("shared");
    let staged = first.stage(&project_ref, &dir_a).unwrap();
    assert!(fx.store("shared").mirror().try_lock().unwrap().is_none());

    let second = fx.store("shared");
    let waiter = std::thread::spawn(move || second.push(&project_ref, &dir_b).map(|r| r.committed));
    std::thread::sleep(std::time::Duration::from_millis(200));
    assert!(first.publish(staged).unwrap().committed);
    assert!(waiter.join().unwrap().unwrap());

    let check_dir = fx.project_dir("check");
    let pulled = fx.store("check").pull(&project("acme/api"), &check_dir).unwrap();
    assert_eq!(pulled.written, vec![".env", ".env.local"]);
}

#[test]
fn test_pull_with_wrong_key_reports_failure_per_file() {
    let fx = Fixture::new();
    let dir = fx.project_dir("laptop");
    std::fs::write(dir.join(".env"), "A=1\n").unwrap();
    std::fs::write(dir.join(".env.local"), "B=2\n").unwrap();
    fx.store("laptop").push(&project("acme/api"), &dir).unwrap();

    let intruder_dir = fx.project_dir("intruder");
    std::fs::write(intruder_dir.join(".env"), "LOCAL=kept\n").unwrap();
    let wrong_key = NativeKeygen.generate().unwrap().private_key;
    let report = fx
        .store_with_key("intruder", wrong_key)
        .pull(&project("acme/api"), &intruder_dir)
        .unwrap();

    assert!(report.written.is_empty());
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.iter().all(|f| f.decryption));
    assert_eq!(
        std::fs::read_to_string(intruder_dir.join(".env")).unwrap(),
        "LOCAL=kept\n"
    );
}

#[test]
fn test_pull_unknown_project_is_not_found() {
    let fx = Fixture::new();
    let dir = fx.project_dir("laptop");
    let err = fx.store("laptop").pull(&project("acme/none"), &dir).unwrap_err();
    assert!(matches!(err, AitkError::NotFound(_)));
    assert!(err.to_string().contains("aitk env push acme/none"));
}

#[test]
fn test_push_without_content_touches_nothing() {
    let fx = Fixture::new();
    let dir = fx.project_dir("laptop");
    let store = fx.store("laptop");

    assert!(matches!(
        store.push(&project("acme/api"), &dir),
        Err(AitkError::NotFound(_))
    ));

    std::fs::write(dir.join(".env"), "# nothing yet\n\n").unwrap();
    assert!(matches!(
        store.push(&project("acme/api"), &dir),
        Err(AitkError::Validation(_))
    ));
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_list_projects_and_files() {
    let fx = Fixture::new();
    let store = fx.store("laptop");

    let api = fx.project_dir("api");
    std::fs::write(api.join(".env"), "A=1\n").unwrap();
    std::fs::write(api.join(".env.production"), "B=2\n").unwrap();
    store.push(&project("acme/api"), &api).unwrap();

    let web = fx.project_dir("web");
    std::fs::write(web.join(".env"), "C=3\n").unwrap();
    store.push(&project("acme/web"), &web).unwrap();
    store.push(&project("zeta/tool"), &web).unwrap();

    let projects: Vec<String> = fx
        .store("desktop")
        .list()
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(projects, vec!["acme/api", "acme/web", "zeta/tool"]);

    let files = store.list_files(&project("acme/api")).unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.file.as_str()).collect();
    assert_eq!(names, vec![".env", ".env.production"]);
    assert!(files.iter().all(|f| f.updated.is_some()));

    assert!(store.list_files(&project("acme/none")).unwrap().is_empty());
}

#[test]
fn test_store_settings_come_from_the_credential_chain() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ConfigStore::new(tmp.path().join("config"));

    let resolver = CredentialResolver::new(
        EnvSource::Fixed(HashMap::new()),
        config.clone(),
        tmp.path(),
    );
    let err = EnvStore::from_resolver(&resolver).err().unwrap();
    assert!(matches!(err, AitkError::MissingCredentials(_)));

    config.write_all([("ENV_STORE_REPO", "me/secrets")]).unwrap();
    let resolver = CredentialResolver::new(
        EnvSource::Fixed(HashMap::from([(
            "ENV_STORE_BACKEND".to_string(),
            "enigma".to_string(),
        )])),
        config,
        tmp.path(),
    );
    assert!(matches!(
        EnvStore::from_resolver(&resolver).err().unwrap(),
        AitkError::Validation(_)
    ));
}

#[test]
fn test_pull_requires_private_key() {
    let fx = Fixture::new();
    let dir = fx.project_dir("laptop");
    let store = EnvStore::new(
        fx.mirror("laptop"),
        CryptoBackend::Native.cipher(),
        Some(fx.public_key.clone()),
        None,
    );
    let err = store.pull(&project("acme/api"), &dir).unwrap_err();
    assert!(matches!(err, AitkError::MissingCredentials(_)));
}
