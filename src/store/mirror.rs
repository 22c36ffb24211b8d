//! Local git mirror of the env store repository.
//!
//! The mirror is a disposable cache: every operation that reads remote state
//! starts with [`Mirror::sync`], which fetches and hard-resets to the remote
//! branch. A mirror that is missing, points at another remote, or fails a
//! local git command is wiped and cloned again.
//!
//! Invocations sharing a mirror directory serialize on an advisory lock file
//! next to it; hold [`Mirror::lock`] across sync, edit and publish.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{AitkError, Result};
use crate::utils::{redact_text, redact_url, write_private_file_atomic};

/// Stall limits for HTTP transports: abort below 1 KiB/s for 60s.
const HTTP_LOW_SPEED_LIMIT: &str = "http.lowSpeedLimit=1024";
const HTTP_LOW_SPEED_TIME: &str = "http.lowSpeedTime=60";
const SSH_COMMAND: &str = "ssh -o BatchMode=yes -o ConnectTimeout=30";

/// stderr fragments git prints when a push is not a fast-forward.
const REJECTION_MARKERS: &[&str] = &["[rejected]", "fetch first", "non-fast-forward"];

/// A working clone of the store repository.
#[derive(Debug, Clone)]
pub struct Mirror {
    url: String,
    dir: PathBuf,
    branch: String,
}

impl Mirror {
    /// Handle on the mirror of `url` at `dir`. Nothing touches disk until
    /// [`sync`](Self::sync).
    pub fn open(url: impl Into<String>, dir: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dir: dir.into(),
            branch: branch.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.dir
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Lock file beside the mirror directory; it survives a re-clone.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .dir
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "mirror".into());
        name.push(".lock");
        self.dir.with_file_name(name)
    }

    /// Block until this process holds the mirror exclusively. The lock is
    /// released when the returned guard is dropped.
    pub fn lock(&self) -> Result<MirrorLock> {
        let file = self.open_lock_file()?;
        debug!(lock = %self.lock_path().display(), "waiting for env store mirror lock");
        file.lock_exclusive()?;
        Ok(MirrorLock { _file: file })
    }

    /// Like [`lock`](Self::lock), but `None` when another holder has it.
    pub fn try_lock(&self) -> Result<Option<MirrorLock>> {
        let file = self.open_lock_file()?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(MirrorLock { _file: file })),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn open_lock_file(&self) -> Result<File> {
        let path = self.lock_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?)
    }

    /// Bring the mirror to exactly the remote branch state.
    pub fn sync(&self) -> Result<()> {
        match self.try_sync() {
            Err(AitkError::Git(msg)) => {
                warn!("env store mirror is inconsistent, re-cloning: {}", msg);
                self.reclone()?;
                self.try_sync()
            }
            other => other,
        }
    }

    fn try_sync(&self) -> Result<()> {
        self.ensure_clone()?;

        debug!(remote = %redact_url(&self.url), branch = %self.branch, "fetching env store");
        self.remote_op(&["fetch", "--prune", "--quiet", "origin"])?;

        let remote_ref = format!("refs/remotes/origin/{}", self.branch);
        if self.ref_exists(&remote_ref)? {
            self.git_ok(&["checkout", "--quiet", "-f", "-B", &self.branch, &remote_ref])?;
            self.git_ok(&["reset", "--quiet", "--hard", &remote_ref])?;
        } else {
            // Store has no commits on this branch yet: start from an empty tree.
            let local_ref = format!("refs/heads/{}", self.branch);
            self.git_ok(&["symbolic-ref", "HEAD", &local_ref])?;
            if self.ref_exists(&local_ref)? {
                self.git_ok(&["update-ref", "-d", &local_ref])?;
            }
            self.git_ok(&["read-tree", "--empty"])?;
        }
        self.git_ok(&["clean", "-q", "-f", "-d", "-x"])?;
        Ok(())
    }

    fn ensure_clone(&self) -> Result<()> {
        if !self.dir.join(".git").is_dir() {
            return self.reclone();
        }
        match self.git_ok(&["config", "--get", "remote.origin.url"]) {
            Ok(origin) if origin.trim() == self.url => Ok(()),
            Ok(_) | Err(AitkError::Git(_)) => {
                debug!("mirror origin differs, re-cloning");
                self.reclone()
            }
            Err(e) => Err(e),
        }
    }

    fn reclone(&self) -> Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        if let Some(parent) = self.dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(remote = %redact_url(&self.url), dir = %self.dir.display(), "cloning env store");
        let dir = self.dir.to_string_lossy().to_string();
        let output = self.run(None, &["clone", "--quiet", "--no-checkout", &self.url, &dir])?;
        if !output.status.success() {
            return Err(AitkError::unavailable(format!(
                "cannot clone {}: {}",
                redact_url(&self.url),
                self.stderr_of(&output)
            )));
        }
        Ok(())
    }

    /// Contents of `rel` in the mirror, `None` when absent.
    pub fn read_blob(&self, rel: &Path) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.dir.join(rel)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace `rel` in the mirror's working tree.
    pub fn write_blob(&self, rel: &Path, bytes: &[u8]) -> Result<()> {
        write_private_file_atomic(&self.dir.join(rel), bytes)
    }

    /// Time of the last commit touching `rel`, if any.
    pub fn last_commit_time(&self, rel: &Path) -> Result<Option<DateTime<Utc>>> {
        if !self.ref_exists("HEAD")? {
            return Ok(None);
        }
        let rel = rel.to_string_lossy().to_string();
        let out = self.git_ok(&["log", "-1", "--format=%ct", "--", &rel])?;
        Ok(out
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)))
    }

    /// Stage everything under `scope`, commit, and push to the remote branch.
    ///
    /// Returns `false` when there was nothing to commit. A rejected push is
    /// [`AitkError::StoreConflict`]; the remote is left as it was.
    pub fn commit_and_publish(&self, scope: &Path, message: &str) -> Result<bool> {
        let scope = scope.to_string_lossy().to_string();
        self.git_ok(&["add", "-A", "--", &scope])?;

        let staged = self.git(&["diff", "--cached", "--quiet"])?;
        if staged.status.success() {
            debug!("nothing to commit");
            return Ok(false);
        }

        let user_name = format!("user.name={}", infer_user_name());
        let user_email = format!("user.email={}", infer_user_email());
        self.git_ok(&[
            "-c",
            &user_name,
            "-c",
            &user_email,
            "-c",
            "commit.gpgsign=false",
            "commit",
            "--quiet",
            "-m",
            message,
        ])?;

        let refspec = format!("HEAD:refs/heads/{}", self.branch);
        let output = self.git(&["push", "--porcelain", "origin", &refspec])?;
        if output.status.success() {
            debug!(branch = %self.branch, "published env store commit");
            return Ok(true);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = self.stderr_of(&output);
        if REJECTION_MARKERS
            .iter()
            .any(|m| stdout.contains(m) || stderr.contains(m))
        {
            return Err(AitkError::StoreConflict(format!(
                "{} moved since the last fetch",
                self.branch
            )));
        }
        Err(AitkError::unavailable(format!(
            "cannot push to {}: {}",
            redact_url(&self.url),
            stderr
        )))
    }

    fn ref_exists(&self, name: &str) -> Result<bool> {
        let output = self.git(&["rev-parse", "--verify", "--quiet", name])?;
        Ok(output.status.success())
    }

    /// Run a network operation; failure means the remote is unreachable.
    fn remote_op(&self, args: &[&str]) -> Result<()> {
        let output = self.git(args)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(AitkError::unavailable(format!(
                "{} {}: {}",
                subcommand(args),
                redact_url(&self.url),
                self.stderr_of(&output)
            )))
        }
    }

    /// Run a local command; failure means the mirror is damaged.
    fn git_ok(&self, args: &[&str]) -> Result<String> {
        let output = self.git(args)?;
        if !output.status.success() {
            return Err(AitkError::Git(format!(
                "git {}: {}",
                subcommand(args),
                self.stderr_of(&output)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn git(&self, args: &[&str]) -> Result<Output> {
        self.run(Some(&self.dir), args)
    }

    fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new("git");
        cmd.args(["-c", HTTP_LOW_SPEED_LIMIT, "-c", HTTP_LOW_SPEED_TIME])
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if std::env::var_os("GIT_SSH_COMMAND").is_none() {
            cmd.env("GIT_SSH_COMMAND", SSH_COMMAND);
        }
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        cmd.output().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AitkError::unavailable("git not found. Install git to use the env store")
            }
            _ => AitkError::unavailable(format!("failed to run git: {}", e)),
        })
    }

    fn stderr_of(&self, output: &Output) -> String {
        let stderr = String::from_utf8_lossy(&output.stderr);
        redact_text(stderr.trim(), &self.url)
    }
}

/// The git subcommand in `args`, skipping leading `-c key=value` pairs.
fn subcommand<'a>(args: &[&'a str]) -> &'a str {
    let mut rest = args;
    while let ["-c", _, tail @ ..] = rest {
        rest = tail;
    }
    rest.first().copied().unwrap_or_default()
}

/// Exclusive hold on a mirror directory, released on drop.
#[derive(Debug)]
pub struct MirrorLock {
    _file: File,
}

/// Commit author name: git config, then the login name.
fn infer_user_name() -> String {
    git_config_value("user.name").unwrap_or_else(login_name)
}

/// Commit author email: git config, then `login@hostname`.
fn infer_user_email() -> String {
    git_config_value("user.email")
        .unwrap_or_else(|| format!("{}@{}", login_name(), infer_hostname()))
}

/// Machine name recorded in store commit messages.
pub fn infer_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "localhost".to_string())
}

fn login_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "aitk".to_string())
}

fn git_config_value(key: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["config", "--get", key])
        .stdin(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8(output.stdout).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
