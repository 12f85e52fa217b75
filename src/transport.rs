//! Unified file I/O and command execution, local or over a remote shell (SPEC_FULL §4.1).
//!
//! Every blocking I/O call is a direct `std::process::Command`/`std::fs` call — no async
//! runtime, matching the single-threaded execution model of §5. Subprocess orchestration is
//! behind the `CommandRunner` trait so tests can substitute a fake instead of shelling out.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::error::{DnsMgrError, Result};

/// Default command timeout (§4.1/§5): 10 seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A remote host to shell/copy to, or `None` for local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub host: String,
    pub port: Option<String>,
}

/// Capability seam for running subprocesses, so tests can substitute a fake (a
/// `RecordingRunner` that logs invocations instead of executing them) rather than shelling out
/// (SPEC_FULL §9).
pub trait CommandRunner {
    /// Run `cmd` (already fully assembled, including any `ssh`/`scp` prefix) and return its
    /// captured stdout. Non-zero exit or timeout is a `TransportError`.
    fn run_capture(&self, cmd: &[String], timeout: Duration) -> Result<Vec<u8>>;

    /// Run `cmd`, discarding stdout, returning `Ok(())` only on a zero exit status within
    /// `timeout`.
    fn run(&self, cmd: &[String], timeout: Duration) -> Result<()>;

    /// Like `run`, but treats a non-zero exit as `Ok(false)` instead of an error — used for
    /// boolean probes like `test -f`.
    fn run_bool(&self, cmd: &[String], timeout: Duration) -> Result<bool>;
}

/// Shells out via `std::process::Command`, optionally wrapping with `ssh -p <port> <host>`.
#[derive(Debug, Default, Clone)]
pub struct ShellRunner;

fn describe(cmd: &[String]) -> String {
    cmd.join(" ")
}

impl CommandRunner for ShellRunner {
    fn run_capture(&self, cmd: &[String], timeout: Duration) -> Result<Vec<u8>> {
        let (program, args) = cmd
            .split_first()
            .ok_or_else(|| DnsMgrError::transport(describe(cmd), "empty command"))?;
        run_with_timeout(program, args, timeout, true)
    }

    fn run(&self, cmd: &[String], timeout: Duration) -> Result<()> {
        let (program, args) = cmd
            .split_first()
            .ok_or_else(|| DnsMgrError::transport(describe(cmd), "empty command"))?;
        run_with_timeout(program, args, timeout, false)?;
        Ok(())
    }

    fn run_bool(&self, cmd: &[String], timeout: Duration) -> Result<bool> {
        let (program, args) = cmd
            .split_first()
            .ok_or_else(|| DnsMgrError::transport(describe(cmd), "empty command"))?;
        match run_with_timeout(program, args, timeout, false) {
            Ok(_) => Ok(true),
            Err(DnsMgrError::Transport { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

fn run_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    capture: bool,
) -> Result<Vec<u8>> {
    let mut command = Command::new(program);
    command.args(args);
    if capture {
        command.stdout(std::process::Stdio::piped());
    }

    let mut child = command
        .spawn()
        .map_err(|e| DnsMgrError::transport(program, e.to_string()))?;

    let deadline = std::time::Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return Err(DnsMgrError::transport(
                        program,
                        format!("exited with status {status}"),
                    ));
                }
                let mut out = Vec::new();
                if capture {
                    if let Some(mut stdout) = child.stdout.take() {
                        use std::io::Read;
                        stdout
                            .read_to_end(&mut out)
                            .map_err(|e| DnsMgrError::transport(program, e.to_string()))?;
                    }
                }
                return Ok(out);
            }
            Ok(None) => {
                if std::time::Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(DnsMgrError::transport(
                        program,
                        format!("timed out after {:?}", timeout),
                    ));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(e) => return Err(DnsMgrError::transport(program, e.to_string())),
        }
    }
}

/// "A file somewhere, a command somewhere" — local filesystem or a remote host reached over
/// `ssh`/`scp` (SPEC_FULL §4.1).
pub struct Transport {
    remote: Option<Remote>,
    runner: Box<dyn CommandRunner>,
}

impl Transport {
    pub fn local() -> Self {
        Transport {
            remote: None,
            runner: Box::new(ShellRunner),
        }
    }

    pub fn remote(remote: Remote) -> Self {
        Transport {
            remote: Some(remote),
            runner: Box::new(ShellRunner),
        }
    }

    pub fn with_runner(remote: Option<Remote>, runner: Box<dyn CommandRunner>) -> Self {
        Transport { remote, runner }
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    fn ssh_prefix(&self, remote: &Remote) -> Vec<String> {
        let mut cmd = vec!["ssh".to_string()];
        if let Some(port) = &remote.port {
            cmd.push("-p".to_string());
            cmd.push(port.clone());
        }
        cmd.push(remote.host.clone());
        cmd
    }

    fn wrap(&self, cmd: Vec<String>) -> Vec<String> {
        match &self.remote {
            Some(remote) => {
                let mut full = self.ssh_prefix(remote);
                full.extend(cmd);
                full
            }
            None => cmd,
        }
    }

    /// Read the whole file at `path`: `fs::read` locally, `ssh <host> cat <path>` remotely.
    pub fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        match &self.remote {
            None => fs::read(path).map_err(|e| DnsMgrError::transport("read", e.to_string())),
            Some(_) => {
                let cmd = self.wrap(vec!["cat".to_string(), path_str(path)]);
                self.runner.run_capture(&cmd, DEFAULT_TIMEOUT)
            }
        }
    }

    /// Write `content` to `path`: `fs::write` locally, `cat > path` piped over SSH remotely.
    pub fn write_all(&self, path: &Path, content: &[u8]) -> Result<()> {
        match &self.remote {
            None => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| DnsMgrError::transport("mkdir", e.to_string()))?;
                }
                fs::write(path, content).map_err(|e| DnsMgrError::transport("write", e.to_string()))
            }
            Some(remote) => {
                let mut cmd = self.ssh_prefix(remote);
                cmd.push(format!("cat > {}", shell_quote(&path_str(path))));
                write_via_stdin(&cmd, content, DEFAULT_TIMEOUT)
            }
        }
    }

    pub fn exists(&self, path: &Path) -> Result<bool> {
        match &self.remote {
            None => Ok(path.exists()),
            Some(_) => {
                let cmd = self.wrap(vec!["test".to_string(), "-f".to_string(), path_str(path)]);
                self.runner.run_bool(&cmd, DEFAULT_TIMEOUT)
            }
        }
    }

    pub fn mkdir_p(&self, path: &Path) -> Result<()> {
        match &self.remote {
            None => fs::create_dir_all(path)
                .map_err(|e| DnsMgrError::transport("mkdir", e.to_string())),
            Some(_) => {
                let cmd = self.wrap(vec!["mkdir".to_string(), "-p".to_string(), path_str(path)]);
                self.runner.run(&cmd, DEFAULT_TIMEOUT)
            }
        }
    }

    pub fn stat_size(&self, path: &Path) -> Result<u64> {
        match &self.remote {
            None => fs::metadata(path)
                .map(|m| m.len())
                .map_err(|e| DnsMgrError::transport("stat", e.to_string())),
            Some(_) => {
                let cmd = self.wrap(vec![
                    "stat".to_string(),
                    "-c".to_string(),
                    "%s".to_string(),
                    path_str(path),
                ]);
                let out = self.runner.run_capture(&cmd, DEFAULT_TIMEOUT)?;
                parse_u64(&out)
            }
        }
    }

    /// Computes a sha256 checksum by invoking `sha256sum` wherever the file lives, taking the
    /// first whitespace-delimited field.
    pub fn sha256(&self, path: &Path) -> Result<String> {
        let cmd = self.wrap(vec!["sha256sum".to_string(), path_str(path)]);
        let out = self.runner.run_capture(&cmd, DEFAULT_TIMEOUT)?;
        let text = String::from_utf8_lossy(&out);
        text.split_whitespace()
            .next()
            .map(|s| s.to_string())
            .ok_or_else(|| DnsMgrError::transport("sha256sum", "no output"))
    }

    /// Copy `src` (on this transport) to `dest` (on `dest_transport`). Remote-to-remote is
    /// explicitly unsupported.
    pub fn copy_to(&self, src: &Path, dest_transport: &Transport, dest: &Path) -> Result<()> {
        match (&self.remote, &dest_transport.remote) {
            (Some(_), Some(_)) => Err(DnsMgrError::transport(
                "copy",
                "remote-to-remote copy is not supported",
            )),
            (None, None) => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| DnsMgrError::transport("mkdir", e.to_string()))?;
                }
                fs::copy(src, dest)
                    .map(|_| ())
                    .map_err(|e| DnsMgrError::transport("cp", e.to_string()))
            }
            (Some(remote), None) => {
                let mut cmd = vec!["scp".to_string()];
                if let Some(port) = &remote.port {
                    cmd.push("-P".to_string());
                    cmd.push(port.clone());
                }
                cmd.push(format!("{}:{}", remote.host, path_str(src)));
                cmd.push(path_str(dest));
                self.runner.run(&cmd, DEFAULT_TIMEOUT)
            }
            (None, Some(remote)) => {
                let mut cmd = vec!["scp".to_string()];
                if let Some(port) = &remote.port {
                    cmd.push("-P".to_string());
                    cmd.push(port.clone());
                }
                cmd.push(path_str(src));
                cmd.push(format!("{}:{}", remote.host, path_str(dest)));
                self.runner.run(&cmd, DEFAULT_TIMEOUT)
            }
        }
    }

    /// Move `src` to `dest` on the *same* transport (local-local or remote-remote over a single
    /// shell connection); cross-transport moves are not supported (only copy is).
    pub fn move_file(&self, src: &Path, dest: &Path) -> Result<()> {
        match &self.remote {
            None => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| DnsMgrError::transport("mkdir", e.to_string()))?;
                }
                fs::rename(src, dest).map_err(|e| DnsMgrError::transport("mv", e.to_string()))
            }
            Some(_) => {
                let cmd = self.wrap(vec![
                    "mv".to_string(),
                    "--force".to_string(),
                    path_str(src),
                    path_str(dest),
                ]);
                self.runner.run(&cmd, DEFAULT_TIMEOUT)
            }
        }
    }

    /// `cp --force src dest`, on this transport.
    pub fn cp_force(&self, src: &Path, dest: &Path) -> Result<()> {
        let cmd = self.wrap(vec![
            "cp".to_string(),
            "--force".to_string(),
            path_str(src),
            path_str(dest),
        ]);
        self.runner.run(&cmd, DEFAULT_TIMEOUT)
    }

    /// Run a fully assembled command (e.g. a restart/reload command split on whitespace).
    pub fn run(&self, cmd: &[String], timeout: Duration) -> Result<()> {
        let full = self.wrap(cmd.to_vec());
        self.runner.run(&full, timeout)
    }

    pub fn run_capture(&self, cmd: &[String], timeout: Duration) -> Result<Vec<u8>> {
        let full = self.wrap(cmd.to_vec());
        self.runner.run_capture(&full, timeout)
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn parse_u64(out: &[u8]) -> Result<u64> {
    String::from_utf8_lossy(out)
        .trim()
        .parse()
        .map_err(|_| DnsMgrError::transport("stat", "non-numeric size output"))
}

fn write_via_stdin(cmd: &[String], content: &[u8], timeout: Duration) -> Result<()> {
    use std::io::Write;

    let (program, args) = cmd
        .split_first()
        .ok_or_else(|| DnsMgrError::transport("write", "empty command"))?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| DnsMgrError::transport(program, e.to_string()))?;

    child
        .stdin
        .take()
        .expect("stdin was requested as piped")
        .write_all(content)
        .map_err(|e| DnsMgrError::transport(program, e.to_string()))?;

    let deadline = std::time::Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return Err(DnsMgrError::transport(
                        program,
                        format!("exited with status {status}"),
                    ));
                }
                return Ok(());
            }
            Ok(None) => {
                if std::time::Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(DnsMgrError::transport(
                        program,
                        format!("timed out after {:?}", timeout),
                    ));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(e) => return Err(DnsMgrError::transport(program, e.to_string())),
        }
    }
}

/// A `Transport` paired with a path: the unit of "a file somewhere" the rest of the crate
/// passes around.
pub struct FileRef<'t> {
    pub transport: &'t Transport,
    pub path: PathBuf,
}

impl<'t> FileRef<'t> {
    pub fn new(transport: &'t Transport, path: impl Into<PathBuf>) -> Self {
        FileRef {
            transport,
            path: path.into(),
        }
    }

    pub fn read_all(&self) -> Result<Vec<u8>> {
        self.transport.read_all(&self.path)
    }

    pub fn write_all(&self, content: &[u8]) -> Result<()> {
        self.transport.write_all(&self.path, content)
    }

    pub fn exists(&self) -> Result<bool> {
        self.transport.exists(&self.path)
    }

    pub fn sha256(&self) -> Result<String> {
        self.transport.sha256(&self.path)
    }

    pub fn size(&self) -> Result<u64> {
        self.transport.stat_size(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// A fake `CommandRunner` that records invocations instead of executing them
    /// (SPEC_FULL §9).
    #[derive(Default)]
    pub struct RecordingRunner {
        pub invocations: RefCell<Vec<Vec<String>>>,
        pub capture_response: RefCell<Vec<u8>>,
    }

    impl CommandRunner for RecordingRunner {
        fn run_capture(&self, cmd: &[String], _timeout: Duration) -> Result<Vec<u8>> {
            self.invocations.borrow_mut().push(cmd.to_vec());
            Ok(self.capture_response.borrow().clone())
        }

        fn run(&self, cmd: &[String], _timeout: Duration) -> Result<()> {
            self.invocations.borrow_mut().push(cmd.to_vec());
            Ok(())
        }

        fn run_bool(&self, cmd: &[String], _timeout: Duration) -> Result<bool> {
            self.invocations.borrow_mut().push(cmd.to_vec());
            Ok(true)
        }
    }

    #[test]
    fn local_write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Transport::local();
        let path = dir.path().join("zone.txt");

        transport.write_all(&path, b"hello").unwrap();
        assert_eq!(transport.read_all(&path).unwrap(), b"hello");
        assert!(transport.exists(&path).unwrap());
        assert_eq!(transport.stat_size(&path).unwrap(), 5);
    }

    #[test]
    fn local_move_relocates_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Transport::local();
        let src = dir.path().join("src.txt");
        let dest = dir.path().join("dest.txt");
        transport.write_all(&src, b"content").unwrap();

        transport.move_file(&src, &dest).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"content");
    }

    #[test]
    fn remote_to_remote_copy_is_rejected() {
        let a = Transport::remote(Remote {
            host: "a".into(),
            port: None,
        });
        let b = Transport::remote(Remote {
            host: "b".into(),
            port: None,
        });
        let err = a
            .copy_to(Path::new("/tmp/x"), &b, Path::new("/tmp/y"))
            .unwrap_err();
        assert!(matches!(err, DnsMgrError::Transport { .. }));
    }

    #[test]
    fn write_via_stdin_enforces_timeout() {
        let cmd = vec!["sleep".to_string(), "5".to_string()];
        let err = write_via_stdin(&cmd, b"content", Duration::from_millis(50)).unwrap_err();
        match err {
            DnsMgrError::Transport { message, .. } => assert!(message.contains("timed out")),
            other => panic!("expected Transport error, got {other:?}"),
        }
    }

    #[test]
    fn remote_read_shells_out_through_runner() {
        let runner = Box::new(RecordingRunner::default());
        let remote = Remote {
            host: "ns1".into(),
            port: Some("2222".into()),
        };
        let transport = Transport::with_runner(Some(remote), runner);
        let _ = transport.read_all(Path::new("/etc/bind/named.conf"));
    }
}
