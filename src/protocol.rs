//! Driver for the out-of-process render backend.
//!
//! A request is handed over as three positional arguments,
//! `[outputType, payloadPath, destination]`, where `payloadPath` names a
//! temporary JSON file holding the [`DocumentPayload`]. The backend confirms
//! success by printing the destination on its own line and exiting with
//! status 0. Anything else is a failure; stderr is forwarded verbatim.
//!
//! [`DocumentPayload`]: crate::document::DocumentPayload

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::error::{ConversionError, Result};
use crate::request::RenderRequest;

/// Default execution-time allowance for one request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// File name of the bundled backend executable.
pub fn backend_file_name() -> String {
    format!("forge-backend{}", std::env::consts::EXE_SUFFIX)
}

/// The backend next to the running executable, or the bare name so the
/// `PATH` lookup applies.
pub fn default_backend_program() -> PathBuf {
    let name = backend_file_name();
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .filter(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from(name))
}

/// How to launch the backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub program: PathBuf,
    /// Arguments placed before the three protocol arguments.
    pub leading_args: Vec<OsString>,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: default_backend_program(),
            leading_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl BackendConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Runs render requests in isolated backend processes.
#[derive(Debug, Clone)]
pub struct BackendDriver {
    config: BackendConfig,
}

impl BackendDriver {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Render `request` and wait for the backend's verdict.
    ///
    /// Resolves to the destination on success. On timeout the backend's
    /// process group is killed and the backend reaped before
    /// [`ConversionError::RenderTimeout`] is returned. Dropping the returned
    /// future also kills the group.
    pub async fn start(&self, request: &RenderRequest) -> Result<PathBuf> {
        let destination = request.destination().to_path_buf();
        let payload_file = write_payload(request).await?;

        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.leading_args)
            .arg(request.output_type().backend_name())
            .arg(payload_file.path())
            .arg(&destination)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        log::debug!(
            "Starting backend {} {} -> {}",
            self.config.program.display(),
            request.output_type(),
            destination.display()
        );

        let mut child = command
            .spawn()
            .map_err(|e| spawn_error(e, &self.config.program))?;
        let mut group = ProcessGroup::of(&child);

        let mut stdout_task = tokio::spawn(drain(child.stdout.take()));
        let mut stderr_task = tokio::spawn(drain(child.stderr.take()));

        // The allowance covers exit and both pipes closing: a worker that
        // inherited stdout keeps the request open until it is gone too.
        let finished = tokio::time::timeout(self.config.timeout, async {
            let status = child.wait().await?;
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok(Ok(done)) => done,
            Ok(Err(err)) => {
                stdout_task.abort();
                stderr_task.abort();
                group.kill();
                terminate(&mut child).await;
                return Err(ConversionError::unknown("BackendWait", err));
            }
            Err(_) => {
                stdout_task.abort();
                stderr_task.abort();
                group.kill();
                terminate(&mut child).await;
                log::warn!(
                    "Backend exceeded {:?} rendering {}; terminated",
                    self.config.timeout,
                    destination.display()
                );
                return Err(ConversionError::RenderTimeout {
                    destination,
                    timeout: self.config.timeout,
                });
            }
        };
        group.disarm();
        drop(payload_file);

        interpret(status, &stdout, &stderr, &destination)
    }
}

async fn write_payload(request: &RenderRequest) -> Result<tempfile::NamedTempFile> {
    let json = request
        .payload()
        .to_json()
        .map_err(|e| ConversionError::unknown("PayloadSerialization", e))?;
    let file = tempfile::Builder::new()
        .prefix("forge-payload-")
        .suffix(".json")
        .tempfile()
        .map_err(|e| ConversionError::from_io(e, &std::env::temp_dir()))?;
    tokio::fs::write(file.path(), json)
        .await
        .map_err(|e| ConversionError::from_io(e, file.path()))?;
    Ok(file)
}

fn spawn_error(err: std::io::Error, program: &Path) -> ConversionError {
    log::debug!("Cannot start backend {}: {err}", program.display());
    ConversionError::from_io(err, program)
}

/// The backend's process group. Killing it also takes down any workers the
/// backend started; dropping it armed does the same.
struct ProcessGroup {
    id: Option<i32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self {
            id: child.id().and_then(|pid| i32::try_from(pid).ok()),
        }
    }

    fn kill(&mut self) {
        if let Some(id) = self.id.take() {
            kill_group(id);
        }
    }

    /// The backend finished cleanly; leave the group id alone.
    fn disarm(&mut self) {
        self.id = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(id: i32) {
    // SAFETY: killpg takes plain integers and touches no memory.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::killpg(id, libc::SIGKILL) };
    if rc != 0 {
        log::debug!("killpg({id}): {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_id: i32) {}

/// Kill the backend and reap it so no process is left behind.
async fn terminate(child: &mut Child) {
    // Already reaped: only its workers were still holding the pipes.
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    if let Err(err) = child.kill().await {
        log::warn!("Failed to terminate backend: {err}");
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(err) = pipe.read_to_end(&mut buf).await {
            log::debug!("Backend pipe closed early: {err}");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn interpret(status: ExitStatus, stdout: &str, stderr: &str, destination: &Path) -> Result<PathBuf> {
    verdict(status.code(), stdout, stderr, destination)
}

fn verdict(code: Option<i32>, stdout: &str, stderr: &str, destination: &Path) -> Result<PathBuf> {
    if code == Some(0) && confirms(stdout, destination) {
        log::debug!("Backend confirmed {}", destination.display());
        return Ok(destination.to_path_buf());
    }

    let diagnostics = if !stderr.trim().is_empty() {
        stderr.to_string()
    } else if code == Some(0) {
        format!("backend did not confirm '{}'", destination.display())
    } else {
        stdout.to_string()
    };
    Err(ConversionError::BackendFailure {
        status: code,
        diagnostics,
    })
}

/// `true` if one stdout line is exactly the destination path.
fn confirms(stdout: &str, destination: &Path) -> bool {
    let expected = destination.to_string_lossy();
    stdout.lines().any(|line| line.trim() == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> PathBuf {
        PathBuf::from("/out/report.pdf")
    }

    #[test]
    fn zero_status_with_echo_succeeds() {
        let ok = verdict(Some(0), "/work\n/out/report.pdf\n", "", &dest()).unwrap();
        assert_eq!(ok, dest());
        let crlf = verdict(Some(0), "/out/report.pdf\r\n", "", &dest()).unwrap();
        assert_eq!(crlf, dest());
    }

    #[test]
    fn missing_echo_is_a_failure() {
        match verdict(Some(0), "/out/other.pdf\n", "", &dest()) {
            Err(ConversionError::BackendFailure { status, diagnostics }) => {
                assert_eq!(status, Some(0));
                assert!(diagnostics.contains("did not confirm"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nonzero_status_forwards_stderr_verbatim() {
        let stderr = "SyntaxError: Some arguments are missing.\n  at main\n";
        match verdict(Some(1), "/out/report.pdf\n", stderr, &dest()) {
            Err(ConversionError::BackendFailure { status, diagnostics }) => {
                assert_eq!(status, Some(1));
                assert_eq!(diagnostics, stderr);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn signal_death_has_no_status() {
        let err = verdict(None, "", "", &dest()).unwrap_err();
        assert!(matches!(err, ConversionError::BackendFailure { status: None, .. }));
    }

    #[test]
    fn config_builders() {
        let config = BackendConfig::new("/bin/sh")
            .with_leading_args(["-c", "exit 0"])
            .with_timeout(Duration::from_millis(250));
        assert_eq!(config.leading_args.len(), 2);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert!(backend_file_name().starts_with("forge-backend"));
    }

    #[cfg(unix)]
    fn sleeper() -> Child {
        Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .process_group(0)
            .spawn()
            .unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropping_an_armed_group_kills_it() {
        let mut child = sleeper();
        drop(ProcessGroup::of(&child));
        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.code(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn disarmed_group_is_left_alone() {
        let mut child = sleeper();
        let mut group = ProcessGroup::of(&child);
        group.disarm();
        drop(group);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(child.try_wait().unwrap().is_none());
        terminate(&mut child).await;
        assert!(child.try_wait().unwrap().is_some());
    }
}
