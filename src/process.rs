use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::utilities::wine_wrap;
use failure::ResultExt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Captured result of one external tool invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the tool was terminated by a signal or timed out.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0) && !self.timed_out
    }

    /// Both streams joined for display, stdout first.
    pub fn combined(&self) -> String {
        let mut text = String::new();
        for stream in &[&self.stdout, &self.stderr] {
            let stream = stream.trim_end();
            if stream.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stream);
        }
        text
    }
}

/// Synchronous launcher for external compilers.
///
/// Failing to launch a tool is an infrastructure error; a tool that runs and
/// exits with an error is reported through `ProcessOutput` for the adapter to
/// interpret.
#[derive(Clone, Debug, Default)]
pub struct ProcessRunner {
    wine_path: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(wine_path: Option<PathBuf>, timeout: Option<Duration>) -> Self {
        ProcessRunner { wine_path, timeout }
    }

    pub fn from_config(config: &Config) -> Self {
        ProcessRunner::new(config.wine_path.clone(), config.process_timeout())
    }

    pub fn run(&self, program: &Path, args: &[String]) -> Result<ProcessOutput> {
        self.run_in(None, program, args)
    }

    pub fn run_in(
        &self,
        working_dir: Option<&Path>,
        program: &Path,
        args: &[String],
    ) -> Result<ProcessOutput> {
        let (command, mut command_args) =
            wine_wrap(program, self.wine_path.as_ref().map(|path| path.as_path()));
        command_args.extend(args.iter().cloned());

        debug!("Running {:?} {:?}", command, command_args);

        let mut command_call = Command::new(&command);
        command_call
            .args(&command_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(working_dir) = working_dir {
            command_call.current_dir(working_dir);
        }

        let child = command_call
            .spawn()
            .with_context(|_| ErrorKind::launch(program))?;

        let output = match self.timeout {
            Some(timeout) => wait_with_timeout(child, timeout, program)?,
            None => {
                let output = child
                    .wait_with_output()
                    .with_context(|_| ErrorKind::launch(program))?;
                ProcessOutput {
                    status: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    timed_out: false,
                }
            }
        };

        if !output.success() {
            debug!(
                "{:?} exited with {:?} (timed out: {})",
                program, output.status, output.timed_out
            );
        }

        Ok(output)
    }
}

fn wait_with_timeout(mut child: Child, timeout: Duration, program: &Path) -> Result<ProcessOutput> {
    let stdout_reader = child.stdout.take().map(StreamReader::spawn);
    let stderr_reader = child.stderr.take().map(StreamReader::spawn);

    let deadline = Instant::now() + timeout;
    let status: Option<ExitStatus> = loop {
        let polled = child.try_wait().map_err(|err| {
            Error::process(format!("failed to wait on {:?} - {:?}", program, err))
        })?;
        match polled {
            Some(status) => break Some(status),
            None if Instant::now() >= deadline => {
                warn!("{:?} exceeded {:?}, killing it", program, timeout);
                // The tool may exit between the poll and the kill.
                let _ = child.kill();
                child.wait().map_err(|err| {
                    Error::process(format!("failed to reap {:?} - {:?}", program, err))
                })?;
                break None;
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    // Processes forked by the tool can hold the pipes open past its exit, so
    // the readers get the rest of the budget and are abandoned after that.
    let drain_deadline = deadline.max(Instant::now() + DRAIN_GRACE);
    let stdout = StreamReader::collect(stdout_reader, drain_deadline);
    let mut stderr = StreamReader::collect(stderr_reader, drain_deadline);
    let timed_out = status.is_none();
    if timed_out {
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!("process timed out after {:?}", timeout));
    }

    Ok(ProcessOutput {
        status: status.and_then(|status| status.code()),
        stdout,
        stderr,
        timed_out,
    })
}

/// Drains one pipe on a background thread into a shared buffer, so whatever
/// arrived can be taken without waiting for the pipe to close.
struct StreamReader {
    data: Arc<Mutex<Vec<u8>>>,
    closed: Receiver<()>,
}

impl StreamReader {
    fn spawn<R: Read + Send + 'static>(mut stream: R) -> Self {
        let data = Arc::new(Mutex::new(Vec::new()));
        let (sender, closed) = mpsc::channel();
        let sink = Arc::clone(&data);
        thread::spawn(move || {
            let mut buffer = [0u8; 4096];
            loop {
                match stream.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(count) => match sink.lock() {
                        Ok(mut data) => data.extend_from_slice(&buffer[..count]),
                        Err(_) => break,
                    },
                    Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    // A broken pipe only truncates diagnostics.
                    Err(_) => break,
                }
            }
            let _ = sender.send(());
        });
        StreamReader { data, closed }
    }

    fn collect(reader: Option<StreamReader>, deadline: Instant) -> String {
        let reader = match reader {
            Some(reader) => reader,
            None => return String::new(),
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        if let Err(RecvTimeoutError::Timeout) = reader.closed.recv_timeout(remaining) {
            debug!("output pipe still open after the deadline, keeping partial output");
        }
        let data = match reader.data.lock() {
            Ok(data) => data.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        String::from_utf8_lossy(&data).to_string()
    }
}
