//! Blocking subprocess execution under a deadline.

use std::{
    io::Read,
    process::{Command, Stdio},
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use log::{debug, trace, warn};

use crate::error::FormError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long the stdout reader gets to finish once the child is gone.
const READER_GRACE: Duration = Duration::from_millis(200);

/// Runs `command` to completion and returns its standard output.
///
/// Stdout is drained on a separate thread so a chatty child never blocks on
/// a full pipe. When `timeout` elapses first the child is killed and
/// `FormError::Timeout` is returned. The reader is never waited on past the
/// deadline: a grandchild that keeps the pipe open cannot hold the caller.
pub fn run(command: &mut Command, timeout: Duration) -> Result<String, FormError> {
    let program = command.get_program().to_string_lossy().into_owned();
    trace!("running {:?}", command);

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| FormError::subprocess(&program, e))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| FormError::subprocess(&program, "stdout was not captured"))?;
    let (sender, output) = mpsc::channel();
    thread::spawn(move || {
        let mut out = Vec::new();
        let _ = sender.send(stdout.read_to_end(&mut out).map(|_| out));
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                if output.recv_timeout(READER_GRACE).is_err() {
                    debug!("{} left its stdout open, reader abandoned", program);
                }
                warn!("{} timed out after {:?}, killed", program, timeout);
                return Err(FormError::Timeout { program, timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(FormError::subprocess(&program, e)),
        }
    };

    let remaining = deadline.saturating_duration_since(Instant::now()).max(READER_GRACE);
    let out = match output.recv_timeout(remaining) {
        Ok(read) => read.map_err(|e| FormError::subprocess(&program, e))?,
        Err(RecvTimeoutError::Timeout) => {
            warn!("{} exited but its stdout stayed open past {:?}", program, timeout);
            return Err(FormError::Timeout { program, timeout });
        }
        Err(RecvTimeoutError::Disconnected) => {
            return Err(FormError::subprocess(&program, "stdout reader panicked"))
        }
    };

    if !status.success() {
        return Err(FormError::subprocess(&program, format!("exited with {}", status)));
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}
