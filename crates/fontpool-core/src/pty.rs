//! Runs the resolver in a pseudo terminal
//!
//! kpsewhich, mktexpk and MetaFont all write to the same terminal, so result
//! lines and generator chatter arrive interleaved on a single stream, in the
//! order they were produced. A reader thread forwards raw chunks and finally
//! the exit status; it never touches pool state.

use std::io::{ErrorKind, Read};
use std::thread;

use async_channel::Sender;
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};
use tracing::{debug, error, info, warn};

use crate::constants::{MAX_READ_RETRIES, PTY_COLS, PTY_ROWS, READ_BUFFER_SIZE, READ_RETRY_DELAY_MS};
use crate::error::{FontPoolError, FontPoolResult};
use crate::resolver::{ExitStatus, Invocation, ProcessEvent, ResolverProcess};
use crate::traits::{ProcessKiller, ProcessLauncher};

/// Launches resolver runs through `portable-pty`
#[derive(Debug, Clone, Copy)]
pub struct PtyLauncher {
    size: PtySize,
}

impl Default for PtyLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl PtyLauncher {
    pub fn new() -> Self {
        Self {
            size: PtySize {
                rows: PTY_ROWS,
                cols: PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            },
        }
    }
}

struct PtyKiller(Box<dyn ChildKiller + Send + Sync>);

impl ProcessKiller for PtyKiller {
    fn kill(&mut self) -> std::io::Result<()> {
        self.0.kill()
    }
}

impl ProcessLauncher for PtyLauncher {
    fn launch(&mut self, invocation: &Invocation) -> FontPoolResult<ResolverProcess> {
        debug!("Spawning resolver: {}", invocation.command_line());

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(self.size)
            .map_err(|e| FontPoolError::PtyCreationFailed { message: e.to_string() })?;

        let mut cmd = CommandBuilder::new(&invocation.program);
        cmd.args(invocation.args());
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        if let Ok(dir) = std::env::current_dir() {
            cmd.cwd(dir);
        }

        let mut child = pair.slave.spawn_command(cmd).map_err(|e| {
            error!("Failed to spawn {}: {}", invocation.program, e);
            FontPoolError::ProcessSpawnFailed {
                program: invocation.program.clone(),
                message: e.to_string(),
            }
        })?;
        // Only the child may hold the slave side, otherwise EOF never arrives
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| FontPoolError::PtyCreationFailed { message: e.to_string() })?;
        let killer = child.clone_killer();
        let master = pair.master;

        let (tx, rx) = async_channel::unbounded();
        thread::Builder::new()
            .name("font-resolver".to_string())
            .spawn(move || {
                forward_output(reader, &tx);
                let status = match child.wait() {
                    Ok(status) => ExitStatus::new(status.exit_code()),
                    Err(e) => {
                        warn!("Waiting for resolver failed: {}", e);
                        ExitStatus::lost()
                    }
                };
                drop(master);
                if tx.send_blocking(ProcessEvent::Exited(status)).is_err() {
                    debug!("Resolver exit not delivered, pool stopped listening");
                }
            })?;

        info!("Resolver started for {} files", invocation.files.len());
        Ok(ResolverProcess::new(rx, Box::new(PtyKiller(killer))))
    }
}

fn forward_output(mut reader: Box<dyn Read + Send>, tx: &Sender<ProcessEvent>) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut consecutive_errors = 0;

    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                debug!("Resolver output: EOF");
                break;
            }
            Ok(n) => {
                consecutive_errors = 0;
                if tx.send_blocking(ProcessEvent::Output(buf[..n].to_vec())).is_err() {
                    debug!("Resolver output dropped, pool stopped listening");
                    break;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                consecutive_errors += 1;
                if consecutive_errors > MAX_READ_RETRIES {
                    warn!("Resolver read failed {} times, giving up: {}", consecutive_errors, e);
                    break;
                }
                thread::sleep(std::time::Duration::from_millis(READ_RETRY_DELAY_MS));
            }
            Err(e) => {
                // Linux reports EIO on the master once the child side is closed
                debug!("Resolver output closed: {}", e);
                break;
            }
        }
    }
}
