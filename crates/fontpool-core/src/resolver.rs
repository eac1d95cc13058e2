//! External resolver process
//!
//! One kpsewhich invocation for one batch of font files. The child runs
//! concurrently; its raw output and final exit status arrive as
//! [`ProcessEvent`]s over a channel and are turned into
//! [`ResolverMessage`]s, one complete line at a time and strictly in the
//! order the child wrote them. Nothing here blocks unless the caller asks
//! for [`ResolverProcess::next_blocking`].

use std::collections::VecDeque;

use async_channel::{Receiver, TryRecvError};
use kpse_output::{LineBuffer, OutputLine};
use tracing::{debug, trace, warn};

use crate::constants::MAX_TRANSCRIPT_LEN;
use crate::error::FontPoolError;
use crate::mode::ResolutionMode;
use crate::traits::ProcessKiller;

/// Which of the two resolution passes is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPass {
    None,
    /// Locate virtual fonts (and any bitmap that is already on disk)
    VirtualFontPass,
    /// Locate, and if permitted generate, bitmap fonts
    BitmapPass,
}

/// Command line of one resolver run
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub extra_args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub mode: ResolutionMode,
    /// Whether mktexpk may create missing bitmaps
    pub generate: bool,
    pub pass: PendingPass,
    /// File names to look up, e.g. `cmr10.vf`, `cmr10.600pk`
    pub files: Vec<String>,
}

impl Invocation {
    pub fn args(&self) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.push("--dpi".to_string());
        args.push(self.mode.dpi.to_string());
        args.push("--mode".to_string());
        args.push(self.mode.name.to_string());
        args.push(if self.generate { "--mktex=pk" } else { "--no-mktex=pk" }.to_string());
        args.extend(self.files.iter().cloned());
        args
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in self.args() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }

    /// Short title for the progress display
    pub fn describe(&self) -> String {
        match (self.pass, self.generate) {
            (PendingPass::VirtualFontPass, _) => "Locating fonts".to_string(),
            (_, true) => format!("Font generation ({} dpi, {})", self.mode.dpi, self.mode.label),
            (_, false) => "Locating bitmap fonts".to_string(),
        }
    }
}

/// Exit status of the child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: u32,
}

impl ExitStatus {
    pub fn new(code: u32) -> Self {
        Self { code }
    }

    /// Status reported when the child vanished without a readable status
    pub fn lost() -> Self {
        Self { code: u32::MAX }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Raw event from the process watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Output(Vec<u8>),
    Exited(ExitStatus),
}

/// One parsed event, ready for the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverMessage {
    Line(OutputLine),
    Terminated(ExitStatus),
}

pub struct ResolverProcess {
    events: Receiver<ProcessEvent>,
    killer: Option<Box<dyn ProcessKiller>>,
    lines: LineBuffer,
    queue: VecDeque<ResolverMessage>,
    transcript: String,
    found: usize,
    finished: bool,
}

impl ResolverProcess {
    pub fn new(events: Receiver<ProcessEvent>, killer: Box<dyn ProcessKiller>) -> Self {
        Self {
            events,
            killer: Some(killer),
            lines: LineBuffer::new(),
            queue: VecDeque::new(),
            transcript: String::new(),
            found: 0,
            finished: false,
        }
    }

    /// Next message if one is available right now
    pub fn try_next(&mut self) -> Option<ResolverMessage> {
        loop {
            if let Some(message) = self.queue.pop_front() {
                return Some(message);
            }
            if self.finished {
                return None;
            }
            match self.events.try_recv() {
                Ok(event) => self.translate(event),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    warn!("{} before the resolver exit was reported", FontPoolError::ChannelClosed);
                    self.translate(ProcessEvent::Exited(ExitStatus::lost()));
                }
            }
        }
    }

    /// Next message, waiting for the child if necessary
    ///
    /// Returns `None` only once the termination message has been handed out.
    pub fn next_blocking(&mut self) -> Option<ResolverMessage> {
        loop {
            if let Some(message) = self.queue.pop_front() {
                return Some(message);
            }
            if self.finished {
                return None;
            }
            match self.events.recv_blocking() {
                Ok(event) => self.translate(event),
                Err(_) => {
                    warn!("{} before the resolver exit was reported", FontPoolError::ChannelClosed);
                    self.translate(ProcessEvent::Exited(ExitStatus::lost()));
                }
            }
        }
    }

    /// Terminate the child immediately. Messages not yet handed out are dropped.
    pub fn kill(&mut self) {
        if let Some(mut killer) = self.killer.take() {
            if let Err(e) = killer.kill() {
                // The child may have exited on its own in the meantime
                debug!("Killing resolver failed: {}", e);
            }
        }
        self.queue.clear();
        self.lines.clear();
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished && self.queue.is_empty()
    }

    /// MetaFont and mktexpk output seen so far, oldest lines trimmed first
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn found_count(&self) -> usize {
        self.found
    }

    pub(crate) fn count_found(&mut self) -> usize {
        self.found += 1;
        self.found
    }

    fn translate(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Output(bytes) => {
                trace!("Resolver read {} bytes", bytes.len());
                let mut complete = Vec::new();
                self.lines.feed_with(&bytes, |line| complete.push(line));
                for line in complete {
                    self.push_line(line);
                }
            }
            ProcessEvent::Exited(status) => {
                if let Some(rest) = self.lines.finish() {
                    self.push_line(rest);
                }
                debug!("Resolver exited with code {}", status.code);
                self.killer = None;
                self.finished = true;
                self.queue.push_back(ResolverMessage::Terminated(status));
            }
        }
    }

    fn push_line(&mut self, text: String) {
        let line = OutputLine::parse(&text);
        trace!("Resolver line {:?}", line);
        if matches!(line, OutputLine::Diagnostic(_) | OutputLine::GenerationStarted { .. }) {
            self.append_transcript(&text);
        }
        self.queue.push_back(ResolverMessage::Line(line));
    }

    fn append_transcript(&mut self, text: &str) {
        self.transcript.push_str(text);
        self.transcript.push('\n');
        if self.transcript.len() > MAX_TRANSCRIPT_LEN {
            let mut cut = self.transcript.len() - MAX_TRANSCRIPT_LEN;
            while !self.transcript.is_char_boundary(cut) {
                cut += 1;
            }
            self.transcript.drain(..cut);
        }
    }
}

impl Drop for ResolverProcess {
    fn drop(&mut self) {
        if self.killer.is_some() {
            debug!("Dropping running resolver, killing child");
            self.kill();
        }
    }
}
