//! Dummy collaborators for exercising the pool without kpsewhich or a UI

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::rc::Rc;

use async_channel::Sender;
use kpse_output::basename;

use crate::error::{FontPoolError, FontPoolResult};
use crate::font::{FontDefinition, FontLoader, LoadRequest, LoadedFont};
use crate::resolver::{ExitStatus, Invocation, ProcessEvent, ResolverProcess};
use crate::traits::{PoolSummary, ProcessKiller, ProcessLauncher, ProgressEvent, ProgressObserver};

/// Directory the simulated resolver reports files in
pub const DUMMY_TEXMF: &str = "/texmf/fonts";

/// Shared record of observer calls
#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<ProgressEvent>>>);

impl EventLog {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.0.borrow().clone()
    }

    pub fn count(&self, event: &ProgressEvent) -> usize {
        self.0.borrow().iter().filter(|e| *e == event).count()
    }

    pub fn contains(&self, event: &ProgressEvent) -> bool {
        self.count(event) > 0
    }

    pub fn last_summary(&self) -> Option<PoolSummary> {
        self.0.borrow().iter().rev().find_map(|e| match e {
            ProgressEvent::AggregateStatus(summary) => Some(*summary),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn push(&self, event: ProgressEvent) {
        self.0.borrow_mut().push(event);
    }
}

/// Observer that records every call
#[derive(Default)]
pub struct DummyObserver {
    log: EventLog,
}

impl DummyObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the recorded events that stays valid after the observer is boxed
    pub fn log(&self) -> EventLog {
        self.log.clone()
    }
}

impl ProgressObserver for DummyObserver {
    fn show_progress(&mut self) {
        self.log.push(ProgressEvent::ShowProgress);
    }

    fn hide_progress(&mut self) {
        self.log.push(ProgressEvent::HideProgress);
    }

    fn fonts_have_been_loaded(&mut self) {
        self.log.push(ProgressEvent::FontsLoaded);
    }

    fn total_fonts_in_job(&mut self, count: usize) {
        self.log.push(ProgressEvent::TotalFontsInJob(count));
    }

    fn num_found_fonts(&mut self, count: usize) {
        self.log.push(ProgressEvent::NumFoundFonts(count));
    }

    fn generation_output(&mut self, text: &str) {
        self.log.push(ProgressEvent::GenerationOutput(text.to_string()));
    }

    fn new_resolution_run(&mut self, description: &str) {
        self.log.push(ProgressEvent::NewResolutionRun(description.to_string()));
    }

    fn aggregate_status(&mut self, summary: PoolSummary) {
        self.log.push(ProgressEvent::AggregateStatus(summary));
    }
}

/// Canned reply for one launch
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub output: Vec<String>,
    pub exit_code: u32,
    /// Keep the process running until [`DummyLauncher::finish_held`]
    pub hold: bool,
    /// Refuse to start
    pub fail: bool,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(mut self, text: &str) -> Self {
        self.output.push(text.to_string());
        self
    }

    pub fn exit(mut self, code: u32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn held(mut self) -> Self {
        self.hold = true;
        self
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }
}

#[derive(Default)]
struct LauncherState {
    invocations: Vec<Invocation>,
    held: Vec<(Sender<ProcessEvent>, u32)>,
    kills: usize,
}

/// Handle for inspecting a [`DummyLauncher`] after it was handed to the pool
#[derive(Clone, Default)]
pub struct LaunchLog(Rc<RefCell<LauncherState>>);

impl LaunchLog {
    pub fn invocations(&self) -> Vec<Invocation> {
        self.0.borrow().invocations.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.0.borrow().invocations.len()
    }

    /// Launches that were allowed to generate bitmaps
    pub fn generation_launches(&self) -> usize {
        self.0.borrow().invocations.iter().filter(|i| i.generate).count()
    }

    pub fn kill_count(&self) -> usize {
        self.0.borrow().kills
    }

    /// Let every held process exit
    pub fn finish_held(&self) {
        for (tx, code) in self.0.borrow_mut().held.drain(..) {
            let _ = tx.send_blocking(ProcessEvent::Exited(ExitStatus::new(code)));
        }
    }
}

struct DummyKiller(LaunchLog);

impl ProcessKiller for DummyKiller {
    fn kill(&mut self) -> std::io::Result<()> {
        let mut state = self.0 .0.borrow_mut();
        state.kills += 1;
        state.held.clear();
        Ok(())
    }
}

/// Launcher that answers from scripts, or else from a simulated texmf tree
///
/// Without a queued script, every requested file listed in `files` is
/// reported as found. When the invocation permits generation, requested
/// bitmaps listed in `generatable` are "generated": a mktexpk start line and
/// some MetaFont chatter precede the path. Everything else is left
/// unreported, like kpsewhich does, and the run exits with code 1.
#[derive(Default)]
pub struct DummyLauncher {
    scripts: VecDeque<Script>,
    files: HashSet<String>,
    generatable: HashSet<String>,
    log: LaunchLog,
}

impl DummyLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(mut self, files: &[&str]) -> Self {
        self.files.extend(files.iter().map(|f| f.to_string()));
        self
    }

    pub fn with_generatable(mut self, files: &[&str]) -> Self {
        self.generatable.extend(files.iter().map(|f| f.to_string()));
        self
    }

    pub fn with_script(mut self, script: Script) -> Self {
        self.scripts.push_back(script);
        self
    }

    pub fn log(&self) -> LaunchLog {
        self.log.clone()
    }

    fn simulate(&self, invocation: &Invocation) -> Script {
        let mut script = Script::new();
        let mut missing = false;
        for file in &invocation.files {
            if self.files.contains(file) {
                script = script.line(&format!("{}/{}", DUMMY_TEXMF, file));
            } else if invocation.generate && self.generatable.contains(file) {
                let font = file.split('.').next().unwrap_or(file);
                script = script
                    .line(&format!(
                        "kpathsea: Running mktexpk --mfmode {} --bdpi {} --mag 1+0/{} --dpi {} {}",
                        invocation.mode.name, invocation.mode.dpi, invocation.mode.dpi, invocation.mode.dpi, font
                    ))
                    .line("This is METAFONT, Version 2.71828182")
                    .line(&format!("{}/{}", DUMMY_TEXMF, file));
            } else {
                missing = true;
            }
        }
        script.exit(if missing { 1 } else { 0 })
    }
}

impl ProcessLauncher for DummyLauncher {
    fn launch(&mut self, invocation: &Invocation) -> FontPoolResult<ResolverProcess> {
        let script = match self.scripts.pop_front() {
            Some(script) => script,
            None => self.simulate(invocation),
        };
        if script.fail {
            return Err(FontPoolError::ProcessSpawnFailed {
                program: invocation.program.clone(),
                message: "scripted failure".to_string(),
            });
        }
        self.log.0.borrow_mut().invocations.push(invocation.clone());

        let (tx, rx) = async_channel::unbounded();
        for line in &script.output {
            let _ = tx.send_blocking(ProcessEvent::Output(format!("{}\r\n", line).into_bytes()));
        }
        if script.hold {
            self.log.0.borrow_mut().held.push((tx, script.exit_code));
        } else {
            let _ = tx.send_blocking(ProcessEvent::Exited(ExitStatus::new(script.exit_code)));
        }
        Ok(ResolverProcess::new(rx, Box::new(DummyKiller(self.log.clone()))))
    }
}

/// Loader that makes up font data instead of reading files
///
/// Unknown `.vf` files load as virtual fonts without dependencies, anything
/// else as a bitmap font with checksum 0.
#[derive(Default)]
pub struct DummyLoader {
    fonts: HashMap<String, LoadedFont>,
    broken: HashSet<String>,
    loads: Rc<RefCell<Vec<String>>>,
}

impl DummyLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(mut self, file: &str, font: LoadedFont) -> Self {
        self.fonts.insert(file.to_string(), font);
        self
    }

    /// Virtual font `file` referring to `(name, scale fix-word)` pairs at 10pt
    pub fn with_virtual(self, file: &str, deps: &[(&str, u32)]) -> Self {
        let definitions = deps
            .iter()
            .enumerate()
            .map(|(i, (name, scale))| FontDefinition {
                number: i as u32,
                checksum: 0,
                scale: *scale,
                design: 10 << 20,
                name: name.to_string(),
            })
            .collect();
        self.with_font(file, LoadedFont::virtual_font(0, definitions))
    }

    pub fn with_broken(mut self, file: &str) -> Self {
        self.broken.insert(file.to_string());
        self
    }

    /// File names loaded so far, in order
    pub fn loads(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.loads)
    }
}

impl FontLoader for DummyLoader {
    fn load(&mut self, request: &LoadRequest<'_>) -> FontPoolResult<LoadedFont> {
        let file = file_name(request.path);
        self.loads.borrow_mut().push(file.clone());
        if self.broken.contains(&file) {
            return Err(FontPoolError::InvalidFontData { path: file, message: "broken".to_string() });
        }
        Ok(match self.fonts.get(&file) {
            Some(font) => font.clone(),
            None if file.ends_with(".vf") => LoadedFont::virtual_font(0, Vec::new()),
            None => LoadedFont::bitmap(0),
        })
    }
}

fn file_name(path: &Path) -> String {
    let text = path.to_string_lossy();
    basename(&text).to_string()
}
