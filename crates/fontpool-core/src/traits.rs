use crate::resolver::Invocation;

/// Aggregate counts handed to observers after every pipeline check
///
/// This is the cheap summary; the full per-font report is
/// [`FontPool::status`](crate::FontPool::status), which is only built on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub total: usize,
    pub resolved: usize,
    pub failed: usize,
    pub pending: usize,
    pub unresolved: usize,
    pub in_use: usize,
    pub checksum_mismatches: usize,
}

impl PoolSummary {
    /// Fonts that will not receive any further attention in this session
    pub fn settled(&self) -> usize {
        self.resolved + self.failed
    }
}

/// Receives progress from the font pool
///
/// Implemented by the user interface. All methods default to doing nothing so
/// an implementation only picks what it displays. Calls are made synchronously
/// from the thread driving the pool and only carry values.
pub trait ProgressObserver {
    /// A font is being generated; the progress dialog should show up now
    fn show_progress(&mut self) {}

    fn hide_progress(&mut self) {}

    /// All fonts of the document are settled and the first page can be rendered
    fn fonts_have_been_loaded(&mut self) {}

    /// Number of fonts a newly started resolver run looks for
    fn total_fonts_in_job(&mut self, _count: usize) {}

    /// Running count of fonts the current run has located
    fn num_found_fonts(&mut self, _count: usize) {}

    /// One line of MetaFont / mktexpk output
    fn generation_output(&mut self, _text: &str) {}

    /// A resolver run starts; `description` names the run for display
    fn new_resolution_run(&mut self, _description: &str) {}

    fn aggregate_status(&mut self, _summary: PoolSummary) {}
}

/// Recorded observer call, used by [`DummyObserver`](crate::dummy_backend::DummyObserver)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    ShowProgress,
    HideProgress,
    FontsLoaded,
    TotalFontsInJob(usize),
    NumFoundFonts(usize),
    GenerationOutput(String),
    NewResolutionRun(String),
    AggregateStatus(PoolSummary),
}

/// Starts the external locator for one batch
pub trait ProcessLauncher {
    fn launch(&mut self, invocation: &Invocation) -> crate::FontPoolResult<crate::resolver::ResolverProcess>;
}

/// Terminates a running child process
pub trait ProcessKiller {
    fn kill(&mut self) -> std::io::Result<()>;
}
