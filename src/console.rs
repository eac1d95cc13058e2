// src/console.rs
use std::io::{self, Write};

use fontpool_core::{PoolSummary, ProgressObserver};
use tracing::debug;

/// Progress display on a terminal
///
/// Generation output is echoed only while a font is being generated, the way
/// a progress dialog would show it.
pub struct ConsoleObserver<W: Write> {
    out: W,
    generating: bool,
    total: usize,
    loaded: bool,
}

impl ConsoleObserver<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out, generating: false, total: 0, loaded: false }
    }

    pub fn fonts_loaded(&self) -> bool {
        self.loaded
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            debug!("Console write failed: {}", e);
        }
    }
}

impl<W: Write> ProgressObserver for ConsoleObserver<W> {
    fn show_progress(&mut self) {
        self.generating = true;
    }

    fn hide_progress(&mut self) {
        self.generating = false;
    }

    fn fonts_have_been_loaded(&mut self) {
        self.loaded = true;
        self.print("All fonts loaded");
    }

    fn total_fonts_in_job(&mut self, count: usize) {
        self.total = count;
    }

    fn num_found_fonts(&mut self, count: usize) {
        let total = self.total;
        self.print(&format!("  found {}/{}", count, total));
    }

    fn generation_output(&mut self, text: &str) {
        if self.generating {
            self.print(&format!("  | {}", text));
        }
    }

    fn new_resolution_run(&mut self, description: &str) {
        self.print(&format!("{}...", description));
    }

    fn aggregate_status(&mut self, summary: PoolSummary) {
        debug!(
            "{} fonts: {} resolved, {} failed, {} pending",
            summary.total, summary.resolved, summary.failed, summary.pending
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(observer: ConsoleObserver<Vec<u8>>) -> String {
        String::from_utf8(observer.into_inner()).unwrap()
    }

    #[test]
    fn test_run_progress() {
        let mut observer = ConsoleObserver::new(Vec::new());
        observer.new_resolution_run("Locating fonts");
        observer.total_fonts_in_job(2);
        observer.num_found_fonts(1);
        observer.fonts_have_been_loaded();
        assert!(observer.fonts_loaded());
        assert_eq!(output(observer), "Locating fonts...\n  found 1/2\nAll fonts loaded\n");
    }

    #[test]
    fn test_generation_output_only_while_generating() {
        let mut observer = ConsoleObserver::new(Vec::new());
        observer.generation_output("hidden");
        observer.show_progress();
        observer.generation_output("This is METAFONT");
        observer.hide_progress();
        observer.generation_output("hidden again");
        assert_eq!(output(observer), "  | This is METAFONT\n");
    }
}
