//! The font pool
//!
//! Holds every font the open documents refer to and drives a concurrently
//! running kpsewhich to find (and, if allowed, generate) their files.
//!
//! Resolution runs in two passes. The first looks for virtual fonts, and for
//! bitmaps that already exist, without ever generating anything. Virtual
//! fonts found there are loaded right away and may append further bitmap
//! fonts, which is why the second pass only starts after the first run has
//! terminated. The second pass locates the remaining bitmap fonts and lets
//! mktexpk create the missing ones when generation is enabled.
//!
//! The pool never blocks: a run is started and control returns to the caller,
//! which later feeds the run's events back in through
//! [`FontPool::process_pending_events`]. Only one run is in flight at a time.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use kpse_output::{basename, OutputLine};
use tracing::{debug, error, info, trace, warn};

use crate::config::PoolConfig;
use crate::error::{FontPoolError, FontPoolResult};
use crate::font::{
    scale_fix_word, scaled_dpi, FileLoader, FontDefinition, FontEntity, FontId, FontKey, FontKind,
    FontLoader, FontProblem, LoadRequest, LoadedFont, ResolutionState,
};
use crate::mode::{clamp_mode, mode, ResolutionMode, NUMBER_OF_MODES};
use crate::resolver::{ExitStatus, Invocation, PendingPass, ResolverMessage, ResolverProcess};
use crate::traits::{PoolSummary, ProcessLauncher, ProgressObserver};

/// Answer of [`FontPool::check_if_fonts_are_loaded`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Every font is settled; rendering can start
    Done,
    /// A resolver run is in flight
    Pending,
}

struct ActiveBatch {
    pass: PendingPass,
    members: Vec<FontId>,
    outstanding: usize,
    process: ResolverProcess,
}

pub struct FontPool {
    config: PoolConfig,
    fonts: Vec<FontEntity>,
    index: HashMap<FontKey, FontId>,
    next_id: u64,
    mode: usize,
    generation_enabled: bool,
    batch: Option<ActiveBatch>,
    /// Set once "fonts have been loaded" went out for the current document
    loaded_notified: bool,
    generation_log: String,
    observer: Option<Box<dyn ProgressObserver>>,
    loader: Box<dyn FontLoader>,
    launcher: Option<Box<dyn ProcessLauncher>>,
}

impl FontPool {
    /// Pool with default configuration, reading fonts from disk
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        Self::with_parts(config, default_launcher(), Box::new(FileLoader))
    }

    /// Pool with explicit collaborators
    pub fn with_parts(
        config: PoolConfig,
        launcher: Option<Box<dyn ProcessLauncher>>,
        loader: Box<dyn FontLoader>,
    ) -> Self {
        debug!(
            "Creating FontPool: program={}, mode={}, generation={}",
            config.program, config.mode, config.generation_enabled
        );
        Self {
            mode: clamp_mode(config.mode),
            generation_enabled: config.generation_enabled,
            config,
            fonts: Vec::new(),
            index: HashMap::new(),
            next_id: 0,
            batch: None,
            loaded_notified: false,
            generation_log: String::new(),
            observer: None,
            loader,
            launcher,
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observer = Some(observer);
    }

    pub fn take_observer(&mut self) -> Option<Box<dyn ProgressObserver>> {
        self.observer.take()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Select the MetaFont mode for fonts appended from now on
    ///
    /// Returns the mode actually applied: an out-of-range index selects
    /// [`DEFAULT_MODE`](crate::mode::DEFAULT_MODE). Fonts that already exist
    /// keep the resolution they were created with, and a run that is already
    /// in flight finishes with the old mode; switching modes while fonts are
    /// being resolved therefore leaves the pool with mixed resolutions.
    pub fn set_resolution_mode(&mut self, index: usize) -> usize {
        let applied = clamp_mode(index);
        if applied != index {
            debug!(
                "{}, using {}",
                FontPoolError::InvalidModeIndex { index, count: NUMBER_OF_MODES },
                applied
            );
        }
        if self.batch.is_some() && applied != self.mode {
            warn!("Resolution mode changed while fonts are being resolved");
        }
        self.mode = applied;
        applied
    }

    pub fn resolution_mode(&self) -> usize {
        self.mode
    }

    pub fn mode(&self) -> &'static ResolutionMode {
        mode(self.mode)
    }

    /// Whether missing bitmaps may be generated by MetaFont
    pub fn set_generation_enabled(&mut self, enabled: bool) {
        self.generation_enabled = enabled;
    }

    pub fn generation_enabled(&self) -> bool {
        self.generation_enabled
    }

    /// Register a font used by the current document
    ///
    /// Requests for a font that is already known, from this document or an
    /// earlier one, return the existing entity and only mark it in use.
    /// A new font starts out unresolved; call
    /// [`check_if_fonts_are_loaded`](Self::check_if_fonts_are_loaded) to have
    /// it looked up. Nothing is resolved before this returns.
    pub fn append_font(
        &mut self,
        name: &str,
        checksum: u32,
        scale: u32,
        design: u32,
        parent: Option<FontId>,
    ) -> FontId {
        let key = FontKey { name: name.to_string(), checksum, scale, design };
        if let Some(&id) = self.index.get(&key) {
            self.mark_in_use(id);
            return id;
        }

        let id = FontId(self.next_id);
        self.next_id += 1;
        let dpi = scaled_dpi(scale, design, self.config.magnification, self.mode().dpi);
        debug!("Appending font {} {} at {} dpi (parent {:?})", name, id, dpi, parent);
        self.fonts.push(FontEntity::new(id, key.clone(), parent, dpi));
        self.index.insert(key, id);
        self.loaded_notified = false;
        id
    }

    /// Mark a font in use together with every font its virtual font table
    /// pulled in, directly or through nested virtual fonts
    fn mark_in_use(&mut self, id: FontId) {
        let mut used = HashSet::from([id]);
        // Dependencies are always appended after the font that declares them
        for font in self.fonts.iter_mut() {
            if font.id == id || font.parent.is_some_and(|p| used.contains(&p)) {
                used.insert(font.id);
                font.in_use = true;
                trace!("Reusing font {} {} ({})", font.key.name, font.id, font.state.label());
            }
        }
    }

    /// Drive the resolution pipeline one step
    ///
    /// Hosts call this with `pass == 0` after appending a document's fonts;
    /// the pool re-enters it with `pass == 1` whenever a resolver run
    /// terminates. While a run is in flight this only reports `Pending`.
    /// The aggregate status goes to the observer on every call.
    pub fn check_if_fonts_are_loaded(&mut self, pass: u8) -> LoadStatus {
        self.emit_status();

        if self.batch.is_some() {
            trace!("Resolver still running, not starting another run");
            return LoadStatus::Pending;
        }

        if pass == 0 {
            let candidates: Vec<FontId> = self
                .fonts
                .iter()
                .filter(|f| f.state == ResolutionState::Unresolved && f.parent.is_none() && !f.virtual_probed)
                .map(|f| f.id)
                .collect();
            if !candidates.is_empty() {
                match self.start_batch(PendingPass::VirtualFontPass, candidates.clone(), false) {
                    Ok(()) => return LoadStatus::Pending,
                    Err(e) => {
                        error!("Could not start font lookup: {}", e);
                        for id in candidates {
                            if let Some(font) = self.font_mut(id) {
                                font.virtual_probed = true;
                            }
                        }
                    }
                }
            }
        }

        self.run_bitmap_pass()
    }

    fn run_bitmap_pass(&mut self) -> LoadStatus {
        let generate = self.generation_enabled;
        let mut members = Vec::new();
        for font in self.fonts.iter_mut().filter(|f| f.state == ResolutionState::Unresolved) {
            // A locate-only lookup already happened in the first pass; repeating
            // it cannot turn up anything new.
            if font.virtual_probed && !generate {
                mark_unresolved(font);
            } else {
                members.push(font.id);
            }
        }

        if !members.is_empty() {
            match self.start_batch(PendingPass::BitmapPass, members.clone(), generate) {
                Ok(()) => return LoadStatus::Pending,
                Err(e) => {
                    error!("Could not start bitmap font lookup: {}", e);
                    for id in members {
                        if let Some(font) = self.font_mut(id) {
                            mark_unresolved(font);
                        }
                    }
                }
            }
        }

        if !self.loaded_notified {
            self.loaded_notified = true;
            info!("All fonts settled: {}", self.summary_line());
            self.notify(|o| {
                o.hide_progress();
                o.fonts_have_been_loaded();
            });
        }
        LoadStatus::Done
    }

    fn start_batch(&mut self, pass: PendingPass, members: Vec<FontId>, generate: bool) -> FontPoolResult<()> {
        let mut files = Vec::with_capacity(members.len() * 2);
        for font in members.iter().filter_map(|&id| self.font(id)) {
            if pass == PendingPass::VirtualFontPass {
                files.push(font.vf_file_name());
            }
            files.push(font.pk_file_name());
        }

        let invocation = Invocation {
            program: self.config.program.clone(),
            extra_args: self.config.extra_args.clone(),
            env: self.config.env.clone(),
            mode: *self.mode(),
            generate,
            pass,
            files,
        };

        let launcher = self.launcher.as_mut().ok_or(FontPoolError::NoLauncher)?;
        let process = launcher.launch(&invocation)?;

        let state = if generate { ResolutionState::PendingGenerate } else { ResolutionState::PendingLocate };
        for &id in &members {
            if let Some(font) = self.font_mut(id) {
                font.state = state;
                match pass {
                    PendingPass::VirtualFontPass => font.virtual_probed = true,
                    _ => font.bitmap_probed = true,
                }
            }
        }

        info!("{}: {} fonts ({})", invocation.describe(), members.len(), invocation.command_line());
        let description = invocation.describe();
        let count = members.len();
        self.notify(|o| {
            o.new_resolution_run(&description);
            o.total_fonts_in_job(count);
        });

        self.batch = Some(ActiveBatch { pass, outstanding: count, members, process });
        Ok(())
    }

    /// Handle every resolver event that is available without waiting
    ///
    /// Events are handled one at a time, each to completion, in the order the
    /// child produced them. Returns the number of events handled.
    pub fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(message) = self.batch.as_mut().and_then(|b| b.process.try_next()) {
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    /// Block until no resolver run is left, for hosts without an event loop
    pub fn wait_until_loaded(&mut self) -> LoadStatus {
        self.check_if_fonts_are_loaded(0);
        while let Some(batch) = self.batch.as_mut() {
            match batch.process.next_blocking() {
                Some(message) => self.handle_message(message),
                None => {
                    warn!("Resolver finished without reporting termination");
                    self.finish_batch(ExitStatus::lost());
                }
            }
        }
        self.load_status()
    }

    fn handle_message(&mut self, message: ResolverMessage) {
        match message {
            ResolverMessage::Line(line) => self.handle_line(line),
            ResolverMessage::Terminated(status) => self.finish_batch(status),
        }
    }

    fn handle_line(&mut self, line: OutputLine) {
        match line {
            OutputLine::Found(path) => self.handle_found(path),
            OutputLine::GenerationStarted { font, dpi } => {
                let text = match dpi {
                    Some(dpi) => format!("Currently generating {} at {} dpi", font, dpi),
                    None => format!("Currently generating {}", font),
                };
                info!("{}", text);
                self.notify(|o| {
                    o.show_progress();
                    o.generation_output(&text);
                });
            }
            OutputLine::Unresolved { font } => self.handle_unresolved(&font),
            OutputLine::Diagnostic(text) => self.notify(|o| o.generation_output(&text)),
            OutputLine::Blank => {}
        }
    }

    fn handle_found(&mut self, path: PathBuf) {
        let Some(batch) = self.batch.as_ref() else { return };
        let text = path.to_string_lossy();
        let file = basename(&text);
        let pass = batch.pass;

        let target = batch.members.iter().copied().find(|&id| {
            self.font(id).is_some_and(|f| {
                f.state.is_pending()
                    && (f.pk_file_name() == file || (pass == PendingPass::VirtualFontPass && f.vf_file_name() == file))
            })
        });
        drop(text);
        match target {
            Some(id) => self.resolve_font(id, path),
            None => debug!("Ignoring {} (not requested or already resolved)", path.display()),
        }
    }

    fn resolve_font(&mut self, id: FontId, path: PathBuf) {
        let Some(pos) = self.position(id) else { return };
        let result = {
            let font = &self.fonts[pos];
            self.loader.load(&LoadRequest {
                name: &font.key.name,
                path: &path,
                checksum: font.key.checksum,
                scale: font.key.scale,
                design: font.key.design,
            })
        };

        let font = &mut self.fonts[pos];
        font.filename = Some(path);
        let mut definitions: Vec<FontDefinition> = Vec::new();
        match result {
            Ok(loaded) => {
                font.kind = if loaded.is_virtual() { FontKind::Virtual } else { FontKind::Bitmap };
                check_checksum(font, &loaded);
                if loaded.is_virtual() {
                    definitions = loaded.definitions.clone();
                }
                font.loaded = Some(loaded);
                font.state = ResolutionState::Resolved;
                debug!("Resolved {} as {:?}", font.key.name, font.kind);
            }
            Err(e) => {
                warn!("Could not load font {}: {}", font.key.name, e);
                font.state = ResolutionState::Failed;
                font.problem = Some(FontProblem::LoadFailed(e.to_string()));
            }
        }
        let parent_scale = font.key.scale;

        self.settle_member(true);

        // Fonts a virtual font is built from are looked up in the second pass
        for def in definitions {
            let scale = scale_fix_word(parent_scale, def.scale);
            // VF design sizes count 2^-20 pt, DVI sizes 2^-16 pt
            let design = def.design >> 4;
            self.append_font(&def.name, def.checksum, scale, design, Some(id));
        }
    }

    fn handle_unresolved(&mut self, name: &str) {
        let Some(batch) = self.batch.as_ref() else { return };
        let target = batch
            .members
            .iter()
            .copied()
            .find(|&id| self.font(id).is_some_and(|f| f.state.is_pending() && f.key.name == name));
        let Some(id) = target else {
            debug!("Resolver gave up on {}, which is not part of this run", name);
            return;
        };
        if let Some(font) = self.font_mut(id) {
            mark_unresolved(font);
        }
        self.settle_member(false);
    }

    /// Bookkeeping after one member of the running batch settled
    fn settle_member(&mut self, found: bool) {
        let Some(batch) = self.batch.as_mut() else { return };
        batch.outstanding = batch.outstanding.saturating_sub(1);
        if found {
            let count = batch.process.count_found();
            self.notify(|o| o.num_found_fonts(count));
        }
    }

    fn finish_batch(&mut self, status: ExitStatus) {
        let Some(batch) = self.batch.take() else { return };
        self.generation_log = batch.process.transcript().to_string();

        if !status.success() {
            // kpsewhich exits non-zero whenever a file was not found
            debug!("{}", FontPoolError::ProcessAbnormalExit { code: status.code });
        }
        info!(
            "{:?} finished: {} of {} fonts settled",
            batch.pass,
            batch.members.len() - batch.outstanding,
            batch.members.len()
        );

        for &id in &batch.members {
            let Some(font) = self.font_mut(id) else { continue };
            if !font.state.is_pending() {
                continue;
            }
            match batch.pass {
                PendingPass::VirtualFontPass => font.state = ResolutionState::Unresolved,
                _ => mark_unresolved(font),
            }
        }
        drop(batch);

        self.check_if_fonts_are_loaded(1);
    }

    /// Kill the running resolver
    ///
    /// Fonts that were part of the run stay pending for the rest of the
    /// session; no retry is scheduled.
    pub fn abort_generation(&mut self) {
        if let Some(mut batch) = self.batch.take() {
            batch.process.kill();
            self.generation_log = batch.process.transcript().to_string();
            warn!("Font generation aborted with {} fonts outstanding", batch.outstanding);
        }
        self.notify(|o| o.hide_progress());
    }

    /// Mark every font unused; called when a document is closed
    ///
    /// Fonts stay loaded so the next document can reuse them; see
    /// [`release_fonts`](Self::release_fonts).
    pub fn mark_fonts_as_unused(&mut self) {
        for font in &mut self.fonts {
            font.in_use = false;
        }
        self.loaded_notified = false;
    }

    /// Drop every font that is not in use
    pub fn release_fonts(&mut self) {
        let before = self.fonts.len();
        let index = &mut self.index;
        self.fonts.retain(|font| {
            if !font.in_use {
                index.remove(&font.key);
            }
            font.in_use
        });
        debug!("Released {} unused fonts, {} remain", before - self.fonts.len(), self.fonts.len());
    }

    /// Release the loaded data of every font but keep the fonts themselves
    ///
    /// Used when display parameters change. Resolved fonts keep their file
    /// name and are reloaded on demand by [`font_data`](Self::font_data).
    pub fn reset_fonts(&mut self) {
        for font in &mut self.fonts {
            font.release_loaded();
        }
    }

    /// Loaded data of a resolved font, reloading it after a reset
    pub fn font_data(&mut self, id: FontId) -> Option<&LoadedFont> {
        let pos = self.position(id)?;
        if self.fonts[pos].state == ResolutionState::Resolved && self.fonts[pos].loaded.is_none() {
            let result = {
                let font = &self.fonts[pos];
                let path = font.filename.as_ref()?;
                self.loader.load(&LoadRequest {
                    name: &font.key.name,
                    path,
                    checksum: font.key.checksum,
                    scale: font.key.scale,
                    design: font.key.design,
                })
            };
            match result {
                Ok(loaded) => self.fonts[pos].loaded = Some(loaded),
                Err(e) => warn!("Reloading font {} failed: {}", self.fonts[pos].key.name, e),
            }
        }
        self.fonts[pos].loaded.as_ref()
    }

    pub fn font(&self, id: FontId) -> Option<&FontEntity> {
        self.fonts.iter().find(|f| f.id == id)
    }

    fn font_mut(&mut self, id: FontId) -> Option<&mut FontEntity> {
        self.fonts.iter_mut().find(|f| f.id == id)
    }

    fn position(&self, id: FontId) -> Option<usize> {
        self.fonts.iter().position(|f| f.id == id)
    }

    /// Fonts in the order they were first requested
    pub fn fonts(&self) -> &[FontEntity] {
        &self.fonts
    }

    pub fn find(&self, name: &str, checksum: u32, scale: u32, design: u32) -> Option<FontId> {
        let key = FontKey { name: name.to_string(), checksum, scale, design };
        self.index.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.batch.is_some()
    }

    pub fn pending_pass(&self) -> PendingPass {
        self.batch.as_ref().map_or(PendingPass::None, |b| b.pass)
    }

    /// Fonts of the running batch that have not settled yet
    pub fn outstanding(&self) -> usize {
        self.batch.as_ref().map_or(0, |b| b.outstanding)
    }

    /// MetaFont output of the running run, or of the last one
    pub fn generation_log(&self) -> &str {
        match &self.batch {
            Some(batch) => batch.process.transcript(),
            None => &self.generation_log,
        }
    }

    /// `Done` once no font is waiting for a lookup and no run is in flight
    pub fn load_status(&self) -> LoadStatus {
        if self.batch.is_some() || self.fonts.iter().any(|f| f.state == ResolutionState::Unresolved) {
            LoadStatus::Pending
        } else {
            LoadStatus::Done
        }
    }

    pub fn summary(&self) -> PoolSummary {
        let mut summary = PoolSummary { total: self.fonts.len(), ..PoolSummary::default() };
        for font in &self.fonts {
            match font.state {
                ResolutionState::Resolved => summary.resolved += 1,
                ResolutionState::Failed => summary.failed += 1,
                ResolutionState::Unresolved => summary.unresolved += 1,
                ResolutionState::PendingLocate | ResolutionState::PendingGenerate => summary.pending += 1,
            }
            if font.in_use {
                summary.in_use += 1;
            }
            if font.checksum_mismatch() {
                summary.checksum_mismatches += 1;
            }
        }
        summary
    }

    fn summary_line(&self) -> String {
        let s = self.summary();
        format!(
            "{} fonts, {} resolved, {} failed, {} pending, {} unresolved",
            s.total, s.resolved, s.failed, s.pending, s.unresolved
        )
    }

    /// Human-readable report of every font, for diagnostics only
    pub fn status(&self) -> String {
        let mode = self.mode();
        let mut out = format!(
            "Font pool: {}\nMode {} ({}, {} dpi), generation {}\n",
            self.summary_line(),
            mode.name,
            mode.label,
            mode.dpi,
            if self.generation_enabled { "enabled" } else { "disabled" }
        );
        if self.fonts.is_empty() {
            return out;
        }
        out.push_str(&format!(
            "{:<14} {:>12} {:>6} {:<10} {:<7} {}\n",
            "NAME", "CHECKSUM", "DPI", "STATE", "IN USE", "FILE"
        ));
        for font in &self.fonts {
            let mut file = match &font.filename {
                Some(path) => path.display().to_string(),
                None => "-".to_string(),
            };
            if let Some(problem) = &font.problem {
                file.push_str(&format!(" [{}]", problem));
            }
            if let Some(parent) = font.parent.and_then(|p| self.font(p)) {
                file.push_str(&format!(" (from {})", parent.name()));
            }
            out.push_str(&format!(
                "{:<14} {:>12o} {:>6} {:<10} {:<7} {}\n",
                font.key.name,
                font.key.checksum,
                font.dpi,
                font.state.label(),
                if font.in_use { "yes" } else { "no" },
                file
            ));
        }
        out
    }

    fn emit_status(&mut self) {
        let summary = self.summary();
        self.notify(|o| o.aggregate_status(summary));
    }

    fn notify<F: FnOnce(&mut dyn ProgressObserver)>(&mut self, f: F) {
        if let Some(observer) = self.observer.as_mut() {
            f(observer.as_mut());
        }
    }
}

impl Default for FontPool {
    fn default() -> Self {
        Self::new()
    }
}

fn mark_unresolved(font: &mut FontEntity) {
    warn!("{}", FontPoolError::FontUnresolved { font: font.key.name.clone() });
    font.state = ResolutionState::Failed;
    font.problem = Some(FontProblem::Unresolved);
}

/// Flag a differing checksum; a zero on either side means "don't check"
fn check_checksum(font: &mut FontEntity, loaded: &LoadedFont) {
    let expected = font.key.checksum;
    let found = loaded.checksum;
    if expected != 0 && found != 0 && expected != found {
        warn!("{}", FontPoolError::ChecksumMismatch { font: font.key.name.clone(), expected, found });
        font.problem = Some(FontProblem::ChecksumMismatch { expected, found });
    }
}

#[cfg(feature = "pty")]
fn default_launcher() -> Option<Box<dyn ProcessLauncher>> {
    Some(Box::new(crate::pty::PtyLauncher::new()))
}

#[cfg(not(feature = "pty"))]
fn default_launcher() -> Option<Box<dyn ProcessLauncher>> {
    None
}
