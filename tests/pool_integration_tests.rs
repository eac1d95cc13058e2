// tests/pool_integration_tests.rs
//! Integration tests for realistic document scenarios

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use dvifonts::dummy_backend::{DummyLauncher, DummyLoader, DummyObserver, EventLog};
use dvifonts::font::FileLoader;
use dvifonts::{
    ExitStatus, FontKind, FontPool, FontPoolResult, FontProblem, Invocation, LoadStatus, PendingPass, PoolConfig,
    ProcessEvent, ProcessKiller, ProcessLauncher, ProgressEvent, ResolutionState, ResolverProcess,
};
use tempfile::TempDir;

const TEN_PT: u32 = 10 << 16;

fn pk_file(checksum: u32) -> Vec<u8> {
    let mut data = vec![247, 89, 0];
    data.extend_from_slice(&(10u32 << 20).to_be_bytes());
    data.extend_from_slice(&checksum.to_be_bytes());
    data.extend_from_slice(&[0; 8]);
    data.push(248);
    data
}

fn vf_file(checksum: u32, fonts: &[&str]) -> Vec<u8> {
    let mut data = vec![247, 202, 0];
    data.extend_from_slice(&checksum.to_be_bytes());
    data.extend_from_slice(&(10u32 << 20).to_be_bytes());
    for (i, name) in fonts.iter().enumerate() {
        data.extend_from_slice(&[243, i as u8]);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&(1u32 << 20).to_be_bytes());
        data.extend_from_slice(&(10u32 << 20).to_be_bytes());
        data.extend_from_slice(&[0, name.len() as u8]);
        data.extend_from_slice(name.as_bytes());
    }
    data.push(248);
    data
}

struct NoopKiller;

impl ProcessKiller for NoopKiller {
    fn kill(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Resolver over a real directory. Bitmaps listed as generatable are written
/// to disk when a run permits generation.
struct TexmfLauncher {
    root: PathBuf,
    generatable: HashSet<String>,
}

impl TexmfLauncher {
    fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf(), generatable: HashSet::new() }
    }

    fn with_generatable(mut self, file: &str) -> Self {
        self.generatable.insert(file.to_string());
        self
    }
}

impl ProcessLauncher for TexmfLauncher {
    fn launch(&mut self, invocation: &Invocation) -> FontPoolResult<ResolverProcess> {
        let (tx, rx) = async_channel::unbounded();
        let mut output = String::new();
        for file in &invocation.files {
            let path = self.root.join(file);
            if !path.exists() && invocation.generate && self.generatable.contains(file) {
                output.push_str(&format!("kpathsea: Running mktexpk --mfmode {} {}\n", invocation.mode.name, file));
                fs::write(&path, pk_file(0))?;
            }
            if path.exists() {
                output.push_str(&format!("{}\n", path.display()));
            }
        }
        // Deliver in two uneven chunks so lines straddle reads
        let bytes = output.into_bytes();
        let (first, second) = bytes.split_at(bytes.len() / 3);
        let _ = tx.send_blocking(ProcessEvent::Output(first.to_vec()));
        let _ = tx.send_blocking(ProcessEvent::Output(second.to_vec()));
        let _ = tx.send_blocking(ProcessEvent::Exited(ExitStatus::new(0)));
        Ok(ResolverProcess::new(rx, Box::new(NoopKiller)))
    }
}

fn texmf_pool(launcher: TexmfLauncher) -> (FontPool, EventLog) {
    let mut pool = FontPool::with_parts(PoolConfig::default(), Some(Box::new(launcher)), Box::new(FileLoader));
    let observer = DummyObserver::new();
    let log = observer.log();
    pool.set_observer(Box::new(observer));
    (pool, log)
}

#[test]
fn test_missing_font_with_generation_disabled() {
    let launcher = DummyLauncher::new();
    let launches = launcher.log();
    let mut pool = FontPool::with_parts(PoolConfig::default(), Some(Box::new(launcher)), Box::new(DummyLoader::new()));
    pool.set_generation_enabled(false);

    let id = pool.append_font("cmr10", 0, 1, 10, None);
    assert_eq!(pool.wait_until_loaded(), LoadStatus::Done);

    assert_eq!(pool.font(id).map(|f| f.state()), Some(ResolutionState::Failed));
    assert_eq!(launches.generation_launches(), 0);
    assert_eq!(pool.check_if_fonts_are_loaded(0), LoadStatus::Done);
}

#[test]
fn test_document_with_virtual_font_from_disk() {
    let dir = TempDir::new().expect("create texmf dir");
    fs::write(dir.path().join("ptmr7t.vf"), vf_file(0o777, &["ptmr8r"])).unwrap();
    fs::write(dir.path().join("ptmr8r.600pk"), pk_file(0o123)).unwrap();
    fs::write(dir.path().join("cmr10.600pk"), pk_file(0o456)).unwrap();

    let (mut pool, events) = texmf_pool(TexmfLauncher::new(dir.path()));
    let vf = pool.append_font("ptmr7t", 0o777, TEN_PT, TEN_PT, None);
    let cmr = pool.append_font("cmr10", 0o456, TEN_PT, TEN_PT, None);
    assert_eq!(pool.wait_until_loaded(), LoadStatus::Done);

    let vf_font = pool.font(vf).unwrap();
    assert_eq!(vf_font.kind(), FontKind::Virtual);
    assert_eq!(vf_font.loaded().map(|l| l.definitions.len()), Some(1));
    assert_eq!(pool.font(cmr).map(|f| f.kind()), Some(FontKind::Bitmap));

    let child = pool.find("ptmr8r", 0, TEN_PT, TEN_PT).expect("font of the virtual font");
    let child = pool.font(child).unwrap();
    assert_eq!(child.parent(), Some(vf));
    assert_eq!(child.state(), ResolutionState::Resolved);
    assert_eq!(child.loaded().map(|l| l.checksum), Some(0o123));

    assert_eq!(pool.summary().resolved, 3);
    assert_eq!(events.count(&ProgressEvent::FontsLoaded), 1);
    assert!(events.contains(&ProgressEvent::NewResolutionRun("Locating fonts".into())));
}

#[test]
fn test_generated_bitmap_is_loaded() {
    let dir = TempDir::new().expect("create texmf dir");
    let launcher = TexmfLauncher::new(dir.path()).with_generatable("cmss10.600pk");
    let (mut pool, events) = texmf_pool(launcher);

    let id = pool.append_font("cmss10", 0, TEN_PT, TEN_PT, None);
    assert_eq!(pool.wait_until_loaded(), LoadStatus::Done);

    assert_eq!(pool.font(id).map(|f| f.state()), Some(ResolutionState::Resolved));
    assert!(dir.path().join("cmss10.600pk").exists());
    assert!(events.contains(&ProgressEvent::ShowProgress));
    assert!(events.contains(&ProgressEvent::HideProgress));
}

#[test]
fn test_cache_survives_document_switch() {
    let launcher = DummyLauncher::new().with_files(&["cmr10.600pk", "cmbx10.600pk"]);
    let launches = launcher.log();
    let mut pool = FontPool::with_parts(PoolConfig::default(), Some(Box::new(launcher)), Box::new(DummyLoader::new()));

    let first = pool.append_font("cmr10", 0, TEN_PT, TEN_PT, None);
    pool.wait_until_loaded();
    assert_eq!(launches.launch_count(), 1);

    // Second document reuses cmr10 and adds cmbx10
    pool.mark_fonts_as_unused();
    assert_eq!(pool.append_font("cmr10", 0, TEN_PT, TEN_PT, None), first);
    pool.append_font("cmbx10", 0, TEN_PT, TEN_PT, None);
    pool.release_fonts();
    pool.wait_until_loaded();

    let second = launches.invocations().remove(1);
    assert_eq!(second.files, vec!["cmbx10.vf".to_string(), "cmbx10.600pk".to_string()]);
    assert_eq!(pool.font(first).map(|f| f.state()), Some(ResolutionState::Resolved));
}

#[test]
fn test_release_only_drops_unused_fonts() {
    let launcher = DummyLauncher::new().with_files(&["cmr10.600pk", "cmtt10.600pk"]);
    let mut pool = FontPool::with_parts(PoolConfig::default(), Some(Box::new(launcher)), Box::new(DummyLoader::new()));
    pool.append_font("cmr10", 0, TEN_PT, TEN_PT, None);
    pool.append_font("cmtt10", 0, TEN_PT, TEN_PT, None);
    pool.wait_until_loaded();

    pool.mark_fonts_as_unused();
    let kept = pool.append_font("cmtt10", 0, TEN_PT, TEN_PT, None);
    pool.release_fonts();

    let names: Vec<&str> = pool.fonts().iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["cmtt10"]);
    assert!(pool.font(kept).unwrap().is_in_use());

    // A released font comes back as a new entity
    let again = pool.append_font("cmr10", 0, TEN_PT, TEN_PT, None);
    assert_eq!(pool.font(again).map(|f| f.state()), Some(ResolutionState::Unresolved));
}

#[test]
fn test_virtual_font_reused_by_next_document() {
    let dir = TempDir::new().expect("create texmf dir");
    fs::write(dir.path().join("ptmr7t.vf"), vf_file(0, &["ptmr8r"])).unwrap();
    fs::write(dir.path().join("ptmr8r.600pk"), pk_file(0)).unwrap();
    let (mut pool, _) = texmf_pool(TexmfLauncher::new(dir.path()));

    let vf = pool.append_font("ptmr7t", 0, TEN_PT, TEN_PT, None);
    pool.wait_until_loaded();
    let child = pool.find("ptmr8r", 0, TEN_PT, TEN_PT).expect("font of the virtual font");

    // The next document only names the virtual font
    pool.mark_fonts_as_unused();
    assert_eq!(pool.append_font("ptmr7t", 0, TEN_PT, TEN_PT, None), vf);
    pool.release_fonts();
    assert_eq!(pool.wait_until_loaded(), LoadStatus::Done);

    assert_eq!(pool.find("ptmr8r", 0, TEN_PT, TEN_PT), Some(child));
    assert_eq!(pool.font(child).map(|f| f.state()), Some(ResolutionState::Resolved));
    assert!(pool.font(child).unwrap().loaded().is_some());
}

#[test]
fn test_checksum_mismatch_from_disk() {
    let dir = TempDir::new().expect("create texmf dir");
    fs::write(dir.path().join("cmr10.600pk"), pk_file(0o1111)).unwrap();
    let (mut pool, _) = texmf_pool(TexmfLauncher::new(dir.path()));

    let id = pool.append_font("cmr10", 0o2222, TEN_PT, TEN_PT, None);
    pool.wait_until_loaded();

    let font = pool.font(id).unwrap();
    assert_eq!(font.state(), ResolutionState::Resolved);
    assert_eq!(font.problem(), Some(&FontProblem::ChecksumMismatch { expected: 0o2222, found: 0o1111 }));
    assert!(pool.status().contains("checksum mismatch"));
}

#[test]
fn test_reset_and_reload_from_disk() {
    let dir = TempDir::new().expect("create texmf dir");
    fs::write(dir.path().join("cmr10.600pk"), pk_file(7)).unwrap();
    let (mut pool, _) = texmf_pool(TexmfLauncher::new(dir.path()));
    let id = pool.append_font("cmr10", 7, TEN_PT, TEN_PT, None);
    pool.wait_until_loaded();

    pool.reset_fonts();
    assert!(pool.font(id).unwrap().loaded().is_none());
    let reloaded = pool.font_data(id).expect("reloaded from the located file");
    assert_eq!(reloaded.checksum, 7);
    assert_eq!(reloaded.bytes().len(), pk_file(7).len());
}

#[test]
fn test_mode_switch_between_documents() {
    let launcher = DummyLauncher::new().with_files(&["cmr10.600pk", "cmr10.1200pk"]);
    let launches = launcher.log();
    let mut pool = FontPool::with_parts(PoolConfig::default(), Some(Box::new(launcher)), Box::new(DummyLoader::new()));

    pool.append_font("cmr10", 0, TEN_PT, TEN_PT, None);
    pool.wait_until_loaded();

    assert_eq!(pool.set_resolution_mode(2), 2);
    let hires = pool.append_font("cmr10", 0, TEN_PT * 2, TEN_PT * 2, None);
    pool.wait_until_loaded();

    let last = launches.invocations().pop().unwrap();
    assert_eq!(last.mode.name, "lexmarks");
    assert_eq!(pool.font(hires).map(|f| f.dpi()), Some(1200));
    assert_eq!(pool.font(hires).map(|f| f.state()), Some(ResolutionState::Resolved));
}

#[test]
fn test_no_second_run_while_one_is_in_flight() {
    let dir = TempDir::new().expect("create texmf dir");
    fs::write(dir.path().join("cmr10.600pk"), pk_file(0)).unwrap();
    let (mut pool, _) = texmf_pool(TexmfLauncher::new(dir.path()));

    pool.append_font("cmr10", 0, TEN_PT, TEN_PT, None);
    assert_eq!(pool.check_if_fonts_are_loaded(0), LoadStatus::Pending);
    assert_eq!(pool.pending_pass(), PendingPass::VirtualFontPass);
    assert_eq!(pool.check_if_fonts_are_loaded(0), LoadStatus::Pending);
    assert_eq!(pool.check_if_fonts_are_loaded(1), LoadStatus::Pending);

    while pool.process_pending_events() > 0 {}
    assert!(!pool.is_busy());
    assert_eq!(pool.load_status(), LoadStatus::Done);
}
