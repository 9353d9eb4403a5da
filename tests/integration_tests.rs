/// Integration tests for dirsort
///
/// These tests exercise complete passes and the watch loop against real
/// temporary directories.
///
/// Test categories:
/// 1. One-shot organization
/// 2. Idempotence and directory handling
/// 3. Collisions
/// 4. Configuration
/// 5. Watch loop
use dirsort::category::{Category, CategoryMap};
use dirsort::config::OrganizerConfig;
use dirsort::organizer::{Organizer, PassReport, organize_pass};
use dirsort::watcher::{WatchState, start_watch_with};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary root directory with helpers for building and checking layouts.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        TestFixture { temp_dir }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn create_file(&self, name: &str, content: &[u8]) {
        let file_path = self.path().join(name);
        let mut file = File::create(&file_path).expect("Failed to create file");
        file.write_all(content)
            .expect("Failed to write file content");
    }

    fn create_text_file(&self, name: &str, content: &str) {
        self.create_file(name, content.as_bytes());
    }

    fn create_subdir(&self, name: &str) {
        fs::create_dir(self.path().join(name)).expect("Failed to create subdirectory");
    }

    fn read(&self, rel_path: &str) -> String {
        fs::read_to_string(self.path().join(rel_path))
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", rel_path, e))
    }

    fn assert_dir_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_dir(), "Directory should exist: {}", path.display());
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    /// Names of the top-level entries, sorted.
    fn top_level(&self) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(self.path())
            .expect("Failed to read directory")
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    /// Names of the files inside a category folder, sorted.
    fn files_in(&self, rel_dir: &str) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(self.path().join(rel_dir))
            .expect("Failed to read directory")
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn organize(&self) -> PassReport {
        organize_pass(self.path(), &CategoryMap::default()).expect("pass failed")
    }
}

fn default_category_names() -> Vec<String> {
    CategoryMap::default()
        .iter()
        .map(|c| c.name().to_string())
        .collect()
}

// ============================================================================
// 1. One-shot organization
// ============================================================================

#[test]
fn test_mixed_directory_example() {
    let fixture = TestFixture::new();
    fixture.create_text_file("photo.JPG", "jpeg");
    fixture.create_text_file("notes.txt", "notes");
    fixture.create_text_file("archive.zip", "zip");
    fixture.create_subdir("sub");

    let report = fixture.organize();

    fixture.assert_file_exists("图片/photo.JPG");
    fixture.assert_file_exists("文档/notes.txt");
    fixture.assert_file_exists("压缩包/archive.zip");
    fixture.assert_dir_exists("sub");

    let mut expected = default_category_names();
    expected.push("sub".to_string());
    expected.sort();
    assert_eq!(fixture.top_level(), expected);

    assert_eq!(report.moved_count(), 3);
    assert_eq!(report.skipped_count(), 0);
    assert!(report.is_clean());
}

#[test]
fn test_every_default_category_receives_its_files() {
    let fixture = TestFixture::new();
    let files = [
        ("a.png", "图片"),
        ("b.docx", "文档"),
        ("c.flac", "音频"),
        ("d.mkv", "视频"),
        ("e.7z", "压缩包"),
        ("f.sh", "程序"),
    ];
    for (name, _) in files {
        fixture.create_text_file(name, name);
    }

    fixture.organize();

    for (name, category) in files {
        fixture.assert_file_not_exists(name);
        assert_eq!(fixture.read(&format!("{}/{}", category, name)), name);
    }
}

#[test]
fn test_unrecognized_files_untouched() {
    let fixture = TestFixture::new();
    fixture.create_text_file("data.xyz", "payload");
    fixture.create_text_file("README", "readme");
    fixture.create_text_file(".env", "SECRET=1");

    let report = fixture.organize();

    assert_eq!(fixture.read("data.xyz"), "payload");
    assert_eq!(fixture.read("README"), "readme");
    assert_eq!(fixture.read(".env"), "SECRET=1");
    assert_eq!(report.skipped_count(), 3);
    assert_eq!(report.moved_count(), 0);
}

#[test]
fn test_missing_root_has_no_side_effects() {
    let fixture = TestFixture::new();
    let missing = fixture.path().join("not-here");

    let result = organize_pass(&missing, &CategoryMap::default());

    assert!(result.is_err());
    assert!(!missing.exists());
    assert!(fixture.top_level().is_empty());
}

#[test]
fn test_dry_run_reports_without_moving() {
    let fixture = TestFixture::new();
    fixture.create_text_file("song.mp3", "la");
    fixture.create_text_file("misc.bin", "?");

    let report = Organizer::new(fixture.path())
        .dry_run(true)
        .run(&CategoryMap::default())
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.moved_count(), 1);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(fixture.top_level(), vec!["misc.bin", "song.mp3"]);
}

#[cfg(unix)]
#[test]
fn test_non_utf8_file_name_is_organized() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let fixture = TestFixture::new();
    let name = OsStr::from_bytes(b"caf\xe9.txt");
    fs::write(fixture.path().join(name), "menu").unwrap();

    let report = fixture.organize();

    assert_eq!(report.moved_count(), 1);
    assert_eq!(report.skipped_count(), 0);
    assert!(report.is_clean());
    assert!(!fixture.path().join(name).exists());
    assert_eq!(
        fs::read_to_string(fixture.path().join("文档").join(name)).unwrap(),
        "menu"
    );
}

#[test]
fn test_report_serializes_to_json() {
    let fixture = TestFixture::new();
    fixture.create_text_file("clip.mov", "v");

    let report = fixture.organize();
    let json: serde_json::Value = serde_json::to_value(&report).unwrap();

    assert_eq!(json["dry_run"], false);
    assert_eq!(json["moved"][0]["category"], "视频");
    assert!(json["failures"].as_array().unwrap().is_empty());
}

// ============================================================================
// 2. Idempotence and directory handling
// ============================================================================

#[test]
fn test_second_pass_moves_nothing() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "a");
    fixture.create_text_file("b.png", "b");
    fixture.create_text_file("c.unknown", "c");

    let first = fixture.organize();
    let layout = fixture.top_level();
    let second = fixture.organize();

    assert_eq!(first.moved_count(), 2);
    assert_eq!(second.moved_count(), 0);
    assert!(second.created_folders.is_empty());
    assert_eq!(fixture.top_level(), layout);
    assert_eq!(fixture.files_in("文档"), vec!["a.txt"]);
}

#[test]
fn test_directories_are_never_moved() {
    let fixture = TestFixture::new();
    fixture.create_subdir("holiday.png");
    fixture.create_subdir("projects");
    fixture.create_text_file("projects/inner.txt", "inner");

    let report = fixture.organize();

    fixture.assert_dir_exists("holiday.png");
    fixture.assert_file_exists("projects/inner.txt");
    assert!(fixture.files_in("图片").is_empty());
    assert_eq!(report.moved_count(), 0);
    assert_eq!(report.skipped_count(), 0);
}

#[test]
fn test_files_inside_category_folders_not_revisited() {
    let fixture = TestFixture::new();
    fixture.create_subdir("文档");
    fixture.create_text_file("文档/picture.png", "misplaced");

    let report = fixture.organize();

    fixture.assert_file_exists("文档/picture.png");
    assert!(fixture.files_in("图片").is_empty());
    assert_eq!(report.moved_count(), 0);
}

// ============================================================================
// 3. Collisions
// ============================================================================

#[test]
fn test_collision_keeps_both_files() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "first");
    fixture.organize();

    fixture.create_text_file("a.txt", "second");
    let report = fixture.organize();

    let files = fixture.files_in("文档");
    assert_eq!(files.len(), 2);
    assert_eq!(fixture.read("文档/a.txt"), "first");

    let renamed = report.moved[0].to.clone();
    let renamed_name = renamed.file_name().unwrap().to_string_lossy().to_string();
    assert!(renamed_name.starts_with("a_"));
    assert!(renamed_name.ends_with(".txt"));
    assert_eq!(renamed_name.len(), "a_YYYYMMDDHHMMSS.txt".len());
    assert_eq!(fs::read_to_string(&renamed).unwrap(), "second");
}

#[test]
fn test_repeated_collisions_within_one_second_stay_distinct() {
    let fixture = TestFixture::new();
    let mut destinations: Vec<PathBuf> = Vec::new();

    for round in 0..3 {
        fixture.create_text_file("a.txt", &format!("round {}", round));
        let report = fixture.organize();
        destinations.push(report.moved[0].to.clone());
    }

    assert_eq!(fixture.files_in("文档").len(), 3);
    for (round, dest) in destinations.iter().enumerate() {
        assert_eq!(
            fs::read_to_string(dest).unwrap(),
            format!("round {}", round)
        );
    }
}

#[test]
fn test_same_base_different_extensions_same_category() {
    let fixture = TestFixture::new();
    fixture.create_text_file("report.pdf", "pdf");
    fixture.create_text_file("report.txt", "txt");

    fixture.organize();

    assert_eq!(fixture.files_in("文档"), vec!["report.pdf", "report.txt"]);
}

#[test]
fn test_failed_move_is_reported_and_pass_continues() {
    let fixture = TestFixture::new();
    // Fits NAME_MAX on its own but not with the collision suffix added.
    let long_name = format!("{}.txt", "n".repeat(248));
    fixture.create_subdir("文档");
    fixture.create_text_file(&format!("文档/{}", long_name), "kept");
    fixture.create_text_file(&long_name, "stays");
    fixture.create_text_file("z.png", "img");

    let report = fixture.organize();

    assert_eq!(report.failed_count(), 1);
    assert!(!report.is_clean());
    assert_eq!(report.failures[0].path, fixture.path().join(&long_name));
    assert!(report.failures[0].destination.is_some());
    assert!(!report.failures[0].cause.is_empty());

    assert_eq!(fixture.read(&long_name), "stays");
    assert_eq!(fixture.read(&format!("文档/{}", long_name)), "kept");
    assert_eq!(report.moved_count(), 1);
    fixture.assert_file_exists("图片/z.png");
}

// ============================================================================
// 4. Configuration
// ============================================================================

#[test]
fn test_custom_configuration_from_toml() {
    let fixture = TestFixture::new();
    let config = OrganizerConfig::from_toml(
        r#"
        [[categories]]
        name = "notes"
        extensions = ["MD", ".txt"]
        "#,
    )
    .unwrap();
    let map = config.into_category_map().unwrap();
    fixture.create_text_file("todo.md", "- [ ] x");
    fixture.create_text_file("photo.jpg", "jpg");

    let report = organize_pass(fixture.path(), &map).unwrap();

    fixture.assert_file_exists("notes/todo.md");
    fixture.assert_file_exists("photo.jpg");
    assert_eq!(fixture.top_level(), vec!["notes", "photo.jpg"]);
    assert_eq!(report.skipped_count(), 1);
}

#[test]
fn test_empty_category_map_moves_nothing() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "a");

    let report = organize_pass(fixture.path(), &CategoryMap::new(vec![]).unwrap()).unwrap();

    assert_eq!(fixture.top_level(), vec!["a.txt"]);
    assert_eq!(report.skipped_count(), 1);
}

// ============================================================================
// 5. Watch loop
// ============================================================================

type Observed = Result<PassReport, String>;

fn observing_watch(
    fixture: &TestFixture,
    categories: CategoryMap,
) -> (dirsort::WatchHandle, Receiver<Observed>) {
    // Folders exist up front so that only the files under test produce events.
    organize_pass(fixture.path(), &categories).unwrap();

    let (tx, rx) = mpsc::channel();
    let handle = start_watch_with(fixture.path(), categories, move |outcome| {
        let _ = tx.send(outcome.as_ref().map(Clone::clone).map_err(|e| e.to_string()));
    })
    .expect("watch should start");
    (handle, rx)
}

#[test]
fn test_watch_moves_new_file() {
    let fixture = TestFixture::new();
    let (mut handle, rx) = observing_watch(&fixture, CategoryMap::default());
    assert_eq!(handle.state(), WatchState::Watching);

    fixture.create_text_file("new.mp3", "beat");

    let report = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("a pass should run")
        .expect("pass should succeed");
    assert_eq!(report.moved_count(), 1);
    assert_eq!(fixture.read("音频/new.mp3"), "beat");
    fixture.assert_file_not_exists("new.mp3");

    assert!(rx.recv_timeout(Duration::from_millis(700)).is_err());
    assert_eq!(handle.passes_run(), 1);

    handle.stop();
    assert_eq!(handle.state(), WatchState::Stopped);
}

#[test]
fn test_watch_ignores_new_directory() {
    let fixture = TestFixture::new();
    let (mut handle, rx) = observing_watch(&fixture, CategoryMap::default());

    fixture.create_subdir("new_dir");

    assert!(rx.recv_timeout(Duration::from_millis(800)).is_err());
    fixture.assert_dir_exists("new_dir");
    assert_eq!(handle.passes_run(), 0);
    handle.stop();
}

#[test]
fn test_watch_uses_reloaded_categories() {
    let fixture = TestFixture::new();
    let (mut handle, rx) = observing_watch(&fixture, CategoryMap::default());

    let music = CategoryMap::new(vec![Category::new("music", [".mp3"]).unwrap()]).unwrap();
    handle.replace_categories(music);
    fixture.create_text_file("tune.mp3", "tune");

    rx.recv_timeout(Duration::from_secs(10))
        .expect("a pass should run")
        .expect("pass should succeed");
    fixture.assert_file_exists("music/tune.mp3");
    fixture.assert_file_not_exists("音频/tune.mp3");
    handle.stop();
}

#[test]
fn test_stop_waits_for_running_pass() {
    let fixture = TestFixture::new();
    organize_pass(fixture.path(), &CategoryMap::default()).unwrap();

    let (started_tx, started_rx) = mpsc::channel();
    let finished = Arc::new(AtomicBool::new(false));
    let finished_in_observer = Arc::clone(&finished);

    let mut handle = start_watch_with(fixture.path(), CategoryMap::default(), move |_| {
        let _ = started_tx.send(());
        thread::sleep(Duration::from_millis(500));
        finished_in_observer.store(true, Ordering::SeqCst);
    })
    .unwrap();

    fixture.create_text_file("slow.txt", "s");
    started_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("a pass should run");

    handle.stop();
    assert!(finished.load(Ordering::SeqCst));
    fixture.assert_file_exists("文档/slow.txt");
}

#[test]
fn test_manual_pass_while_watching() {
    let fixture = TestFixture::new();
    let (mut handle, _rx) = observing_watch(&fixture, CategoryMap::default());

    let report = fixture.organize();
    assert_eq!(report.moved_count(), 0);

    handle.stop();
}
