//! Common test utilities

#![allow(dead_code)]

use rbuild::events::{EventLog, RecordingSink};
use rbuild::project::Project;
use rbuild::runner::Session;
use rbuild::tasks::TaskRegistry;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Create a temporary directory with an rbuild.yml file
pub fn create_test_project(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let project_path = temp_dir.path().join("rbuild.yml");
    fs::write(&project_path, content).unwrap();
    (temp_dir, project_path)
}

/// Write a file below `dir`, creating parent directories
pub fn write_file(dir: &Path, relative: &str, content: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Set a file's modification time to `age_secs` seconds ago
pub fn set_age(path: &Path, age_secs: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
        .unwrap();
}

pub fn load(path: &Path) -> Project {
    Project::load(path, Vec::new()).unwrap()
}

pub fn load_with(path: &Path, globals: &[(&str, &str)]) -> Project {
    let globals = globals
        .iter()
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();
    Project::load(path, globals).unwrap()
}

/// A session with the built-in tasks that records every event
pub fn recording_session() -> (Session, Rc<RecordingSink>) {
    let sink = Rc::new(RecordingSink::new());
    let log = EventLog::new().with_sink(sink.clone());
    (Session::new(TaskRegistry::new(), log), sink)
}

/// Unescaped specs of the items of one type
pub fn specs(project: &Project, item_type: &str) -> Vec<String> {
    project
        .items(item_type)
        .iter()
        .map(|item| item.item_spec())
        .collect()
}
