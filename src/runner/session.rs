//! Build session state shared by every target in a build
//!
//! The session owns the task registry, the event log, the result cache and
//! the two stacks that scope a running target: the chain of started targets
//! (for cycle detection) and the active batching buckets.

use crate::batching::Bucket;
use crate::events::EventLog;
use crate::project::item::TaskItem;
use crate::tasks::TaskRegistry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Result of building one target
#[derive(Debug, Clone, PartialEq)]
pub struct TargetResult {
    pub succeeded: bool,
    /// Items declared by `returns`, or else `outputs`
    pub outputs: Vec<TaskItem>,
}

impl TargetResult {
    pub fn success(outputs: Vec<TaskItem>) -> Self {
        TargetResult {
            succeeded: true,
            outputs,
        }
    }

    pub fn failure() -> Self {
        TargetResult {
            succeeded: false,
            outputs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    NotStarted,
    Started,
    Finished,
}

/// Memoization key: project, target and the global properties in effect
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub project: PathBuf,
    pub target: String,
    pub globals: String,
}

impl CacheKey {
    pub fn new(project: &Path, target: &str, globals: String) -> Self {
        CacheKey {
            project: project.to_path_buf(),
            target: target.to_ascii_lowercase(),
            globals,
        }
    }
}

pub struct Session {
    pub registry: TaskRegistry,
    pub log: EventLog,
    cache: HashMap<CacheKey, TargetResult>,
    /// Keyed by project path and lowercased target name
    states: HashMap<(PathBuf, String), TargetState>,
    /// Targets currently started, outermost first
    stack: Vec<(PathBuf, String)>,
    /// Active batching buckets, outermost first
    buckets: Vec<Bucket>,
}

impl Session {
    pub fn new(registry: TaskRegistry, log: EventLog) -> Self {
        Session {
            registry,
            log,
            cache: HashMap::new(),
            states: HashMap::new(),
            stack: Vec::new(),
            buckets: Vec::new(),
        }
    }

    pub fn cached(&self, key: &CacheKey) -> Option<&TargetResult> {
        self.cache.get(key)
    }

    pub fn remember(&mut self, key: CacheKey, result: TargetResult) {
        self.cache.insert(key, result);
    }

    /// Forget the cached results and target states of one project
    pub fn invalidate_project(&mut self, project: &Path) {
        self.cache.retain(|key, _| key.project != project);
        self.states.retain(|(path, _), _| path != project);
    }

    pub fn state(&self, project: &Path, target: &str) -> TargetState {
        self.states
            .get(&(project.to_path_buf(), target.to_ascii_lowercase()))
            .copied()
            .unwrap_or(TargetState::NotStarted)
    }

    pub fn set_state(&mut self, project: &Path, target: &str, state: TargetState) {
        self.states
            .insert((project.to_path_buf(), target.to_ascii_lowercase()), state);
    }

    /// Mark `target` of `project` started; returns the cycle description
    /// when it already is
    pub fn enter_target(&mut self, project: &Path, target: &str) -> Result<(), String> {
        if let Some(pos) = self
            .stack
            .iter()
            .position(|(path, name)| path == project && name.eq_ignore_ascii_case(target))
        {
            let mut chain: Vec<&str> = self.stack[pos..].iter().map(|(_, name)| name.as_str()).collect();
            chain.push(target);
            return Err(chain.join(" -> "));
        }
        self.stack.push((project.to_path_buf(), target.to_string()));
        self.set_state(project, target, TargetState::Started);
        Ok(())
    }

    pub fn leave_target(&mut self) {
        self.stack.pop();
    }

    /// Names of the started targets, outermost first
    pub fn target_stack(&self) -> Vec<&str> {
        self.stack.iter().map(|(_, name)| name.as_str()).collect()
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn buckets_mut(&mut self) -> &mut [Bucket] {
        &mut self.buckets
    }

    /// Run `f` with `bucket` pushed onto the batching stack; the bucket is
    /// popped on every return path
    pub fn with_bucket<T>(&mut self, bucket: Option<Bucket>, f: impl FnOnce(&mut Session) -> T) -> T {
        let pushed = bucket.is_some();
        if let Some(bucket) = bucket {
            self.buckets.push(bucket);
        }
        let result = f(self);
        if pushed {
            self.buckets.pop();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::batching::{batch, BatchOutcome};
    use crate::project::context::EvalContext;
    use crate::project::fs::DiskFileSystem;
    use crate::project::item::{ItemStore, NewItem};
    use crate::project::property::PropertyTable;

    fn session() -> Session {
        Session::new(TaskRegistry::new(), EventLog::new())
    }

    fn one_bucket() -> Bucket {
        let mut items = ItemStore::new();
        let group = items.new_group();
        items.add(
            group,
            NewItem {
                item_type: "Compile".to_string(),
                spec: "a.cs".to_string(),
                ..NewItem::default()
            },
        );
        let properties = PropertyTable::new();
        let ctx = EvalContext::new(&properties, &items, Path::new("/p"), &DiskFileSystem);
        match batch(&["@(Compile)", "%(Filename)"], &ctx).unwrap() {
            BatchOutcome::Buckets(mut buckets) => buckets.remove(0),
            BatchOutcome::NoBatching => panic!("expected a bucket"),
        }
    }

    #[test]
    fn test_cycle_detection() {
        let mut session = session();
        let project = Path::new("/p.yml");
        session.enter_target(project, "A").unwrap();
        session.enter_target(project, "B").unwrap();
        assert_eq!(session.target_stack(), vec!["A", "B"]);
        assert_eq!(session.enter_target(project, "a").unwrap_err(), "A -> B -> a");
        session.leave_target();
        session.leave_target();
        assert!(session.target_stack().is_empty());
        assert_eq!(session.state(project, "A"), TargetState::Started);
    }

    #[test]
    fn test_same_target_name_in_another_project_is_not_a_cycle() {
        let mut session = session();
        session.enter_target(Path::new("/a.yml"), "Build").unwrap();
        assert!(session.enter_target(Path::new("/b.yml"), "Build").is_ok());
    }

    #[test]
    fn test_bucket_popped_after_failure() {
        let mut session = session();
        let bucket = one_bucket();
        let result: Result<(), String> = session.with_bucket(Some(bucket), |s| {
            assert_eq!(s.buckets().len(), 1);
            Err("task failed".to_string())
        });
        assert!(result.is_err());
        assert!(session.buckets().is_empty());
    }

    #[test]
    fn test_cache_invalidation_per_project() {
        let mut session = session();
        let a = CacheKey::new(Path::new("/a.yml"), "Build", String::new());
        let b = CacheKey::new(Path::new("/b.yml"), "Build", String::new());
        session.remember(a.clone(), TargetResult::success(Vec::new()));
        session.remember(b.clone(), TargetResult::failure());
        session.set_state(Path::new("/a.yml"), "Build", TargetState::Finished);
        session.set_state(Path::new("/b.yml"), "Build", TargetState::Finished);
        session.invalidate_project(Path::new("/a.yml"));
        assert!(session.cached(&a).is_none());
        assert_eq!(session.cached(&b), Some(&TargetResult::failure()));
        assert_eq!(session.state(Path::new("/a.yml"), "build"), TargetState::NotStarted);
        assert_eq!(session.state(Path::new("/b.yml"), "BUILD"), TargetState::Finished);
        assert_eq!(
            CacheKey::new(Path::new("/a.yml"), "BUILD", "x=1".to_string()).target,
            "build"
        );
    }
}
