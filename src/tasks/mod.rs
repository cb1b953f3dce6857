//! Tasks: units of work invoked from targets
//!
//! Tasks are looked up by name in a [`TaskRegistry`]. The registry starts
//! with the built-in tasks; embedders can register their own.

pub mod builtin;
pub mod schema;

pub use schema::{
    bind_parameters, ParameterKind, ParameterSpec, ParameterValue, ParameterValues, Task, TaskHost,
};

use std::rc::Rc;

/// Task types by name (case-insensitive)
#[derive(Clone)]
pub struct TaskRegistry {
    tasks: Vec<Rc<dyn Task>>,
}

impl TaskRegistry {
    /// A registry without any tasks
    pub fn empty() -> Self {
        TaskRegistry { tasks: Vec::new() }
    }

    /// A registry holding the built-in tasks
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Rc::new(builtin::Message));
        registry.register(Rc::new(builtin::Warning));
        registry.register(Rc::new(builtin::Error));
        registry.register(Rc::new(builtin::CreateProperty));
        registry.register(Rc::new(builtin::CreateItem));
        registry.register(Rc::new(builtin::Exec));
        registry.register(Rc::new(builtin::Touch));
        registry.register(Rc::new(builtin::MakeDir));
        registry.register(Rc::new(builtin::Copy));
        registry.register(Rc::new(builtin::Delete));
        registry
    }

    /// Add a task, replacing any task of the same name
    pub fn register(&mut self, task: Rc<dyn Task>) {
        self.tasks.retain(|t| !t.name().eq_ignore_ascii_case(task.name()));
        self.tasks.push(task);
    }

    pub fn with_task(mut self, task: Rc<dyn Task>) -> Self {
        self.register(task);
        self
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Task>> {
        self.tasks
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tasks.iter().map(|t| t.name())
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = TaskRegistry::new();
        assert!(registry.get("message").is_some());
        assert!(registry.get("EXEC").is_some());
        assert!(registry.get("Csc").is_none());
        assert_eq!(registry.names().count(), 10);
    }

    #[test]
    fn test_register_replaces_by_name() {
        let registry = TaskRegistry::empty()
            .with_task(Rc::new(builtin::Message))
            .with_task(Rc::new(builtin::Message));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Message"]);
    }
}
