//! Items and the item store
//!
//! An include that expands to several entries (a wildcard or a `;` list) is
//! stored as one virtual parent whose children share the parent's metadata
//! table. The first time a child's metadata is changed, or a child is removed,
//! the parent is split: every child gets its own copy of the table and the
//! children take the parent's place in its group.

use crate::error::{BuildResult, StructuralError};
use crate::expression::escape::{escape, unescape};
use crate::project::metadata::{is_reserved, MetadataTable};
use std::path::PathBuf;

/// An item as seen by expressions and tasks
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskItem {
    spec: String,
    item_type: String,
    metadata: MetadataTable,
    recursive_dir: String,
}

impl TaskItem {
    /// Create from an escaped spec
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            ..Self::default()
        }
    }

    /// Create from plain text, escaping reserved characters
    pub fn from_unescaped(spec: &str) -> Self {
        Self::new(escape(spec))
    }

    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    pub fn with_metadata(mut self, name: &str, value: &str) -> Self {
        self.metadata.set(name, value, value);
        self
    }

    pub fn with_metadata_table(mut self, metadata: MetadataTable) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_recursive_dir(mut self, recursive_dir: impl Into<String>) -> Self {
        self.recursive_dir = recursive_dir.into();
        self
    }

    /// Escaped spec
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Unescaped spec
    pub fn item_spec(&self) -> String {
        unescape(&self.spec)
    }

    pub fn set_spec(&mut self, spec: impl Into<String>) {
        self.spec = spec.into();
    }

    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    /// Unescaped custom metadata value
    pub fn custom_metadata(&self, name: &str) -> Option<String> {
        self.metadata.value(name).map(unescape)
    }

    /// Set custom metadata from an escaped value
    pub fn set_metadata(&mut self, name: &str, value: &str) -> BuildResult<()> {
        if is_reserved(name) {
            return Err(StructuralError::ReservedMetadata(name.to_string()).into());
        }
        self.metadata.set(name, value, value);
        Ok(())
    }

    pub fn recursive_dir(&self) -> &str {
        &self.recursive_dir
    }
}

/// Index of an item in the store
pub type ItemId = usize;

/// Index of an item group in the store
pub type GroupId = usize;

#[derive(Debug, Clone)]
enum ItemMetadata {
    Owned(MetadataTable),
    /// Borrowed from the virtual parent
    Shared(ItemId),
}

/// A stored item (or virtual parent)
#[derive(Debug, Clone)]
pub struct Item {
    pub item_type: String,
    /// Include text as written, before expansion
    pub include: String,
    /// Escaped spec; for a virtual parent, the evaluated include
    pub spec: String,
    pub recursive_dir: String,
    pub group: GroupId,
    /// Project file that defined the item
    pub file: Option<PathBuf>,
    metadata: ItemMetadata,
    children: Vec<ItemId>,
    removed: bool,
}

impl Item {
    pub fn is_virtual(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

/// Fields for a new stored item
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub item_type: String,
    pub include: String,
    pub spec: String,
    pub recursive_dir: String,
    pub metadata: MetadataTable,
    pub file: Option<PathBuf>,
}

/// All items of a project, in definition order
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    arena: Vec<Item>,
    groups: Vec<Vec<ItemId>>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_group(&mut self) -> GroupId {
        self.groups.push(Vec::new());
        self.groups.len() - 1
    }

    /// Append a single item to `group`
    pub fn add(&mut self, group: GroupId, item: NewItem) -> ItemId {
        let id = self.push(group, item, ItemMetadata::Owned(MetadataTable::new()));
        self.groups[group].push(id);
        id
    }

    /// Append a virtual parent whose `entries` share `item.metadata`.
    ///
    /// Each entry is an escaped spec and its recursive dir.
    pub fn add_shared(
        &mut self,
        group: GroupId,
        item: NewItem,
        entries: Vec<(String, String)>,
    ) -> ItemId {
        let template = NewItem {
            metadata: MetadataTable::new(),
            ..item.clone()
        };
        let parent = self.push(group, item, ItemMetadata::Owned(MetadataTable::new()));
        let children: Vec<ItemId> = entries
            .into_iter()
            .map(|(spec, recursive_dir)| {
                let child = NewItem {
                    spec,
                    recursive_dir,
                    ..template.clone()
                };
                self.push(group, child, ItemMetadata::Shared(parent))
            })
            .collect();
        self.arena[parent].children = children;
        self.groups[group].push(parent);
        parent
    }

    fn push(&mut self, group: GroupId, item: NewItem, metadata: ItemMetadata) -> ItemId {
        let metadata = match metadata {
            ItemMetadata::Owned(_) => ItemMetadata::Owned(item.metadata),
            shared => shared,
        };
        self.arena.push(Item {
            item_type: item.item_type,
            include: item.include,
            spec: item.spec,
            recursive_dir: item.recursive_dir,
            group,
            file: item.file,
            metadata,
            children: Vec::new(),
            removed: false,
        });
        self.arena.len() - 1
    }

    pub fn get(&self, id: ItemId) -> &Item {
        &self.arena[id]
    }

    /// Children of a virtual parent
    pub fn children(&self, id: ItemId) -> &[ItemId] {
        &self.arena[id].children
    }

    /// Does this item currently share its metadata with siblings?
    pub fn is_shared(&self, id: ItemId) -> bool {
        matches!(self.arena[id].metadata, ItemMetadata::Shared(_))
    }

    pub fn metadata(&self, id: ItemId) -> &MetadataTable {
        match &self.arena[id].metadata {
            ItemMetadata::Owned(table) => table,
            ItemMetadata::Shared(parent) => self.metadata(*parent),
        }
    }

    /// Give every child of `parent` its own metadata copy and replace the
    /// parent with its children in the group's ordered list
    pub fn split(&mut self, parent: ItemId) {
        let children = std::mem::take(&mut self.arena[parent].children);
        if children.is_empty() {
            return;
        }
        let shared = self.metadata(parent).clone();
        for &child in &children {
            self.arena[child].metadata = ItemMetadata::Owned(shared.clone());
        }

        let group = self.arena[parent].group;
        if let Some(pos) = self.groups[group].iter().position(|&id| id == parent) {
            self.groups[group].splice(pos..=pos, children.iter().copied());
        }
        self.arena[parent].removed = true;
        tracing::trace!(item_type = %self.arena[parent].item_type, count = children.len(), "split shared item");
    }

    fn make_owned(&mut self, id: ItemId) {
        if let ItemMetadata::Shared(parent) = self.arena[id].metadata {
            self.split(parent);
        }
    }

    /// Set a custom metadata value on one item
    pub fn set_metadata(&mut self, id: ItemId, name: &str, raw: &str, value: &str) -> BuildResult<()> {
        if is_reserved(name) {
            return Err(StructuralError::ReservedMetadata(name.to_string()).into());
        }
        self.make_owned(id);
        if let ItemMetadata::Owned(table) = &mut self.arena[id].metadata {
            table.set(name, raw, value);
        }
        Ok(())
    }

    /// Fill in metadata the item does not define yet
    pub fn apply_defaults(&mut self, id: ItemId, defaults: &MetadataTable) {
        let missing = defaults
            .iter()
            .any(|entry| !self.metadata(id).contains(&entry.name));
        if !missing {
            return;
        }
        self.make_owned(id);
        if let ItemMetadata::Owned(table) = &mut self.arena[id].metadata {
            table.apply_defaults(defaults);
        }
    }

    /// Remove one item from its group
    pub fn remove(&mut self, id: ItemId) {
        self.make_owned(id);
        let group = self.arena[id].group;
        self.groups[group].retain(|&entry| entry != id);
        self.arena[id].removed = true;
    }

    /// Live (non-virtual) item ids of `item_type`, in definition order
    pub fn ids_of_type(&self, item_type: &str) -> Vec<ItemId> {
        let mut ids = Vec::new();
        for group in &self.groups {
            for &id in group {
                let item = &self.arena[id];
                if item.removed || !item.item_type.eq_ignore_ascii_case(item_type) {
                    continue;
                }
                if item.is_virtual() {
                    ids.extend(item.children.iter().copied());
                } else {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Distinct item types in order of first definition
    pub fn item_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for group in &self.groups {
            for &id in group {
                let item = &self.arena[id];
                if !item.removed && !types.iter().any(|t| t.eq_ignore_ascii_case(&item.item_type)) {
                    types.push(item.item_type.clone());
                }
            }
        }
        types
    }

    pub fn task_item(&self, id: ItemId) -> TaskItem {
        let item = &self.arena[id];
        TaskItem::new(item.spec.clone())
            .with_type(item.item_type.clone())
            .with_metadata_table(self.metadata(id).clone())
            .with_recursive_dir(item.recursive_dir.clone())
    }

    pub fn task_items(&self, item_type: &str) -> Vec<TaskItem> {
        self.ids_of_type(item_type)
            .into_iter()
            .map(|id| self.task_item(id))
            .collect()
    }

    /// Append task items as a new group, one owned item each
    pub fn add_task_items(&mut self, item_type: &str, items: &[TaskItem]) {
        let group = self.new_group();
        for item in items {
            self.add(
                group,
                NewItem {
                    item_type: item_type.to_string(),
                    include: item.spec().to_string(),
                    spec: item.spec().to_string(),
                    recursive_dir: item.recursive_dir().to_string(),
                    metadata: item.metadata().clone(),
                    file: None,
                },
            );
        }
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.groups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_store() -> (ItemStore, ItemId) {
        let mut store = ItemStore::new();
        let group = store.new_group();
        let mut metadata = MetadataTable::new();
        metadata.set("Culture", "en", "en");
        let parent = store.add_shared(
            group,
            NewItem {
                item_type: "Compile".to_string(),
                include: "a.cs;b.cs;c.cs".to_string(),
                spec: "a.cs;b.cs;c.cs".to_string(),
                metadata,
                ..NewItem::default()
            },
            vec![
                ("a.cs".to_string(), String::new()),
                ("b.cs".to_string(), String::new()),
                ("c.cs".to_string(), String::new()),
            ],
        );
        (store, parent)
    }

    #[test]
    fn test_children_share_parent_metadata() {
        let (store, parent) = shared_store();
        let ids = store.ids_of_type("compile");
        assert_eq!(ids.len(), 3);
        for &id in &ids {
            assert!(store.is_shared(id));
            assert_eq!(store.metadata(id).value("Culture"), Some("en"));
        }
        assert_eq!(store.children(parent), ids.as_slice());
    }

    #[test]
    fn test_mutation_splits_parent() {
        let (mut store, parent) = shared_store();
        let ids = store.ids_of_type("Compile");

        store.set_metadata(ids[1], "Culture", "fr", "fr").unwrap();

        assert!(store.get(parent).is_removed());
        let after = store.ids_of_type("Compile");
        assert_eq!(after, ids);
        assert!(!store.is_shared(ids[0]));
        assert_eq!(store.metadata(ids[0]).value("Culture"), Some("en"));
        assert_eq!(store.metadata(ids[1]).value("Culture"), Some("fr"));
        assert_eq!(store.metadata(ids[2]).value("Culture"), Some("en"));
    }

    #[test]
    fn test_reserved_metadata_cannot_be_set() {
        let (mut store, _) = shared_store();
        let ids = store.ids_of_type("Compile");
        assert!(store.set_metadata(ids[0], "FullPath", "x", "x").is_err());
        assert!(store.is_shared(ids[0]));
    }

    #[test]
    fn test_remove_child_keeps_siblings() {
        let (mut store, _) = shared_store();
        let ids = store.ids_of_type("Compile");
        store.remove(ids[0]);
        let specs: Vec<String> = store
            .task_items("Compile")
            .iter()
            .map(|i| i.item_spec())
            .collect();
        assert_eq!(specs, vec!["b.cs", "c.cs"]);
    }

    #[test]
    fn test_item_types_in_definition_order() {
        let mut store = ItemStore::new();
        let g = store.new_group();
        for (item_type, spec) in [("B", "1"), ("A", "2"), ("b", "3")] {
            store.add(
                g,
                NewItem {
                    item_type: item_type.to_string(),
                    spec: spec.to_string(),
                    ..NewItem::default()
                },
            );
        }
        assert_eq!(store.item_types(), vec!["B", "A"]);
        assert_eq!(store.task_items("B").len(), 2);
    }

    #[test]
    fn test_task_item_escaping() {
        let item = TaskItem::from_unescaped("a;b.txt").with_metadata("Culture", "en");
        assert_eq!(item.spec(), "a%3bb.txt");
        assert_eq!(item.item_spec(), "a;b.txt");
        assert_eq!(item.custom_metadata("culture"), Some("en".to_string()));
    }
}
