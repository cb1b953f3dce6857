//! What an expression can see while it is evaluated

use crate::batching::Bucket;
use crate::expression::escape::{escape, unescape};
use crate::expression::reference::MetadataReference;
use crate::project::fs::FileSystem;
use crate::project::item::{ItemStore, TaskItem};
use crate::project::metadata::reserved_value;
use crate::project::property::PropertyTable;
use std::path::Path;

/// Properties that describe the file an element was defined in
pub const THIS_FILE_PROPERTIES: &[&str] = &[
    "ThisFile",
    "ThisFileDirectory",
    "ThisFileFullPath",
    "ThisFileName",
    "ThisFileExtension",
];

/// Read-only view over project state used by expressions and conditions.
///
/// `buckets` is the active batching stack, outermost first.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub properties: &'a PropertyTable,
    pub items: &'a ItemStore,
    pub buckets: &'a [Bucket],
    pub current_item: Option<&'a TaskItem>,
    pub project_dir: &'a Path,
    pub this_file: Option<&'a Path>,
    pub fs: &'a dyn FileSystem,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        properties: &'a PropertyTable,
        items: &'a ItemStore,
        project_dir: &'a Path,
        fs: &'a dyn FileSystem,
    ) -> Self {
        Self {
            properties,
            items,
            buckets: &[],
            current_item: None,
            project_dir,
            this_file: None,
            fs,
        }
    }

    pub fn with_item(self, item: &'a TaskItem) -> Self {
        Self {
            current_item: Some(item),
            ..self
        }
    }

    pub fn with_buckets(self, buckets: &'a [Bucket]) -> Self {
        Self { buckets, ..self }
    }

    pub fn with_file(self, file: &'a Path) -> Self {
        Self {
            this_file: Some(file),
            ..self
        }
    }

    /// Escaped property value, or `None` when undefined
    pub fn property(&self, name: &str) -> Option<String> {
        if let Some(value) = self.this_file_property(name) {
            return Some(value);
        }
        self.properties.value(name).map(str::to_string)
    }

    fn this_file_property(&self, name: &str) -> Option<String> {
        let file = self.this_file?;
        let name = THIS_FILE_PROPERTIES
            .iter()
            .find(|p| p.eq_ignore_ascii_case(name))?;
        let text = |s: Option<&std::ffi::OsStr>| {
            s.map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        let value = match *name {
            "ThisFile" => text(file.file_name()),
            "ThisFileDirectory" => {
                let dir = file
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("{}/", dir.trim_end_matches('/'))
            }
            "ThisFileFullPath" => file.to_string_lossy().into_owned(),
            "ThisFileName" => text(file.file_stem()),
            "ThisFileExtension" => file
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
            _ => return None,
        };
        Some(escape(&value))
    }

    /// Items of `item_type` visible here: the innermost bucket holding the
    /// type wins, otherwise the whole project list
    pub fn items_of(&self, item_type: &str) -> Vec<TaskItem> {
        for bucket in self.buckets.iter().rev() {
            if let Some(items) = bucket.items_of(item_type) {
                return items.to_vec();
            }
        }
        self.items.task_items(item_type)
    }

    /// Escaped metadata value of an item, reserved or custom
    pub fn item_metadata(&self, item: &TaskItem, name: &str) -> Option<String> {
        if let Some(value) = reserved_value(
            name,
            &item.item_spec(),
            item.recursive_dir(),
            self.project_dir,
            self.fs,
        ) {
            return Some(escape(&value));
        }
        item.metadata().value(name).map(str::to_string)
    }

    /// Resolve a `%(...)` reference: the current item first, then the
    /// batching stack. Unresolvable references are empty.
    pub fn metadata(&self, reference: &MetadataReference) -> String {
        if let Some(item) = self.current_item {
            if item.item_type().is_empty() || reference.applies_to(item.item_type()) {
                return self.item_metadata(item, &reference.name).unwrap_or_default();
            }
        }
        for bucket in self.buckets.iter().rev() {
            if let Some(value) = bucket.metadata_value(reference) {
                return value.to_string();
            }
        }
        String::new()
    }

    /// Resolve a path (escaped or not) against the project directory
    pub fn resolve_path(&self, path: &str) -> std::path::PathBuf {
        crate::project::fs::resolve(self.project_dir, &unescape(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::fs::DiskFileSystem;
    use crate::project::property::{Property, PropertyKind};

    #[test]
    fn test_this_file_properties() {
        let properties = PropertyTable::new();
        let items = ItemStore::new();
        let file = Path::new("/work/proj/common.yml");
        let ctx = EvalContext::new(&properties, &items, Path::new("/work/proj"), &DiskFileSystem)
            .with_file(file);

        assert_eq!(ctx.property("ThisFile").as_deref(), Some("common.yml"));
        assert_eq!(ctx.property("thisfilename").as_deref(), Some("common"));
        assert_eq!(ctx.property("ThisFileExtension").as_deref(), Some(".yml"));
        assert_eq!(ctx.property("ThisFileDirectory").as_deref(), Some("/work/proj/"));
    }

    #[test]
    fn test_property_lookup() {
        let mut properties = PropertyTable::new();
        properties
            .set(Property::new("Name", "value", PropertyKind::Normal))
            .unwrap();
        let items = ItemStore::new();
        let ctx = EvalContext::new(&properties, &items, Path::new("/"), &DiskFileSystem);
        assert_eq!(ctx.property("NAME").as_deref(), Some("value"));
        assert!(ctx.property("Missing").is_none());
    }

    #[test]
    fn test_current_item_metadata() {
        let properties = PropertyTable::new();
        let items = ItemStore::new();
        let item = TaskItem::new("src/a.cs")
            .with_type("Compile")
            .with_metadata("Culture", "en");
        let ctx = EvalContext::new(&properties, &items, Path::new("/p"), &DiskFileSystem)
            .with_item(&item);

        let culture = MetadataReference {
            item_type: None,
            name: "Culture".to_string(),
        };
        let filename = MetadataReference {
            item_type: Some("Compile".to_string()),
            name: "Filename".to_string(),
        };
        let other = MetadataReference {
            item_type: Some("Resource".to_string()),
            name: "Culture".to_string(),
        };
        assert_eq!(ctx.metadata(&culture), "en");
        assert_eq!(ctx.metadata(&filename), "a");
        assert_eq!(ctx.metadata(&other), "");
    }
}
