//! Item metadata tables and reserved (well-known) metadata

use crate::project::fs::{normalize_separators, resolve, FileSystem};
use chrono::{DateTime, Local};
use std::path::Path;
use std::time::SystemTime;

/// Metadata computed from the item spec; never stored, never settable
pub const RESERVED_METADATA: &[&str] = &[
    "FullPath",
    "RootDir",
    "Filename",
    "Extension",
    "RelativeDir",
    "Directory",
    "RecursiveDir",
    "Identity",
    "ModifiedTime",
    "CreatedTime",
    "AccessedTime",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_METADATA
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// One custom metadata entry
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    pub name: String,
    /// Unevaluated text as written in the project
    pub raw: String,
    /// Evaluated, escaped value
    pub value: String,
}

/// Ordered, case-insensitive metadata table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    entries: Vec<MetadataEntry>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&MetadataEntry> {
        self.entries
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Escaped value of a custom metadata entry
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|m| m.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace an entry, keeping the original position on replace
    pub fn set(&mut self, name: impl Into<String>, raw: impl Into<String>, value: impl Into<String>) {
        let entry = MetadataEntry {
            name: name.into(),
            raw: raw.into(),
            value: value.into(),
        };
        match self
            .entries
            .iter_mut()
            .find(|m| m.name.eq_ignore_ascii_case(&entry.name))
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|m| !m.name.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    /// Add entries from `defaults` that this table does not define
    pub fn apply_defaults(&mut self, defaults: &MetadataTable) {
        for entry in &defaults.entries {
            if !self.contains(&entry.name) {
                self.entries.push(entry.clone());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|m| m.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compute a reserved metadata value from an (unescaped) item spec.
///
/// Returns `None` when `name` is not reserved. Paths are resolved against
/// `project_dir`; timestamps are empty for files that do not exist.
pub fn reserved_value(
    name: &str,
    spec: &str,
    recursive_dir: &str,
    project_dir: &Path,
    fs: &dyn FileSystem,
) -> Option<String> {
    let name = RESERVED_METADATA
        .iter()
        .find(|reserved| reserved.eq_ignore_ascii_case(name))?;

    let spec_path = Path::new(spec);
    let full = resolve(project_dir, spec);
    let ends_with_separator = spec.ends_with('/') || spec.ends_with('\\');

    let value = match *name {
        "FullPath" => full.to_string_lossy().into_owned(),
        "RootDir" => full
            .ancestors()
            .last()
            .map(|root| root.to_string_lossy().into_owned())
            .unwrap_or_default(),
        "Filename" if ends_with_separator => String::new(),
        "Filename" => spec_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        "Extension" if ends_with_separator => String::new(),
        "Extension" => spec_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
        "RelativeDir" => match spec.rfind(['/', '\\']) {
            Some(idx) => spec[..=idx].to_string(),
            None => String::new(),
        },
        "Directory" => {
            let dir = if ends_with_separator {
                full.clone()
            } else {
                full.parent().map(Path::to_path_buf).unwrap_or_default()
            };
            let dir = normalize_separators(&dir.to_string_lossy());
            let dir = dir.trim_start_matches('/');
            if dir.is_empty() {
                String::new()
            } else {
                format!("{}/", dir.trim_end_matches('/'))
            }
        }
        "RecursiveDir" => recursive_dir.to_string(),
        "Identity" => spec.to_string(),
        "ModifiedTime" => format_time(fs.modified(&full)),
        "CreatedTime" => format_time(fs.created(&full)),
        "AccessedTime" => format_time(fs.accessed(&full)),
        _ => return None,
    };
    Some(value)
}

/// `yyyy-MM-dd HH:mm:ss.fffffff` in local time, or empty
fn format_time(time: Option<SystemTime>) -> String {
    match time {
        Some(time) => {
            let local: DateTime<Local> = time.into();
            format!(
                "{}.{:07}",
                local.format("%Y-%m-%d %H:%M:%S"),
                local.timestamp_subsec_nanos() / 100
            )
        }
        None => String::new(),
    }
}
