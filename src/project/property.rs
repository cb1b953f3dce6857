//! Property table with precedence between property kinds

use crate::error::{BuildResult, StructuralError};

/// Where a property came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Defined by the project or created by a task
    Normal,
    /// Imported from the process environment
    Environment,
    /// Supplied on the command line; outranks project definitions
    Global,
    /// Computed by the engine; read-only
    Reserved,
}

/// A named property with its raw and evaluated (escaped) values
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub raw_value: String,
    pub value: String,
    pub kind: PropertyKind,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>, kind: PropertyKind) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            raw_value: value.clone(),
            value,
            kind,
        }
    }

    pub fn with_raw_value(mut self, raw_value: impl Into<String>) -> Self {
        self.raw_value = raw_value.into();
        self
    }
}

/// Ordered, case-insensitive property table
#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    entries: Vec<Property>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.entries
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Escaped value of a property
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|p| p.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Store a property, honouring precedence.
    ///
    /// Returns `Ok(false)` when a global property shadows the assignment.
    /// Reserved properties can only be replaced by other reserved values.
    pub fn set(&mut self, property: Property) -> BuildResult<bool> {
        let position = self
            .entries
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(&property.name));

        let Some(index) = position else {
            self.entries.push(property);
            return Ok(true);
        };

        let existing = self.entries[index].kind;
        match (existing, property.kind) {
            (PropertyKind::Reserved, PropertyKind::Reserved) => {}
            (PropertyKind::Reserved, _) => {
                return Err(StructuralError::ReservedProperty(property.name).into());
            }
            (PropertyKind::Global, PropertyKind::Normal | PropertyKind::Environment) => {
                tracing::debug!(name = %property.name, "global property shadows assignment");
                return Ok(false);
            }
            _ => {}
        }
        self.entries[index] = property;
        Ok(true)
    }

    /// Drop every property whose kind is not listed in `keep`
    pub fn retain_kinds(&mut self, keep: &[PropertyKind]) {
        self.entries.retain(|p| keep.contains(&p.kind));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stable, case-normalised rendering of the global properties, used to
    /// key cached target results
    pub fn global_snapshot(&self) -> String {
        let mut globals: Vec<(String, &str)> = self
            .entries
            .iter()
            .filter(|p| p.kind == PropertyKind::Global)
            .map(|p| (p.name.to_ascii_lowercase(), p.value.as_str()))
            .collect();
        globals.sort();
        globals
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(";")
    }
}
