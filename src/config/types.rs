//! Raw project description types
//!
//! This module defines the data structures that represent an rbuild.yml
//! project file. Every text field is kept unevaluated; the evaluation model
//! turns it into properties, items and targets.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level project file structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProjectFile {
    /// Project display name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Targets built when none are requested (`;`-separated expression)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_targets: Option<String>,

    /// Targets always built before the requested ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_targets: Option<String>,

    /// Files whose elements are spliced in before this file's own elements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,

    /// Document-ordered project elements, written as `- kind: {...}`
    /// (nested `choose` branches included)
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub elements: Vec<Element>,
}

/// One document-level element
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    PropertyGroup(PropertyGroup),
    ItemGroup(ItemGroup),
    ItemDefinitionGroup(ItemDefinitionGroup),
    Choose(Choose),
    Target(Target),
}

impl Element {
    /// Human-readable element kind, used in validation messages
    pub fn kind(&self) -> &'static str {
        match self {
            Element::PropertyGroup(_) => "property_group",
            Element::ItemGroup(_) => "item_group",
            Element::ItemDefinitionGroup(_) => "item_definition_group",
            Element::Choose(_) => "choose",
            Element::Target(_) => "target",
        }
    }
}

/// An element together with the file that defined it
#[derive(Debug, Clone)]
pub struct SourceElement {
    pub element: Element,
    pub file: PathBuf,
}

/// A flattened project: imports resolved, provenance recorded
#[derive(Debug, Clone)]
pub struct ProjectDefinition {
    /// Full path of the root project file
    pub path: PathBuf,
    pub name: Option<String>,
    pub default_targets: Option<String>,
    pub initial_targets: Option<String>,
    pub elements: Vec<SourceElement>,
}

impl ProjectDefinition {
    /// Build a definition from a single in-memory project file
    pub fn from_file(path: PathBuf, file: ProjectFile) -> Self {
        let elements = file
            .elements
            .into_iter()
            .map(|element| SourceElement {
                element,
                file: path.clone(),
            })
            .collect();
        ProjectDefinition {
            path,
            name: file.name,
            default_targets: file.default_targets,
            initial_targets: file.initial_targets,
            elements,
        }
    }

    /// Iterate over all target elements in document order
    pub fn targets(&self) -> impl Iterator<Item = (&Target, &PathBuf)> {
        self.elements.iter().filter_map(|e| match &e.element {
            Element::Target(t) => Some((t, &e.file)),
            _ => None,
        })
    }
}

/// A conditional group of properties
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PropertyGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: Vec<PropertyElement>,
}

/// A single property assignment
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PropertyElement {
    pub name: String,

    #[serde(default, deserialize_with = "deserialize_scalar")]
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// A conditional group of item elements
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ItemGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default)]
    pub items: Vec<ItemElement>,
}

/// An item include/update/remove operation
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ItemElement {
    /// Item type (the list the produced items belong to)
    #[serde(rename = "type")]
    pub item_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Vec<MetadataElement>,
}

/// A metadata assignment on an item or item definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataElement {
    pub name: String,

    #[serde(default, deserialize_with = "deserialize_scalar")]
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Default metadata per item type
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ItemDefinitionGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default)]
    pub definitions: Vec<ItemDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ItemDefinition {
    #[serde(rename = "type")]
    pub item_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Vec<MetadataElement>,
}

/// First-match conditional branches
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Choose {
    #[serde(default)]
    pub when: Vec<WhenBranch>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub otherwise: Vec<Element>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhenBranch {
    pub condition: String,

    #[serde(default)]
    pub elements: Vec<Element>,
}

/// A named build step
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Target {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_targets: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_targets: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<String>,

    /// Items reported as the target result instead of `outputs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,

    #[serde(default)]
    pub tasks: Vec<TaskElement>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_error: Vec<OnError>,
}

/// A task invocation inside a target
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TaskElement {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default)]
    pub continue_on_error: bool,

    /// Ordered parameter name / raw expression pairs
    #[serde(default, deserialize_with = "deserialize_parameters")]
    pub parameters: Vec<Parameter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputBinding>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// Binds a task output parameter to a property or an item type
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputBinding {
    pub task_parameter: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Error handler run when a target's own task fails
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OnError {
    pub execute_targets: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Render a YAML scalar as raw text
fn scalar_to_string<E: serde::de::Error>(value: serde_yaml::Value) -> Result<String, E> {
    use serde_yaml::Value;

    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(E::custom("expected a scalar value")),
    }
}

/// Custom deserializer accepting strings, numbers and booleans as text
fn deserialize_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    scalar_to_string(value)
}

/// Read an ordered `name: value` mapping into pairs
fn mapping_pairs<E: serde::de::Error>(
    mapping: serde_yaml::Mapping,
) -> Result<Vec<(String, String)>, E> {
    let mut pairs = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = scalar_to_string::<E>(key)?;
        pairs.push((name, scalar_to_string(value)?));
    }
    Ok(pairs)
}

/// Custom deserializer for properties that handles both a mapping and a list
fn deserialize_properties<'de, D>(deserializer: D) -> Result<Vec<PropertyElement>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Shorthand: Name: value
        Value::Mapping(mapping) => Ok(mapping_pairs::<D::Error>(mapping)?
            .into_iter()
            .map(|(name, value)| PropertyElement {
                name,
                value,
                condition: None,
            })
            .collect()),
        // Full form with per-property conditions
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| PropertyElement::deserialize(item).map_err(D::Error::custom))
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("properties must be a mapping or an array")),
    }
}

/// Custom deserializer for metadata that handles both a mapping and a list
fn deserialize_metadata<'de, D>(deserializer: D) -> Result<Vec<MetadataElement>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Mapping(mapping) => Ok(mapping_pairs::<D::Error>(mapping)?
            .into_iter()
            .map(|(name, value)| MetadataElement {
                name,
                value,
                condition: None,
            })
            .collect()),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| MetadataElement::deserialize(item).map_err(D::Error::custom))
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("metadata must be a mapping or an array")),
    }
}

/// Custom deserializer for task parameters, keeping declaration order
fn deserialize_parameters<'de, D>(deserializer: D) -> Result<Vec<Parameter>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Mapping(mapping) => Ok(mapping_pairs::<D::Error>(mapping)?
            .into_iter()
            .map(|(name, value)| Parameter { name, value })
            .collect()),
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("parameters must be a mapping")),
    }
}
