//! Project validation
//!
//! Structural checks that need no evaluation: names, output bindings and
//! element placement.

use crate::config::types::{Element, ItemElement, MetadataElement, ProjectDefinition, Target};
use crate::error::{ConfigError, ConfigResult};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid name regex"))
}

/// Check a property, item, metadata, target or task name
pub fn validate_name(kind: &'static str, name: &str) -> ConfigResult<()> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// Validate a complete flattened project
pub fn validate_project(definition: &ProjectDefinition) -> ConfigResult<()> {
    let mut target_names = HashSet::new();

    for source in &definition.elements {
        validate_element(&source.element, true)?;

        if let Element::Target(target) = &source.element {
            if !target_names.insert(target.name.to_ascii_lowercase()) {
                tracing::warn!(
                    target = %target.name,
                    file = %source.file.display(),
                    "target redefined; the later definition wins"
                );
            }
        }
    }

    Ok(())
}

fn validate_element(element: &Element, top_level: bool) -> ConfigResult<()> {
    match element {
        Element::PropertyGroup(group) => {
            for property in &group.properties {
                validate_name("property", &property.name)?;
            }
        }
        Element::ItemGroup(group) => {
            for item in &group.items {
                validate_item(item)?;
            }
        }
        Element::ItemDefinitionGroup(group) => {
            for definition in &group.definitions {
                validate_name("item type", &definition.item_type)?;
                validate_metadata(&definition.metadata)?;
            }
        }
        Element::Choose(choose) => {
            if choose.when.is_empty() {
                return Err(ConfigError::Invalid(
                    "choose must contain at least one when branch".to_string(),
                ));
            }
            for branch in &choose.when {
                for nested in &branch.elements {
                    validate_element(nested, false)?;
                }
            }
            for nested in &choose.otherwise {
                validate_element(nested, false)?;
            }
        }
        Element::Target(target) => {
            if !top_level {
                return Err(ConfigError::Invalid(format!(
                    "target '{}' cannot be declared inside a choose branch",
                    target.name
                )));
            }
            validate_target(target)?;
        }
    }
    Ok(())
}

fn validate_item(item: &ItemElement) -> ConfigResult<()> {
    validate_name("item type", &item.item_type)?;

    let operations = [&item.include, &item.update, &item.remove]
        .iter()
        .filter(|op| op.is_some())
        .count();
    if operations != 1 {
        return Err(ConfigError::Invalid(format!(
            "item '{}' must specify exactly one of include, update or remove",
            item.item_type
        )));
    }
    if item.exclude.is_some() && item.include.is_none() {
        return Err(ConfigError::Invalid(format!(
            "item '{}' uses exclude without include",
            item.item_type
        )));
    }

    validate_metadata(&item.metadata)
}

fn validate_metadata(metadata: &[MetadataElement]) -> ConfigResult<()> {
    for entry in metadata {
        validate_name("metadata", &entry.name)?;
    }
    Ok(())
}

/// Validate a single target
pub fn validate_target(target: &Target) -> ConfigResult<()> {
    validate_name("target", &target.name)?;

    for task in &target.tasks {
        validate_name("task", &task.name)?;
        for parameter in &task.parameters {
            validate_name("task parameter", &parameter.name)?;
        }
        for binding in &task.outputs {
            if binding.property_name.is_some() == binding.item_name.is_some() {
                return Err(ConfigError::InvalidOutputBinding(
                    binding.task_parameter.clone(),
                ));
            }
            if let Some(name) = &binding.property_name {
                validate_name("property", name)?;
            }
            if let Some(name) = &binding.item_name {
                validate_name("item type", name)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{OutputBinding, ProjectFile, TaskElement};
    use std::path::PathBuf;

    fn definition(yaml: &str) -> ProjectDefinition {
        let file: ProjectFile = serde_yaml::from_str(yaml).unwrap();
        ProjectDefinition::from_file(PathBuf::from("/tmp/rbuild.yml"), file)
    }

    #[test]
    fn test_validate_valid_project() {
        let project = definition(
            r#"
elements:
  - property_group:
      properties:
        Configuration: Debug
  - item_group:
      items:
        - type: Compile
          include: "*.cs"
  - target:
      name: Build
      tasks:
        - name: Message
          parameters:
            Text: hi
"#,
        );
        assert!(validate_project(&project).is_ok());
    }

    #[test]
    fn test_validate_invalid_property_name() {
        let project = definition(
            r#"
elements:
  - property_group:
      properties:
        "1bad": x
"#,
        );
        assert!(matches!(
            validate_project(&project),
            Err(ConfigError::InvalidName { kind: "property", .. })
        ));
    }

    #[test]
    fn test_validate_item_needs_one_operation() {
        let project = definition(
            r#"
elements:
  - item_group:
      items:
        - type: Compile
          include: a.cs
          remove: b.cs
"#,
        );
        assert!(matches!(
            validate_project(&project),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_output_binding() {
        let target = Target {
            name: "Build".to_string(),
            tasks: vec![TaskElement {
                name: "CreateProperty".to_string(),
                outputs: vec![OutputBinding {
                    task_parameter: "Value".to_string(),
                    property_name: Some("A".to_string()),
                    item_name: Some("B".to_string()),
                    condition: None,
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            validate_target(&target),
            Err(ConfigError::InvalidOutputBinding(_))
        ));
    }

    #[test]
    fn test_target_inside_choose_rejected() {
        let project = definition(
            r#"
elements:
  - choose:
      when:
        - condition: "true"
          elements:
            - target:
                name: Hidden
"#,
        );
        assert!(validate_project(&project).is_err());
    }
}
