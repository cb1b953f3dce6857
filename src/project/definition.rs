//! Target and item-definition tables built from the flattened project

use crate::config::types::{ProjectDefinition, Target};
use crate::project::metadata::MetadataTable;
use std::path::PathBuf;

/// A target together with the file that defined it
#[derive(Debug, Clone)]
pub struct TargetDefinition {
    pub target: Target,
    pub file: PathBuf,
}

impl TargetDefinition {
    pub fn name(&self) -> &str {
        &self.target.name
    }
}

/// Targets by name (case-insensitive), in first-definition order.
///
/// A later definition of the same name replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct TargetTable {
    targets: Vec<TargetDefinition>,
}

impl TargetTable {
    pub fn from_definition(definition: &ProjectDefinition) -> Self {
        let mut table = TargetTable::default();
        for (target, file) in definition.targets() {
            table.insert(TargetDefinition {
                target: target.clone(),
                file: file.clone(),
            });
        }
        table
    }

    pub fn insert(&mut self, definition: TargetDefinition) {
        match self
            .targets
            .iter_mut()
            .find(|t| t.name().eq_ignore_ascii_case(definition.name()))
        {
            Some(existing) => *existing = definition,
            None => self.targets.push(definition),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TargetDefinition> {
        self.targets
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn first(&self) -> Option<&TargetDefinition> {
        self.targets.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetDefinition> {
        self.targets.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(TargetDefinition::name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Default metadata per item type
#[derive(Debug, Clone, Default)]
pub struct ItemDefinitions {
    defaults: Vec<(String, MetadataTable)>,
}

impl ItemDefinitions {
    pub fn get(&self, item_type: &str) -> Option<&MetadataTable> {
        self.defaults
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(item_type))
            .map(|(_, table)| table)
    }

    pub fn entry(&mut self, item_type: &str) -> &mut MetadataTable {
        let index = match self
            .defaults
            .iter()
            .position(|(t, _)| t.eq_ignore_ascii_case(item_type))
        {
            Some(index) => index,
            None => {
                self.defaults
                    .push((item_type.to_string(), MetadataTable::new()));
                self.defaults.len() - 1
            }
        };
        &mut self.defaults[index].1
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }

    pub fn clear(&mut self) {
        self.defaults.clear();
    }
}
