//! The evaluation passes
//!
//! Properties are evaluated first over the whole document, then item
//! definitions, then items. `choose` branches are decided once, during the
//! property pass, and the later passes follow the same decisions.

use crate::condition::{evaluate_condition, Condition};
use crate::config::types::{
    Choose, Element, ItemDefinitionGroup, ItemElement, ItemGroup, MetadataElement, PropertyGroup,
    SourceElement,
};
use crate::error::{BuildResult, StructuralError};
use crate::expression::escape::{has_wildcard, unescape};
use crate::expression::eval::{expand_items, expand_string};
use crate::expression::parser::Expression;
use crate::expression::reference::ParseOptions;
use crate::project::context::EvalContext;
use crate::project::definition::ItemDefinitions;
use crate::project::fs::{normalize_path, normalize_separators, FileSystem};
use crate::project::item::{ItemId, ItemStore, NewItem, TaskItem};
use crate::project::metadata::{is_reserved, MetadataTable};
use crate::project::property::{Property, PropertyKind, PropertyTable};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Item element expressions: properties and items, split on `;`
const ITEM_OPTIONS: ParseOptions = ParseOptions::ITEMS;

/// Metadata values on item elements can also reference the item's metadata
const METADATA_OPTIONS: ParseOptions = ParseOptions {
    split: false,
    allow_items: true,
    allow_metadata: true,
};

/// Which branch of a `choose` was taken
#[derive(Debug, Clone, Copy)]
enum Branch {
    When(usize),
    Otherwise,
}

/// Mutable state threaded through the passes
pub struct Evaluator<'p> {
    pub project_dir: &'p Path,
    pub fs: &'p dyn FileSystem,
    pub properties: PropertyTable,
    pub items: ItemStore,
    pub item_definitions: ItemDefinitions,
    branches: Vec<Branch>,
    next_branch: usize,
}

impl<'p> Evaluator<'p> {
    pub fn new(project_dir: &'p Path, fs: &'p dyn FileSystem, properties: PropertyTable) -> Self {
        Evaluator {
            project_dir,
            fs,
            properties,
            items: ItemStore::new(),
            item_definitions: ItemDefinitions::default(),
            branches: Vec::new(),
            next_branch: 0,
        }
    }

    pub fn into_parts(self) -> (PropertyTable, ItemStore, ItemDefinitions) {
        (self.properties, self.items, self.item_definitions)
    }

    fn ctx<'e>(&'e self, file: &'e Path) -> EvalContext<'e> {
        EvalContext::new(&self.properties, &self.items, self.project_dir, self.fs).with_file(file)
    }

    fn condition_holds(&self, condition: Option<&str>, options: ParseOptions, file: &Path) -> BuildResult<bool> {
        evaluate_condition(condition, options, &self.ctx(file))
    }

    /// Run all passes over the document-ordered elements
    pub fn run(mut self, elements: &[SourceElement]) -> BuildResult<Self> {
        for element in elements {
            self.property_pass(&element.element, &element.file)?;
        }
        tracing::debug!(count = self.properties.len(), "property pass complete");

        self.next_branch = 0;
        for element in elements {
            self.item_definition_pass(&element.element, &element.file)?;
        }

        self.next_branch = 0;
        for element in elements {
            self.item_pass(&element.element, &element.file)?;
        }
        tracing::debug!(types = ?self.items.item_types(), "item pass complete");
        Ok(self)
    }

    fn property_pass(&mut self, element: &Element, file: &Path) -> BuildResult<()> {
        match element {
            Element::PropertyGroup(group) => self.evaluate_property_group(group, file),
            Element::Choose(choose) => {
                let branch = self.choose_branch(choose, file)?;
                self.branches.push(branch);
                for nested in branch_elements(choose, branch) {
                    self.property_pass(nested, file)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn choose_branch(&self, choose: &Choose, file: &Path) -> BuildResult<Branch> {
        for (index, when) in choose.when.iter().enumerate() {
            if self.condition_holds(Some(&when.condition), ParseOptions::PROPERTIES, file)? {
                return Ok(Branch::When(index));
            }
        }
        Ok(Branch::Otherwise)
    }

    /// The branch recorded for the next `choose` during the property pass
    fn recorded_branch(&mut self) -> Branch {
        let branch = self
            .branches
            .get(self.next_branch)
            .copied()
            .unwrap_or(Branch::Otherwise);
        self.next_branch += 1;
        branch
    }

    fn evaluate_property_group(&mut self, group: &PropertyGroup, file: &Path) -> BuildResult<()> {
        if !self.condition_holds(group.condition.as_deref(), ParseOptions::PROPERTIES, file)? {
            return Ok(());
        }
        for property in &group.properties {
            if !self.condition_holds(property.condition.as_deref(), ParseOptions::PROPERTIES, file)? {
                continue;
            }
            let value = expand_string(&property.value, ParseOptions::PROPERTIES, &self.ctx(file))?;
            self.properties.set(
                Property::new(property.name.clone(), value, PropertyKind::Normal)
                    .with_raw_value(property.value.clone()),
            )?;
        }
        Ok(())
    }

    fn item_definition_pass(&mut self, element: &Element, file: &Path) -> BuildResult<()> {
        match element {
            Element::ItemDefinitionGroup(group) => self.evaluate_item_definitions(group, file),
            Element::Choose(choose) => {
                let branch = self.recorded_branch();
                for nested in branch_elements(choose, branch) {
                    self.item_definition_pass(nested, file)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn evaluate_item_definitions(&mut self, group: &ItemDefinitionGroup, file: &Path) -> BuildResult<()> {
        if !self.condition_holds(group.condition.as_deref(), ParseOptions::PROPERTIES, file)? {
            return Ok(());
        }
        for definition in &group.definitions {
            if !self.condition_holds(definition.condition.as_deref(), ParseOptions::PROPERTIES, file)? {
                continue;
            }
            for metadata in &definition.metadata {
                if !self.condition_holds(metadata.condition.as_deref(), ParseOptions::PROPERTIES, file)? {
                    continue;
                }
                let value = expand_string(&metadata.value, ParseOptions::PROPERTIES, &self.ctx(file))?;
                self.item_definitions
                    .entry(&definition.item_type)
                    .set(metadata.name.clone(), metadata.value.clone(), value);
            }
        }
        Ok(())
    }

    fn item_pass(&mut self, element: &Element, file: &Path) -> BuildResult<()> {
        match element {
            Element::ItemGroup(group) => self.evaluate_item_group(group, file),
            Element::Choose(choose) => {
                let branch = self.recorded_branch();
                for nested in branch_elements(choose, branch) {
                    self.item_pass(nested, file)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn evaluate_item_group(&mut self, group: &ItemGroup, file: &Path) -> BuildResult<()> {
        if !self.condition_holds(group.condition.as_deref(), ITEM_OPTIONS, file)? {
            return Ok(());
        }
        let group_id = self.items.new_group();
        for item in &group.items {
            if !self.condition_holds(item.condition.as_deref(), ITEM_OPTIONS, file)? {
                continue;
            }
            if let Some(include) = &item.include {
                self.include_items(group_id, item, include, file)?;
            } else if let Some(update) = &item.update {
                self.update_items(item, update, file)?;
            } else if let Some(remove) = &item.remove {
                self.remove_items(item, remove, file)?;
            }
        }
        Ok(())
    }

    fn include_items(&mut self, group: usize, element: &ItemElement, include: &str, file: &Path) -> BuildResult<()> {
        let ctx = self.ctx(file);
        let mut entries: Vec<TaskItem> = Vec::new();
        for item in expand_items(include, ITEM_OPTIONS, &ctx)? {
            if item.item_type().is_empty() && has_wildcard(item.spec()) {
                for matched in self.fs.expand_wildcard(self.project_dir, &unescape(item.spec())) {
                    entries.push(
                        TaskItem::from_unescaped(&matched.path).with_recursive_dir(matched.recursive_dir),
                    );
                }
            } else {
                entries.push(item);
            }
        }

        if let Some(exclude) = &element.exclude {
            let excluded = SpecMatcher::new(self.project_dir, &expand_items(exclude, ITEM_OPTIONS, &ctx)?);
            entries.retain(|entry| !excluded.matches(&entry.item_spec()));
        }

        let defaults = self
            .item_definitions
            .get(&element.item_type)
            .cloned()
            .unwrap_or_default();

        let per_item_metadata = element.metadata.iter().any(|m| {
            references_metadata(&m.value) || m.condition.as_deref().is_some_and(references_metadata)
        });
        let from_item_lists = entries.iter().any(|e| !e.item_type().is_empty());

        if entries.len() > 1 && !per_item_metadata && !from_item_lists {
            let metadata = self.evaluate_metadata(&element.metadata, defaults, None, file)?;
            let shared: Vec<(String, String)> = entries
                .iter()
                .map(|e| (e.spec().to_string(), e.recursive_dir().to_string()))
                .collect();
            self.items.add_shared(
                group,
                NewItem {
                    item_type: element.item_type.clone(),
                    include: include.to_string(),
                    spec: include.to_string(),
                    recursive_dir: String::new(),
                    metadata,
                    file: Some(file.to_path_buf()),
                },
                shared,
            );
            return Ok(());
        }

        for entry in entries {
            let mut base = entry.metadata().clone();
            base.apply_defaults(&defaults);
            let subject = entry.clone().with_type(element.item_type.clone()).with_metadata_table(base.clone());
            let metadata = self.evaluate_metadata(&element.metadata, base, Some(&subject), file)?;
            self.items.add(
                group,
                NewItem {
                    item_type: element.item_type.clone(),
                    include: include.to_string(),
                    spec: entry.spec().to_string(),
                    recursive_dir: entry.recursive_dir().to_string(),
                    metadata,
                    file: Some(file.to_path_buf()),
                },
            );
        }
        Ok(())
    }

    /// Evaluate metadata elements on top of `table`, optionally in the
    /// context of the item they will belong to
    fn evaluate_metadata(
        &self,
        elements: &[MetadataElement],
        mut table: MetadataTable,
        subject: Option<&TaskItem>,
        file: &Path,
    ) -> BuildResult<MetadataTable> {
        let mut current = subject.cloned();
        for metadata in elements {
            if is_reserved(&metadata.name) {
                return Err(StructuralError::ReservedMetadata(metadata.name.clone()).into());
            }
            let ctx = match &current {
                Some(item) => self.ctx(file).with_item(item),
                None => self.ctx(file),
            };
            if let Some(condition) = &metadata.condition {
                if !Condition::parse(condition)?.evaluate(METADATA_OPTIONS, &ctx)? {
                    continue;
                }
            }
            let value = expand_string(&metadata.value, METADATA_OPTIONS, &ctx)?;
            table.set(metadata.name.clone(), metadata.value.clone(), value.clone());
            if let Some(item) = current.as_mut() {
                item.set_metadata(&metadata.name, &value)?;
            }
        }
        Ok(table)
    }

    fn update_items(&mut self, element: &ItemElement, update: &str, file: &Path) -> BuildResult<()> {
        let ctx = self.ctx(file);
        let matcher = SpecMatcher::new(self.project_dir, &expand_items(update, ITEM_OPTIONS, &ctx)?);
        let targets: Vec<ItemId> = self
            .items
            .ids_of_type(&element.item_type)
            .into_iter()
            .filter(|&id| matcher.matches(&unescape(&self.items.get(id).spec)))
            .collect();

        let mut changes: Vec<(ItemId, String, String, String)> = Vec::new();
        for id in targets {
            let mut subject = self.items.task_item(id);
            for metadata in &element.metadata {
                let ctx = self.ctx(file).with_item(&subject);
                if let Some(condition) = &metadata.condition {
                    if !Condition::parse(condition)?.evaluate(METADATA_OPTIONS, &ctx)? {
                        continue;
                    }
                }
                let value = expand_string(&metadata.value, METADATA_OPTIONS, &ctx)?;
                subject.set_metadata(&metadata.name, &value)?;
                changes.push((id, metadata.name.clone(), metadata.value.clone(), value));
            }
        }

        tracing::debug!(item_type = %element.item_type, changes = changes.len(), "updated items");
        for (id, name, raw, value) in changes {
            self.items.set_metadata(id, &name, &raw, &value)?;
        }
        Ok(())
    }

    fn remove_items(&mut self, element: &ItemElement, remove: &str, file: &Path) -> BuildResult<()> {
        let ctx = self.ctx(file);
        let matcher = SpecMatcher::new(self.project_dir, &expand_items(remove, ITEM_OPTIONS, &ctx)?);
        let doomed: Vec<ItemId> = self
            .items
            .ids_of_type(&element.item_type)
            .into_iter()
            .filter(|&id| matcher.matches(&unescape(&self.items.get(id).spec)))
            .collect();
        tracing::debug!(item_type = %element.item_type, count = doomed.len(), "removing items");
        for id in doomed {
            self.items.remove(id);
        }
        Ok(())
    }
}

fn branch_elements(choose: &Choose, branch: Branch) -> &[Element] {
    match branch {
        Branch::When(index) => choose
            .when
            .get(index)
            .map(|w| w.elements.as_slice())
            .unwrap_or(&[]),
        Branch::Otherwise => &choose.otherwise,
    }
}

fn references_metadata(text: &str) -> bool {
    Expression::parse(text, METADATA_OPTIONS)
        .map(|e| e.metadata_references().next().is_some())
        .unwrap_or(false)
}

/// Matches item specs against exclude/update/remove lists.
///
/// Literal entries compare as normalized paths; wildcard entries are globs.
pub struct SpecMatcher<'d> {
    project_dir: &'d Path,
    literals: Vec<std::path::PathBuf>,
    globs: GlobSet,
}

impl<'d> SpecMatcher<'d> {
    pub fn new(project_dir: &'d Path, entries: &[TaskItem]) -> Self {
        let mut literals = Vec::new();
        let mut builder = GlobSetBuilder::new();
        for entry in entries {
            let spec = entry.item_spec();
            if has_wildcard(entry.spec()) {
                let pattern = normalize_separators(&spec);
                match GlobBuilder::new(pattern.trim_start_matches("./"))
                    .literal_separator(true)
                    .build()
                {
                    Ok(glob) => {
                        builder.add(glob);
                    }
                    Err(err) => tracing::warn!(pattern = %spec, error = %err, "invalid wildcard"),
                }
            } else {
                literals.push(normalize_path(&project_dir.join(&spec)));
            }
        }
        let globs = builder.build().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to build wildcard set");
            GlobSet::empty()
        });
        SpecMatcher {
            project_dir,
            literals,
            globs,
        }
    }

    pub fn matches(&self, spec: &str) -> bool {
        let relative = normalize_separators(spec);
        if self.globs.is_match(relative.trim_start_matches("./")) {
            return true;
        }
        let full = normalize_path(&self.project_dir.join(spec));
        self.literals.iter().any(|l| *l == full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_matcher() {
        let entries = vec![
            TaskItem::new("src/gen/*.cs"),
            TaskItem::new("./README.md"),
        ];
        let matcher = SpecMatcher::new(Path::new("/p"), &entries);
        assert!(matcher.matches("src/gen/a.cs"));
        assert!(!matcher.matches("src/gen/deep/a.cs"));
        assert!(matcher.matches("README.md"));
        assert!(matcher.matches("docs/../README.md"));
        assert!(!matcher.matches("src/main.cs"));
    }

    #[test]
    fn test_references_metadata() {
        assert!(references_metadata("%(Filename).obj"));
        assert!(!references_metadata("$(OutDir)"));
    }
}
