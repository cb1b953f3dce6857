//! Batching: partition item lists into buckets by metadata values
//!
//! Every `%(...)` reference found at the top level of a set of expressions
//! contributes to a bucket key. Items sharing the same key land in the same
//! bucket and the body that consumed the expressions runs once per bucket.

use crate::error::{BuildResult, StructuralError};
use crate::expression::parser::Expression;
use crate::expression::reference::{MetadataReference, ParseOptions};
use crate::project::context::EvalContext;
use crate::project::item::TaskItem;
use std::collections::HashMap;
use std::rc::Rc;

/// Item lists keyed by item type, in first-reference order
pub type ItemLists = Vec<(String, Vec<TaskItem>)>;

fn find<'l>(lists: &'l ItemLists, item_type: &str) -> Option<&'l [TaskItem]> {
    lists
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(item_type))
        .map(|(_, items)| items.as_slice())
}

/// One partition of the batched item lists
#[derive(Debug, Clone)]
pub struct Bucket {
    items: ItemLists,
    common: Rc<ItemLists>,
    metadata: Vec<(MetadataReference, String)>,
}

impl Bucket {
    /// Items of a type visible in this bucket: batched first, then common
    pub fn items_of(&self, item_type: &str) -> Option<&[TaskItem]> {
        find(&self.items, item_type).or_else(|| find(&self.common, item_type))
    }

    /// This bucket's share of a batched item type
    pub fn batched_items(&self, item_type: &str) -> Option<&[TaskItem]> {
        find(&self.items, item_type)
    }

    pub fn batched_types(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(t, _)| t.as_str())
    }

    /// Unbatched item lists shared by every bucket of one batching call
    pub fn common(&self) -> &ItemLists {
        &self.common
    }

    /// Number of batched items in this bucket
    pub fn len(&self) -> usize {
        self.items.iter().map(|(_, items)| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Escaped value of a referenced metadata for this bucket
    pub fn metadata_value(&self, reference: &MetadataReference) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(r, _)| r.same_as(reference))
            .map(|(_, value)| value.as_str())
    }

    /// Make items added during execution visible to later lookups in this
    /// bucket; returns false when the bucket does not hold the type
    pub fn append_items(&mut self, item_type: &str, added: &[TaskItem]) -> bool {
        if let Some((_, items)) = self
            .items
            .iter_mut()
            .find(|(t, _)| t.eq_ignore_ascii_case(item_type))
        {
            items.extend_from_slice(added);
            return true;
        }
        if find(&self.common, item_type).is_some() {
            let common = Rc::make_mut(&mut self.common);
            if let Some((_, items)) = common
                .iter_mut()
                .find(|(t, _)| t.eq_ignore_ascii_case(item_type))
            {
                items.extend_from_slice(added);
            }
            return true;
        }
        false
    }
}

/// Result of a batching call
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// No metadata was referenced; run once, unbatched
    NoBatching,
    Buckets(Vec<Bucket>),
}

impl BatchOutcome {
    pub fn bucket_count(&self) -> usize {
        match self {
            BatchOutcome::NoBatching => 0,
            BatchOutcome::Buckets(buckets) => buckets.len(),
        }
    }
}

/// Partition the items referenced by raw expression texts
pub fn batch(expressions: &[&str], ctx: &EvalContext) -> BuildResult<BatchOutcome> {
    let parsed = expressions
        .iter()
        .map(|text| Expression::parse(text, ParseOptions::ALL))
        .collect::<BuildResult<Vec<_>>>()?;
    batch_expressions(&parsed, ctx)
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|t| t.eq_ignore_ascii_case(name)) {
        list.push(name.to_string());
    }
}

fn contains(list: &[String], name: &str) -> bool {
    list.iter().any(|t| t.eq_ignore_ascii_case(name))
}

/// Partition the items referenced by already parsed expressions
pub fn batch_expressions(expressions: &[Expression], ctx: &EvalContext) -> BuildResult<BatchOutcome> {
    let mut referenced_types: Vec<String> = Vec::new();
    let mut references: Vec<MetadataReference> = Vec::new();

    for expression in expressions {
        for item in expression.item_references() {
            push_unique(&mut referenced_types, &item.item_type);
        }
        for metadata in expression.metadata_references() {
            if !references.iter().any(|r| r.same_as(metadata)) {
                references.push(metadata.clone());
            }
        }
    }

    if references.is_empty() {
        return Ok(BatchOutcome::NoBatching);
    }

    let unqualified: Vec<&MetadataReference> =
        references.iter().filter(|r| !r.is_qualified()).collect();
    let has_qualified = references.iter().any(|r| r.is_qualified());

    if let Some(first) = unqualified.first() {
        if referenced_types.is_empty() && !has_qualified {
            return Err(StructuralError::UnqualifiedMetadata(first.name.clone()).into());
        }
    }

    let mut batched_types: Vec<String> = Vec::new();
    if !unqualified.is_empty() {
        for item_type in &referenced_types {
            push_unique(&mut batched_types, item_type);
        }
    }
    for reference in &references {
        if let Some(qualifier) = &reference.item_type {
            push_unique(&mut batched_types, qualifier);
        }
    }

    let common: ItemLists = referenced_types
        .iter()
        .filter(|t| !contains(&batched_types, t))
        .map(|t| (t.clone(), ctx.items_of(t)))
        .collect();
    let common = Rc::new(common);

    let mut buckets: Vec<Bucket> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for item_type in &batched_types {
        let validate_unqualified = contains(&referenced_types, item_type);

        for item in ctx.items_of(item_type) {
            let mut key = String::new();
            let mut values = Vec::with_capacity(references.len());

            for reference in &references {
                let value = if reference.applies_to(item_type) {
                    match ctx.item_metadata(&item, &reference.name) {
                        Some(value) => value,
                        None if !reference.is_qualified() && validate_unqualified => {
                            return Err(StructuralError::MetadataMissingOnItem {
                                item: item.item_spec(),
                                item_type: item_type.clone(),
                                metadata: reference.name.clone(),
                            }
                            .into());
                        }
                        None => String::new(),
                    }
                } else {
                    String::new()
                };
                key.push_str(&format!(
                    "{}.{}:{},",
                    reference.item_type.as_deref().unwrap_or(""),
                    reference.name,
                    value
                ));
                values.push((reference.clone(), value));
            }

            let index = *index_by_key.entry(key).or_insert_with(|| {
                buckets.push(Bucket {
                    items: batched_types.iter().map(|t| (t.clone(), Vec::new())).collect(),
                    common: Rc::clone(&common),
                    metadata: values,
                });
                buckets.len() - 1
            });

            if let Some((_, items)) = buckets[index]
                .items
                .iter_mut()
                .find(|(t, _)| t.eq_ignore_ascii_case(item_type))
            {
                items.push(item);
            }
        }
    }

    tracing::debug!(
        batched = ?batched_types,
        common = common.len(),
        buckets = buckets.len(),
        "partitioned items into buckets"
    );
    Ok(BatchOutcome::Buckets(buckets))
}
