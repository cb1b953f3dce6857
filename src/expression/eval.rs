//! Expression evaluation
//!
//! Two modes: string mode renders every fragment to text, item-list mode
//! yields a list of items and enforces the rule that a bare item list may
//! only sit next to `;` or nothing. All results are escaped.

use crate::error::{BuildResult, StructuralError};
use crate::expression::functions;
use crate::expression::parser::Expression;
use crate::expression::reference::{Fragment, ItemReference, ParseOptions};
use crate::project::context::EvalContext;
use crate::project::item::TaskItem;

/// Options for a transform template: metadata and properties only
const TRANSFORM_OPTIONS: ParseOptions = ParseOptions {
    split: false,
    allow_items: false,
    allow_metadata: true,
};

impl Expression {
    /// Render the expression as one escaped string
    pub fn evaluate_string(&self, ctx: &EvalContext) -> BuildResult<String> {
        let mut out = String::new();
        for fragment in self.fragments() {
            match fragment {
                Fragment::Item(reference) => out.push_str(&render_item_list(reference, ctx)?),
                other => out.push_str(&render_scalar(other, ctx)?),
            }
        }
        Ok(out)
    }

    /// Evaluate to a list of items.
    ///
    /// Text around references is split on `;`, trimmed, and empty entries
    /// are dropped. Items produced by an item reference keep their metadata.
    pub fn evaluate_items(&self, ctx: &EvalContext) -> BuildResult<Vec<TaskItem>> {
        self.check_concatenation()?;

        let mut items = Vec::new();
        let mut buffer = String::new();

        for fragment in self.fragments() {
            match fragment {
                Fragment::Item(reference) if reference.separator.is_none() => {
                    flush(&mut buffer, &mut items);
                    items.extend(expand_item_list(reference, ctx)?);
                }
                Fragment::Item(reference) => {
                    push_split(&render_item_list(reference, ctx)?, &mut buffer, &mut items);
                }
                other => push_split(&render_scalar(other, ctx)?, &mut buffer, &mut items),
            }
        }
        flush(&mut buffer, &mut items);
        Ok(items)
    }

    fn check_concatenation(&self) -> BuildResult<()> {
        let fragments = self.fragments();
        for (index, fragment) in fragments.iter().enumerate() {
            if !matches!(fragment, Fragment::Item(_)) {
                continue;
            }

            let before = fragments[..index].iter().rev().find(|f| !f.is_blank());
            let after = fragments[index + 1..].iter().find(|f| !f.is_blank());

            for (neighbour, is_before) in [(before, true), (after, false)] {
                if let Some(with) = neighbour.and_then(|f| concatenation_conflict(f, is_before)) {
                    return Err(StructuralError::ItemConcatenation {
                        expression: self.text().to_string(),
                        with,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// What a neighbour of an item list conflicts with, if anything
fn concatenation_conflict(fragment: &Fragment, is_before: bool) -> Option<&'static str> {
    match fragment {
        Fragment::Literal(text) => {
            let text = text.trim();
            let separated = if is_before {
                text.ends_with(';')
            } else {
                text.starts_with(';')
            };
            if separated {
                None
            } else {
                Some("string")
            }
        }
        Fragment::Property(_) | Fragment::Function(_) => Some("property"),
        Fragment::Metadata(_) => Some("metadata"),
        Fragment::Item(_) => Some("item list"),
    }
}

fn push_split(text: &str, buffer: &mut String, items: &mut Vec<TaskItem>) {
    let mut parts = text.split(';');
    if let Some(first) = parts.next() {
        buffer.push_str(first);
    }
    for part in parts {
        flush(buffer, items);
        buffer.push_str(part);
    }
}

fn flush(buffer: &mut String, items: &mut Vec<TaskItem>) {
    let spec = buffer.trim();
    if !spec.is_empty() {
        items.push(TaskItem::new(spec));
    }
    buffer.clear();
}

fn render_scalar(fragment: &Fragment, ctx: &EvalContext) -> BuildResult<String> {
    Ok(match fragment {
        Fragment::Literal(text) => text.clone(),
        Fragment::Property(reference) => ctx.property(&reference.name).unwrap_or_default(),
        Fragment::Function(invocation) => functions::invoke(invocation, ctx)?,
        Fragment::Metadata(reference) => ctx.metadata(reference),
        Fragment::Item(reference) => render_item_list(reference, ctx)?,
    })
}

/// The items of a reference, transformed when a transform is given
fn expand_item_list(reference: &ItemReference, ctx: &EvalContext) -> BuildResult<Vec<TaskItem>> {
    let items = ctx.items_of(&reference.item_type);
    let Some(transform) = &reference.transform else {
        return Ok(items);
    };

    let template = Expression::parse(transform, TRANSFORM_OPTIONS)?;
    let mut out = Vec::with_capacity(items.len());
    for item in &items {
        let spec = template.evaluate_string(&ctx.with_item(item))?;
        if spec.trim().is_empty() {
            continue;
        }
        let mut transformed = item.clone();
        transformed.set_spec(spec);
        out.push(transformed);
    }
    Ok(out)
}

/// An item list rendered as text, joined by its separator (default `;`)
fn render_item_list(reference: &ItemReference, ctx: &EvalContext) -> BuildResult<String> {
    let separator = match &reference.separator {
        Some(raw) => Expression::parse(raw, ParseOptions::PROPERTIES)?.evaluate_string(ctx)?,
        None => ";".to_string(),
    };
    let specs: Vec<String> = expand_item_list(reference, ctx)?
        .into_iter()
        .map(|item| item.spec().to_string())
        .collect();
    Ok(specs.join(&separator))
}

/// Parse and render `text` as an escaped string
pub fn expand_string(text: &str, options: ParseOptions, ctx: &EvalContext) -> BuildResult<String> {
    Expression::parse(text, options)?.evaluate_string(ctx)
}

/// Parse and evaluate `text` to a list of items
pub fn expand_items(text: &str, options: ParseOptions, ctx: &EvalContext) -> BuildResult<Vec<TaskItem>> {
    Expression::parse(text, options.with_split(true))?.evaluate_items(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::project::fs::DiskFileSystem;
    use crate::project::item::{ItemStore, NewItem};
    use crate::project::metadata::MetadataTable;
    use crate::project::property::{Property, PropertyKind, PropertyTable};
    use std::path::Path;

    struct Fixture {
        properties: PropertyTable,
        items: ItemStore,
    }

    impl Fixture {
        fn new() -> Self {
            let mut properties = PropertyTable::new();
            properties
                .set(Property::new("Configuration", "Debug", PropertyKind::Normal))
                .unwrap();
            properties
                .set(Property::new("Extra", "x.cs;y.cs", PropertyKind::Normal))
                .unwrap();

            let mut items = ItemStore::new();
            let group = items.new_group();
            for (spec, culture) in [("src/a.cs", "en"), ("src/b.cs", "fr")] {
                let mut metadata = MetadataTable::new();
                metadata.set("Culture", culture, culture);
                items.add(
                    group,
                    NewItem {
                        item_type: "Compile".to_string(),
                        include: spec.to_string(),
                        spec: spec.to_string(),
                        metadata,
                        ..NewItem::default()
                    },
                );
            }
            Fixture { properties, items }
        }

        fn ctx(&self) -> EvalContext<'_> {
            EvalContext::new(&self.properties, &self.items, Path::new("/p"), &DiskFileSystem)
        }
    }

    fn specs(items: &[TaskItem]) -> Vec<String> {
        items.iter().map(|i| i.item_spec()).collect()
    }

    #[test]
    fn test_string_mode() {
        let fx = Fixture::new();
        let value = expand_string("bin/$(Configuration)/@(Compile)", ParseOptions::ITEMS, &fx.ctx()).unwrap();
        assert_eq!(value, "bin/Debug/src/a.cs;src/b.cs");
    }

    #[test]
    fn test_undefined_references_are_empty() {
        let fx = Fixture::new();
        let value = expand_string("[$(Nope)][@(None)]", ParseOptions::ITEMS, &fx.ctx()).unwrap();
        assert_eq!(value, "[][]");
    }

    #[test]
    fn test_transform_and_separator() {
        let fx = Fixture::new();
        let value = expand_string(
            "@(Compile->'%(Filename).%(Culture).obj', ' ')",
            ParseOptions::ITEMS,
            &fx.ctx(),
        )
        .unwrap();
        assert_eq!(value, "a.en.obj b.fr.obj");
    }

    #[test]
    fn test_item_mode_splits_and_trims() {
        let fx = Fixture::new();
        let items = expand_items(" first ; @(Compile) ;; $(Extra) ", ParseOptions::ITEMS, &fx.ctx()).unwrap();
        assert_eq!(specs(&items), vec!["first", "src/a.cs", "src/b.cs", "x.cs", "y.cs"]);
        assert_eq!(items[1].custom_metadata("Culture").as_deref(), Some("en"));
    }

    #[test]
    fn test_item_mode_transform_keeps_metadata() {
        let fx = Fixture::new();
        let items = expand_items("@(Compile->'%(Filename).obj')", ParseOptions::ITEMS, &fx.ctx()).unwrap();
        assert_eq!(specs(&items), vec!["a.obj", "b.obj"]);
        assert_eq!(items[1].custom_metadata("Culture").as_deref(), Some("fr"));
    }

    #[test]
    fn test_escaped_semicolon_does_not_split() {
        let fx = Fixture::new();
        let items = expand_items("a%3bb;c", ParseOptions::ITEMS, &fx.ctx()).unwrap();
        assert_eq!(specs(&items), vec!["a;b", "c"]);
    }

    #[test]
    fn test_concatenation_errors() {
        let fx = Fixture::new();
        let cases = [
            ("@(Compile)suffix", "string"),
            ("prefix@(Compile)", "string"),
            ("@(Compile)$(Configuration)", "property"),
            ("@(Compile)@(Compile)", "item list"),
            ("%(Culture)@(Compile)", "metadata"),
            ("@(Compile, ' ')tail", "string"),
            ("head@(Compile->'%(Filename)', ',')", "string"),
            ("@(Compile)@(Compile, ' ')", "item list"),
        ];
        for (text, expected) in cases {
            let err = expand_items(text, ParseOptions::ALL, &fx.ctx()).unwrap_err();
            match err {
                BuildError::Structural(StructuralError::ItemConcatenation { with, .. }) => {
                    assert_eq!(with, expected, "for {}", text)
                }
                other => panic!("unexpected error for {}: {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_whitespace_and_separators_are_allowed_neighbours() {
        let fx = Fixture::new();
        assert!(expand_items("  @(Compile)  ", ParseOptions::ITEMS, &fx.ctx()).is_ok());
        assert!(expand_items("a;@(Compile);b", ParseOptions::ITEMS, &fx.ctx()).is_ok());
        assert!(expand_items("@(Compile, ' ');tail", ParseOptions::ITEMS, &fx.ctx()).is_ok());
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let fx = Fixture::new();
        let expr = Expression::parse("$(Configuration);@(Compile->'%(Extension)')", ParseOptions::ITEMS).unwrap();
        let first = expr.evaluate_string(&fx.ctx()).unwrap();
        let second = expr.evaluate_string(&fx.ctx()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "Debug;.cs;.cs");
    }
}
