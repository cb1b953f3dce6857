//! Expression fragments and reference nodes

use std::fmt;

/// Controls which reference kinds the parser recognises.
///
/// Unrecognised kinds are kept as literal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Emit each unescaped `;` as its own literal fragment
    pub split: bool,
    /// Recognise `@(...)`
    pub allow_items: bool,
    /// Recognise `%(...)`
    pub allow_metadata: bool,
}

impl ParseOptions {
    /// Property references only (property pass)
    pub const PROPERTIES: ParseOptions = ParseOptions {
        split: false,
        allow_items: false,
        allow_metadata: false,
    };

    /// Properties and items (item pass, target attributes)
    pub const ITEMS: ParseOptions = ParseOptions {
        split: true,
        allow_items: true,
        allow_metadata: false,
    };

    /// Everything (batchable attributes)
    pub const ALL: ParseOptions = ParseOptions {
        split: true,
        allow_items: true,
        allow_metadata: true,
    };

    pub fn with_split(mut self, split: bool) -> Self {
        self.split = split;
        self
    }
}

/// One piece of a parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Literal(String),
    Property(PropertyReference),
    Function(FunctionInvocation),
    Item(ItemReference),
    Metadata(MetadataReference),
}

impl Fragment {
    pub fn is_separator(&self) -> bool {
        matches!(self, Fragment::Literal(s) if s == ";")
    }

    /// Literal text that is empty or only whitespace
    pub fn is_blank(&self) -> bool {
        matches!(self, Fragment::Literal(s) if s.trim().is_empty())
    }
}

/// `$(Name)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyReference {
    pub name: String,
}

/// `@(Name->'transform', 'separator')`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReference {
    pub item_type: String,
    /// Raw transform template, expanded per item
    pub transform: Option<String>,
    /// Raw separator text, used when the list is rendered as a string
    pub separator: Option<String>,
}

/// `%(Name)` or `%(Item.Name)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataReference {
    pub item_type: Option<String>,
    pub name: String,
}

impl MetadataReference {
    pub fn is_qualified(&self) -> bool {
        self.item_type.is_some()
    }

    /// Case-insensitive identity
    pub fn same_as(&self, other: &MetadataReference) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && match (&self.item_type, &other.item_type) {
                (None, None) => true,
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            }
    }

    /// Does this reference apply to items of `item_type`?
    pub fn applies_to(&self, item_type: &str) -> bool {
        match &self.item_type {
            None => true,
            Some(qualifier) => qualifier.eq_ignore_ascii_case(item_type),
        }
    }
}

impl fmt::Display for MetadataReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item_type {
            Some(item_type) => write!(f, "%({}.{})", item_type, self.name),
            None => write!(f, "%({})", self.name),
        }
    }
}

/// What a property function is invoked on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// The value of a property: `$(Name.Method())`
    Property(String),
    /// A static type: `$([Type]::Method())`
    Static(String),
}

/// A single `.Method(args)` or `.Property` step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub name: String,
    /// Raw argument texts; `None` when written without parentheses
    pub arguments: Option<Vec<String>>,
}

/// `$(Name.Method(...)...)` or `$([Type]::Method(...)...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInvocation {
    pub receiver: Receiver,
    pub calls: Vec<MethodCall>,
}
