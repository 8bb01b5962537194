//! Descriptor-to-symbol name resolution.
//!
//! The binder never guesses exported names. It asks a [`SymbolNameResolver`]
//! for each descriptor and skips descriptors the resolver cannot name.

use std::{borrow::Cow, collections::HashMap};

use crate::FunctionDescriptor;

/// Maps a function descriptor to the symbol name exported by the native image.
pub trait SymbolNameResolver {
    /// Returns the exported symbol name for `descriptor`, or `None` if the
    /// descriptor has no mapping.
    fn resolve_symbol_name(&self, descriptor: &FunctionDescriptor) -> Option<Cow<'static, str>>;
}

/// Resolves names from the symbol annotation carried by each descriptor.
///
/// This is the default resolver. Descriptors declared without
/// [`FunctionDescriptor::with_symbol`] resolve to `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotatedSymbols;

impl SymbolNameResolver for AnnotatedSymbols {
    fn resolve_symbol_name(&self, descriptor: &FunctionDescriptor) -> Option<Cow<'static, str>> {
        descriptor
            .symbol()
            .filter(|symbol| !symbol.is_empty())
            .map(Cow::Borrowed)
    }
}

/// An explicit `descriptor name -> symbol name` table built up front.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbolTable {
    names: HashMap<&'static str, &'static str>,
}

impl StaticSymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mapping, replacing any previous symbol for `descriptor`.
    #[must_use]
    pub fn with(mut self, descriptor: &'static str, symbol: &'static str) -> Self {
        self.names.insert(descriptor, symbol);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(&'static str, &'static str)> for StaticSymbolTable {
    fn from_iter<I: IntoIterator<Item = (&'static str, &'static str)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

impl SymbolNameResolver for StaticSymbolTable {
    fn resolve_symbol_name(&self, descriptor: &FunctionDescriptor) -> Option<Cow<'static, str>> {
        self.names
            .get(descriptor.name())
            .copied()
            .filter(|symbol| !symbol.is_empty())
            .map(Cow::Borrowed)
    }
}

impl<F> SymbolNameResolver for F
where
    F: Fn(&FunctionDescriptor) -> Option<String>,
{
    fn resolve_symbol_name(&self, descriptor: &FunctionDescriptor) -> Option<Cow<'static, str>> {
        self(descriptor)
            .filter(|symbol| !symbol.is_empty())
            .map(Cow::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Unary = extern "C" fn(i32) -> i32;

    const ANNOTATED: FunctionDescriptor =
        unsafe { FunctionDescriptor::of::<Unary>("Square") }.with_symbol("square_i32");
    const BARE: FunctionDescriptor = unsafe { FunctionDescriptor::of::<Unary>("Cube") };

    #[test]
    fn test_annotated_symbols_reads_descriptor_annotation() {
        let resolver = AnnotatedSymbols;

        assert_eq!(
            resolver.resolve_symbol_name(&ANNOTATED).as_deref(),
            Some("square_i32")
        );
        assert_eq!(resolver.resolve_symbol_name(&BARE), None);
    }

    #[test]
    fn test_annotated_symbols_treats_empty_annotation_as_missing() {
        let empty = unsafe { FunctionDescriptor::of::<Unary>("Empty") }.with_symbol("");

        assert_eq!(AnnotatedSymbols.resolve_symbol_name(&empty), None);
    }

    #[test]
    fn test_static_table_maps_by_descriptor_name() {
        // Arrange
        let table = StaticSymbolTable::new().with("Cube", "cube_i32");

        // Act
        let cube = table.resolve_symbol_name(&BARE);
        let square = table.resolve_symbol_name(&ANNOTATED);

        // Assert
        assert_eq!(cube.as_deref(), Some("cube_i32"));
        assert_eq!(square, None, "annotations are ignored by the static table");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_static_table_from_iterator_keeps_last_duplicate() {
        let table: StaticSymbolTable = [("Cube", "first"), ("Cube", "second")]
            .into_iter()
            .collect();

        assert_eq!(table.resolve_symbol_name(&BARE).as_deref(), Some("second"));
    }

    #[test]
    fn test_closure_resolver_derives_names() {
        let resolver = |descriptor: &FunctionDescriptor| {
            Some(format!("prefix_{}", descriptor.name().to_lowercase()))
        };

        assert_eq!(
            resolver.resolve_symbol_name(&BARE).as_deref(),
            Some("prefix_cube")
        );
    }

    #[test]
    fn test_closure_resolver_returning_none_is_missing() {
        let resolver = |_: &FunctionDescriptor| -> Option<String> { None };

        assert!(resolver.resolve_symbol_name(&ANNOTATED).is_none());
        assert!(StaticSymbolTable::new().is_empty());
    }
}
