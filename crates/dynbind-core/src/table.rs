//! Symbol binding table.
//!
//! Maps exported symbol names to [`BoundFunction`]s. The table is filled by a
//! single pass over the catalogue right after a successful load and emptied
//! whenever the image is released.

use std::collections::{HashMap, hash_map::Entry};

use dynbind_abi::{Bound, BoundFunction, FunctionCatalogue, NativeSignature, SymbolNameResolver};
use tracing::debug;

use crate::{
    diagnostics::{BindingDefect, BindingDiagnostics},
    gateway::NativeLoader,
};

/// Outcome of one population pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindingReport {
    /// Descriptors that produced a new table entry.
    pub bound: usize,
    /// Descriptors skipped for a missing name or symbol.
    pub skipped: usize,
    /// Descriptors whose symbol was already bound by an earlier descriptor.
    pub duplicates: usize,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    functions: HashMap<String, BoundFunction>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds every descriptor of `catalogue` that resolves against `handle`.
    ///
    /// Descriptors are visited in declaration order. A descriptor without a
    /// symbol name, or whose symbol the image does not export, is reported to
    /// `diagnostics` and skipped. When two descriptors map to the same symbol
    /// the first one wins.
    pub fn populate<L>(
        &mut self,
        catalogue: &FunctionCatalogue,
        resolver: &dyn SymbolNameResolver,
        loader: &L,
        handle: &L::Handle,
        diagnostics: &dyn BindingDiagnostics,
    ) -> BindingReport
    where
        L: NativeLoader + ?Sized,
    {
        let mut report = BindingReport::default();

        for descriptor in catalogue {
            let Some(symbol) = resolver.resolve_symbol_name(descriptor) else {
                diagnostics.report(&BindingDefect::MissingSymbolName {
                    descriptor: descriptor.name(),
                });
                report.skipped += 1;
                continue;
            };

            let Some(addr) = loader.resolve_symbol(handle, &symbol) else {
                diagnostics.report(&BindingDefect::SymbolNotFound {
                    descriptor: descriptor.name(),
                    symbol: symbol.into_owned(),
                });
                report.skipped += 1;
                continue;
            };

            match self.functions.entry(symbol.into_owned()) {
                Entry::Occupied(entry) => {
                    debug!(
                        symbol = %entry.key(),
                        descriptor = %descriptor.name(),
                        "Symbol already bound, keeping first binding"
                    );
                    report.duplicates += 1;
                }
                Entry::Vacant(slot) => {
                    debug!(
                        symbol = %slot.key(),
                        descriptor = %descriptor.name(),
                        signature = %descriptor.signature(),
                        "Bound native function"
                    );
                    // SAFETY: declaring the descriptor promised the prototype,
                    // and `handle` keeps the image loaded while the table lives.
                    slot.insert(unsafe { descriptor.bind(addr) });
                    report.bound += 1;
                }
            }
        }

        report
    }

    /// Looks up a bound function. Empty names are never bound.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoundFunction> {
        if name.is_empty() {
            return None;
        }
        self.functions.get(name)
    }

    /// Looks up a bound function and returns it as `F` if the shapes match.
    ///
    /// The callable borrows the table, so it cannot be kept across a
    /// [`clear`](Self::clear).
    #[must_use]
    pub fn get_as<F: NativeSignature>(&self, name: &str) -> Option<Bound<'_, F>> {
        self.get(name).and_then(BoundFunction::get::<F>)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Bound symbol names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn clear(&mut self) {
        self.functions.clear();
    }
}
