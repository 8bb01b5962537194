//! Non-fatal binding defects and where they are reported.
//!
//! A descriptor without a symbol name, or a symbol missing from the loaded
//! image, never fails a load. The binder reports the defect to a
//! [`BindingDiagnostics`] sink and carries on with the remaining descriptors.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

/// A descriptor that could not be bound.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BindingDefect {
    /// The resolver had no exported name for the descriptor.
    #[error("no symbol name mapped for descriptor {descriptor}")]
    MissingSymbolName { descriptor: &'static str },

    /// The exported name is absent from the loaded image.
    #[error("symbol {symbol} for descriptor {descriptor} not found in loaded image")]
    SymbolNotFound {
        descriptor: &'static str,
        symbol: String,
    },
}

impl BindingDefect {
    /// Name of the descriptor the defect belongs to.
    #[must_use]
    pub fn descriptor(&self) -> &'static str {
        match self {
            Self::MissingSymbolName { descriptor } | Self::SymbolNotFound { descriptor, .. } => {
                *descriptor
            }
        }
    }
}

/// Receives binding defects during the population pass.
pub trait BindingDiagnostics: Send + Sync {
    fn report(&self, defect: &BindingDefect);
}

/// Logs every defect at `WARN` level. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl BindingDiagnostics for TracingDiagnostics {
    fn report(&self, defect: &BindingDefect) {
        match defect {
            BindingDefect::MissingSymbolName { descriptor } => {
                warn!(descriptor = %descriptor, "No symbol name mapped for descriptor");
            }
            BindingDefect::SymbolNotFound { descriptor, symbol } => {
                warn!(
                    descriptor = %descriptor,
                    symbol = %symbol,
                    "Symbol not found in loaded image"
                );
            }
        }
    }
}

/// Records defects for later inspection. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct CollectingDiagnostics {
    defects: Arc<Mutex<Vec<BindingDefect>>>,
}

impl CollectingDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the defects reported so far.
    #[must_use]
    pub fn defects(&self) -> Vec<BindingDefect> {
        self.defects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drains the recorded defects.
    pub fn take(&self) -> Vec<BindingDefect> {
        std::mem::take(&mut *self.defects.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl BindingDiagnostics for CollectingDiagnostics {
    fn report(&self, defect: &BindingDefect) {
        self.defects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(defect.clone());
    }
}

impl<F> BindingDiagnostics for F
where
    F: Fn(&BindingDefect) + Send + Sync,
{
    fn report(&self, defect: &BindingDefect) {
        self(defect);
    }
}
