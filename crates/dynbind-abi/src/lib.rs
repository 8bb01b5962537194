//! Function descriptors and calling shapes for native library bindings.
//!
//! This crate defines the vocabulary shared between a binder and the code that
//! declares which exported functions it expects from a native image:
//!
//! - [`NativeSignature`]: an `extern "C"` function pointer type that can be
//!   rebuilt from a raw code address.
//! - [`FunctionDescriptor`]: one expected export, its calling shape and an
//!   optional symbol annotation.
//! - [`FunctionCatalogue`]: the fixed, ordered set of descriptors a binder is
//!   constructed with.
//! - [`BoundFunction`]: a resolved export, typed once at bind time and cached.
//! - [`Bound`]: a typed callable borrowed from a [`BoundFunction`].
//! - [`SymbolNameResolver`]: the seam that maps descriptors to exported names.
//!
//! # Declaring a catalogue
//!
//! ```
//! use dynbind_abi::function_catalogue;
//!
//! function_catalogue! {
//!     /// Functions exported by the math fixture.
//!     pub static MATH = unsafe {
//!         Add => "add": extern "C" fn(i32, i32) -> i32,
//!         MissingFn => "missing_fn": extern "C" fn(),
//!     };
//! }
//!
//! assert_eq!(MATH.len(), 2);
//! assert_eq!(MATH.iter().next().and_then(|d| d.symbol()), Some("add"));
//! ```
//!
//! # Safety
//!
//! Declaring a descriptor is `unsafe`: the declaration is a promise that the
//! exported symbol has exactly the given prototype. Typed callables are handed
//! out as [`Bound`] values that borrow the binding they came from, so safe code
//! cannot keep one past the release of its image.

use std::{
    any::Any,
    ffi::c_void,
    fmt,
    marker::PhantomData,
    ops::Deref,
    ptr::{self, NonNull},
};

mod resolver;
mod signature;

pub use resolver::{AnnotatedSymbols, StaticSymbolTable, SymbolNameResolver};
pub use signature::NativeSignature;

/// One expected export: its name, optional symbol annotation and calling shape.
#[derive(Clone, Copy)]
pub struct FunctionDescriptor {
    name: &'static str,
    symbol: Option<&'static str>,
    signature: fn() -> &'static str,
    bind: unsafe fn(NonNull<c_void>) -> BoundFunction,
}

impl FunctionDescriptor {
    /// Declares a descriptor whose calling shape is `F`.
    ///
    /// # Safety
    ///
    /// Any symbol this descriptor is resolved to must be a function with the
    /// calling convention and prototype of `F`.
    #[must_use]
    pub const unsafe fn of<F: NativeSignature>(name: &'static str) -> Self {
        Self {
            name,
            symbol: None,
            signature: std::any::type_name::<F>,
            bind: bind_as::<F>,
        }
    }

    /// Annotates the descriptor with the symbol name it is exported under.
    #[must_use]
    pub const fn with_symbol(mut self, symbol: &'static str) -> Self {
        self.symbol = Some(symbol);
        self
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn symbol(&self) -> Option<&'static str> {
        self.symbol
    }

    /// Type name of the calling shape, e.g. `extern "C" fn(i32, i32) -> i32`.
    #[must_use]
    pub fn signature(&self) -> &'static str {
        (self.signature)()
    }

    /// Builds the typed callable for a resolved code address.
    ///
    /// # Safety
    ///
    /// `addr` must be the entry point of a function matching this descriptor's
    /// calling shape, resolved from an image that is currently loaded. The
    /// returned binding must be dropped before that image is released.
    #[must_use]
    pub unsafe fn bind(&self, addr: NonNull<c_void>) -> BoundFunction {
        unsafe { (self.bind)(addr) }
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("symbol", &self.symbol)
            .field("signature", &self.signature())
            .finish()
    }
}

unsafe fn bind_as<F: NativeSignature>(addr: NonNull<c_void>) -> BoundFunction {
    let function = unsafe { F::from_raw(addr) };
    BoundFunction {
        address: addr.as_ptr().expose_provenance(),
        signature: std::any::type_name::<F>(),
        function: Box::new(function),
    }
}

/// A resolved export, typed at bind time.
///
/// The typed pointer is constructed once and cached; [`BoundFunction::get`]
/// lends it out as a [`Bound`] that cannot outlive `self`.
pub struct BoundFunction {
    address: usize,
    signature: &'static str,
    function: Box<dyn Any + Send + Sync>,
}

impl BoundFunction {
    /// Returns the typed pointer if `F` is the calling shape it was bound as.
    #[must_use]
    pub fn get<F: NativeSignature>(&self) -> Option<Bound<'_, F>> {
        self.function.downcast_ref::<F>().copied().map(Bound::new)
    }

    #[must_use]
    pub fn address(&self) -> *const c_void {
        ptr::with_exposed_provenance(self.address)
    }

    #[must_use]
    pub fn signature(&self) -> &'static str {
        self.signature
    }
}

impl fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFunction")
            .field("address", &self.address())
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A typed callable borrowed from the binding that produced it.
///
/// Derefs to `F`, so it is called like the pointer itself. The borrow keeps
/// the owner of the binding, and with it the image, from being released while
/// the callable is in scope.
#[derive(Clone, Copy)]
pub struct Bound<'lib, F> {
    function: F,
    binding: PhantomData<&'lib BoundFunction>,
}

impl<F: NativeSignature> Bound<'_, F> {
    fn new(function: F) -> Self {
        Self {
            function,
            binding: PhantomData,
        }
    }

    #[must_use]
    pub fn address(&self) -> *const c_void {
        self.function.address()
    }

    /// Detaches the pointer from the borrow.
    ///
    /// # Safety
    ///
    /// The returned pointer must not be called after the image it was
    /// resolved from is released.
    #[must_use]
    pub unsafe fn into_raw(self) -> F {
        self.function
    }
}

impl<F> Deref for Bound<'_, F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.function
    }
}

impl<F: NativeSignature> fmt::Debug for Bound<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bound")
            .field("address", &self.address())
            .field("signature", &std::any::type_name::<F>())
            .finish()
    }
}

/// The fixed, ordered set of descriptors a binder binds after each load.
#[derive(Debug, Clone, Copy)]
pub struct FunctionCatalogue {
    descriptors: &'static [FunctionDescriptor],
}

impl FunctionCatalogue {
    #[must_use]
    pub const fn new(descriptors: &'static [FunctionDescriptor]) -> Self {
        Self { descriptors }
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self { descriptors: &[] }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'static, FunctionDescriptor> {
        self.descriptors.iter()
    }

    /// Finds a descriptor by its declared name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&'static FunctionDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }
}

impl IntoIterator for &FunctionCatalogue {
    type Item = &'static FunctionDescriptor;
    type IntoIter = std::slice::Iter<'static, FunctionDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Declares a `static` [`FunctionCatalogue`].
///
/// Each entry is `Name => "exported_symbol": fn-type`. The `unsafe` block
/// acknowledges that every symbol really has the declared prototype.
#[macro_export]
macro_rules! function_catalogue {
    (
        $(#[$meta:meta])*
        $vis:vis static $catalogue:ident = unsafe {
            $( $name:ident => $symbol:literal : $sig:ty ),* $(,)?
        };
    ) => {
        $(#[$meta])*
        $vis static $catalogue: $crate::FunctionCatalogue = {
            const DESCRIPTORS: &[$crate::FunctionDescriptor] = &[
                $(
                    unsafe { $crate::FunctionDescriptor::of::<$sig>(stringify!($name)) }
                        .with_symbol($symbol)
                ),*
            ];
            $crate::FunctionCatalogue::new(DESCRIPTORS)
        };
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    type AddFn = extern "C" fn(i32, i32) -> i32;
    type LenFn = unsafe extern "C" fn(*const u8, usize) -> usize;

    extern "C" fn add(a: i32, b: i32) -> i32 {
        a + b
    }

    function_catalogue! {
        static FIXTURE = unsafe {
            Add => "add": AddFn,
            Length => "byte_len": LenFn,
            AddAgain => "add": AddFn,
        };
    }

    fn addr_of(function: AddFn) -> NonNull<c_void> {
        NonNull::new(function.address().cast_mut()).expect("function address is never null")
    }

    #[test]
    fn test_catalogue_macro_preserves_declaration_order() {
        let names: Vec<_> = FIXTURE.iter().map(FunctionDescriptor::name).collect();
        let symbols: Vec<_> = FIXTURE.iter().filter_map(FunctionDescriptor::symbol).collect();

        assert_eq!(names, ["Add", "Length", "AddAgain"]);
        assert_eq!(symbols, ["add", "byte_len", "add"]);
        assert_eq!(FIXTURE.len(), 3);
    }

    #[test]
    fn test_catalogue_find_by_descriptor_name() {
        let found = FIXTURE.find("Length").expect("descriptor should exist");

        assert_eq!(found.symbol(), Some("byte_len"));
        assert!(FIXTURE.find("Nope").is_none());
    }

    #[test]
    fn test_empty_catalogue() {
        let catalogue = FunctionCatalogue::empty();

        assert!(catalogue.is_empty());
        assert_eq!((&catalogue).into_iter().count(), 0);
    }

    #[test]
    fn test_descriptor_signature_names_calling_shape() {
        let descriptor = FIXTURE.find("Add").expect("descriptor should exist");

        assert_eq!(descriptor.signature(), std::any::type_name::<AddFn>());
    }

    #[test]
    fn test_bind_yields_callable_for_matching_shape() {
        // Arrange
        let descriptor = FIXTURE.find("Add").expect("descriptor should exist");

        // Act
        let bound = unsafe { descriptor.bind(addr_of(add)) };

        // Assert
        let function = bound.get::<AddFn>().expect("shape should match");
        assert_eq!(function(2, 3), 5);
        assert_eq!(bound.address(), (add as AddFn).address());
    }

    #[test]
    fn test_bound_function_rejects_mismatched_shape() {
        let descriptor = FIXTURE.find("Add").expect("descriptor should exist");

        let bound = unsafe { descriptor.bind(addr_of(add)) };

        assert!(bound.get::<LenFn>().is_none());
        assert!(bound.get::<extern "C" fn(i32) -> i32>().is_none());
    }

    #[test]
    fn test_repeated_get_returns_same_address() {
        let descriptor = FIXTURE.find("Add").expect("descriptor should exist");
        let bound = unsafe { descriptor.bind(addr_of(add)) };

        let first = bound.get::<AddFn>().expect("shape should match");
        let second = bound.get::<AddFn>().expect("shape should match");

        assert_eq!(first.address(), second.address());
    }

    #[test]
    fn test_bound_derefs_to_typed_pointer() {
        let descriptor = FIXTURE.find("Add").expect("descriptor should exist");
        let bound = unsafe { descriptor.bind(addr_of(add)) };

        let function = bound.get::<AddFn>().expect("shape should match");
        let detached = unsafe { function.into_raw() };

        assert_eq!((*function)(4, 5), 9);
        assert_eq!(detached.address(), function.address());
        assert!(format!("{function:?}").contains("Bound"));
    }

    #[test]
    fn test_debug_output_names_fields() {
        let descriptor = FIXTURE.find("Length").expect("descriptor should exist");

        let debug = format!("{descriptor:?}");

        assert!(debug.contains("Length"));
        assert!(debug.contains("byte_len"));
    }

    #[test]
    fn test_bound_function_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BoundFunction>();
        assert_send_sync::<Bound<'static, AddFn>>();
        assert_send_sync::<FunctionCatalogue>();
    }
}
