//! Calling shapes for native function pointers.
//!
//! A [`NativeSignature`] is a concrete `extern "C"` function pointer type. It
//! knows how to turn a raw code address into a typed, callable value and back.

use std::{ffi::c_void, ptr::NonNull};

/// A function pointer type that can be bound from a raw code address.
///
/// Implemented for `extern "C" fn(..) -> R` and `unsafe extern "C" fn(..) -> R`
/// with up to eight arguments.
///
/// # Safety
///
/// Implementors must be function pointer types with the same size and
/// representation as a data pointer. [`NativeSignature::from_raw`] must not
/// inspect the pointee.
pub unsafe trait NativeSignature: Copy + Send + Sync + 'static {
    /// Reinterprets a raw code address as this function pointer type.
    ///
    /// # Safety
    ///
    /// `addr` must be the entry point of a function whose calling convention
    /// and prototype match `Self`. The image that contains it must stay loaded
    /// for as long as the returned pointer is called.
    unsafe fn from_raw(addr: NonNull<c_void>) -> Self;

    /// Returns the code address this pointer refers to.
    fn address(self) -> *const c_void;
}

macro_rules! impl_native_signature {
    ($($arg:ident),*) => {
        unsafe impl<R: 'static, $($arg: 'static),*> NativeSignature for extern "C" fn($($arg),*) -> R {
            unsafe fn from_raw(addr: NonNull<c_void>) -> Self {
                unsafe { std::mem::transmute_copy::<*mut c_void, Self>(&addr.as_ptr()) }
            }

            fn address(self) -> *const c_void {
                self as *const c_void
            }
        }

        unsafe impl<R: 'static, $($arg: 'static),*> NativeSignature
            for unsafe extern "C" fn($($arg),*) -> R
        {
            unsafe fn from_raw(addr: NonNull<c_void>) -> Self {
                unsafe { std::mem::transmute_copy::<*mut c_void, Self>(&addr.as_ptr()) }
            }

            fn address(self) -> *const c_void {
                self as *const c_void
            }
        }
    };
}

impl_native_signature!();
impl_native_signature!(A1);
impl_native_signature!(A1, A2);
impl_native_signature!(A1, A2, A3);
impl_native_signature!(A1, A2, A3, A4);
impl_native_signature!(A1, A2, A3, A4, A5);
impl_native_signature!(A1, A2, A3, A4, A5, A6);
impl_native_signature!(A1, A2, A3, A4, A5, A6, A7);
impl_native_signature!(A1, A2, A3, A4, A5, A6, A7, A8);
