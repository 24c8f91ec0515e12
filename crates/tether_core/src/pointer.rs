//! Opaque native pointers carried through script space

use serde::Serialize;
use std::ffi::c_void;
use std::fmt;

/// A native pointer the script side may hold and hand back, never read.
///
/// Only the address travels; nothing is owned and the pointee is never
/// touched. Two boxes are equal when they carry the same address.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OpaquePointer {
    addr: usize,
}

impl OpaquePointer {
    pub fn new(pointer: *const c_void) -> Self {
        Self {
            addr: pointer as usize,
        }
    }

    pub fn from_ref<T>(value: &T) -> Self {
        Self::new(value as *const T as *const c_void)
    }

    pub const fn from_addr(addr: usize) -> Self {
        Self { addr }
    }

    pub fn pointer(&self) -> *mut c_void {
        self.addr as *mut c_void
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn is_null(&self) -> bool {
        self.addr == 0
    }
}

impl fmt::Debug for OpaquePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaquePointer({:#x})", self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_identity() {
        let a = 7u32;
        let b = 7u32;
        let pa = OpaquePointer::from_ref(&a);

        assert_eq!(pa, OpaquePointer::from_ref(&a));
        assert_ne!(pa, OpaquePointer::from_ref(&b));
        assert_eq!(pa.pointer() as *const u32, &a as *const u32);
        assert!(OpaquePointer::from_addr(0).is_null());
    }
}
