use std::fmt::{self, Debug, Formatter};

/// Opaque address of a value living in the embedding application's data
/// graph.
///
/// A handle is the data-store root threaded through render and optimize
/// calls. The core stores and forwards the address; it never allocates,
/// frees, dereferences, or mutates the object behind it. Name resolution
/// against a handle is supplied by the renderer through
/// [`RenderContext::resolve`](crate::RenderContext::resolve).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostHandle(*const ());

// The address is only stored and forwarded by this crate, never
// dereferenced. Access discipline for the object it names belongs to the
// embedding application.
unsafe impl Send for HostHandle {}
unsafe impl Sync for HostHandle {}

impl HostHandle {
    pub const NULL: HostHandle = HostHandle(std::ptr::null());

    pub fn new(address: *const ()) -> Self {
        HostHandle(address)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn address(&self) -> *const () {
        self.0
    }
}

impl Default for HostHandle {
    fn default() -> Self {
        Self::NULL
    }
}

impl From<*const ()> for HostHandle {
    fn from(address: *const ()) -> Self {
        HostHandle(address)
    }
}

impl Debug for HostHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "HostHandle({:p})", self.0)
    }
}

/// Engine-internal opaque payload address carried by
/// [`Value::Pointer`](crate::Value::Pointer).
///
/// Like [`HostHandle`], the core never dereferences it. Construct values
/// through [`Value::from_ptr`](crate::Value::from_ptr), which normalizes a
/// null address to `Nil`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativePtr(*const ());

// Stored and forwarded only, never dereferenced.
unsafe impl Send for NativePtr {}
unsafe impl Sync for NativePtr {}

impl NativePtr {
    pub fn new(address: *const ()) -> Self {
        NativePtr(address)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn address(&self) -> *const () {
        self.0
    }
}

impl Debug for NativePtr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "NativePtr({:p})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        assert!(HostHandle::NULL.is_null());
        assert!(HostHandle::default().is_null());
        assert_eq!(HostHandle::NULL, HostHandle::new(std::ptr::null()));
    }

    #[test]
    fn test_handle_identity() {
        let target = 42_u32;
        let address = &target as *const u32 as *const ();
        let a = HostHandle::new(address);
        let b = HostHandle::from(address);
        assert_eq!(a, b);
        assert!(!a.is_null());
        assert_eq!(a.address(), address);
    }
}
