//! Heap object header and concrete object variants.
//!
//! Every heap-allocated value begins with a common [`ObjHeader`]: a
//! discriminant, the singly-linked "next allocation" pointer threading all
//! live objects together, and a GC mark bit. The variant structs below are
//! laid out with the header first so a `*mut ObjHeader` can be reinterpreted
//! as the concrete variant once its [`ObjKind`] has been checked — the
//! "raw heap allocation with a manually maintained allocation list and
//! per-object mark bit" option, chosen because a tracing collector over a
//! cyclic object graph (instance -> class -> method closure -> upvalue ->
//! instance) has no sound reference-counted alternative.
//!
//! Nothing in this module allocates or frees memory or touches GC
//! bookkeeping (the allocation list head, `bytes_allocated`, the intern
//! table) — that is the virtual machine's job, since only it has the roots
//! needed to run a collection safely. This module only describes layout.

use std::collections::HashMap;
use std::fmt;
use std::ptr::NonNull;

use crate::chunk::Chunk;
use crate::value::Value;

/// Discriminant stored in every [`ObjHeader`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjKind {
    String,
    Function,
    Native,
    Upvalue,
    Closure,
    Class,
    Instance,
    BoundMethod,
}

/// The header every heap object begins with.
#[repr(C)]
pub struct ObjHeader {
    pub kind: ObjKind,
    pub marked: bool,
    pub next: Option<ObjRef>,
}

/// A non-owning handle to a heap object.
///
/// Copy, hashable, and compared by pointer identity — which is exactly the
/// equality semantics strings need once interned, and the identity classes,
/// instances, and closures are compared/keyed by in their method and field
/// tables.
#[derive(Clone, Copy)]
pub struct ObjRef(NonNull<ObjHeader>);

impl ObjRef {
    /// # Safety
    /// `ptr` must point at a live, fully-initialized object whose header
    /// has already been written.
    #[must_use]
    pub unsafe fn new(ptr: NonNull<ObjHeader>) -> Self {
        Self(ptr)
    }

    #[must_use]
    pub fn as_ptr(self) -> *mut ObjHeader {
        self.0.as_ptr()
    }

    #[must_use]
    pub fn kind(self) -> ObjKind {
        unsafe { self.0.as_ref().kind }
    }

    #[must_use]
    pub fn is_marked(self) -> bool {
        unsafe { self.0.as_ref().marked }
    }

    pub fn set_marked(self, marked: bool) {
        unsafe {
            (*self.0.as_ptr()).marked = marked;
        }
    }

    #[must_use]
    pub fn next(self) -> Option<ObjRef> {
        unsafe { self.0.as_ref().next }
    }

    pub fn set_next(self, next: Option<ObjRef>) {
        unsafe {
            (*self.0.as_ptr()).next = next;
        }
    }

    /// Downcast to `&ObjString`.
    ///
    /// # Panics
    /// Panics if `self.kind() != ObjKind::String`.
    #[must_use]
    pub fn as_string(self) -> &'static ObjString {
        assert_eq!(self.kind(), ObjKind::String);
        unsafe { &*self.0.as_ptr().cast::<ObjString>() }
    }

    #[must_use]
    pub fn as_function(self) -> &'static ObjFunction {
        assert_eq!(self.kind(), ObjKind::Function);
        unsafe { &*self.0.as_ptr().cast::<ObjFunction>() }
    }

    #[must_use]
    pub fn as_function_mut(self) -> &'static mut ObjFunction {
        assert_eq!(self.kind(), ObjKind::Function);
        unsafe { &mut *self.0.as_ptr().cast::<ObjFunction>() }
    }

    #[must_use]
    pub fn as_native(self) -> &'static ObjNative {
        assert_eq!(self.kind(), ObjKind::Native);
        unsafe { &*self.0.as_ptr().cast::<ObjNative>() }
    }

    #[must_use]
    pub fn as_upvalue(self) -> &'static ObjUpvalue {
        assert_eq!(self.kind(), ObjKind::Upvalue);
        unsafe { &*self.0.as_ptr().cast::<ObjUpvalue>() }
    }

    #[must_use]
    pub fn as_upvalue_mut(self) -> &'static mut ObjUpvalue {
        assert_eq!(self.kind(), ObjKind::Upvalue);
        unsafe { &mut *self.0.as_ptr().cast::<ObjUpvalue>() }
    }

    #[must_use]
    pub fn as_closure(self) -> &'static ObjClosure {
        assert_eq!(self.kind(), ObjKind::Closure);
        unsafe { &*self.0.as_ptr().cast::<ObjClosure>() }
    }

    #[must_use]
    pub fn as_class(self) -> &'static ObjClass {
        assert_eq!(self.kind(), ObjKind::Class);
        unsafe { &*self.0.as_ptr().cast::<ObjClass>() }
    }

    #[must_use]
    pub fn as_class_mut(self) -> &'static mut ObjClass {
        assert_eq!(self.kind(), ObjKind::Class);
        unsafe { &mut *self.0.as_ptr().cast::<ObjClass>() }
    }

    #[must_use]
    pub fn as_instance(self) -> &'static ObjInstance {
        assert_eq!(self.kind(), ObjKind::Instance);
        unsafe { &*self.0.as_ptr().cast::<ObjInstance>() }
    }

    #[must_use]
    pub fn as_instance_mut(self) -> &'static mut ObjInstance {
        assert_eq!(self.kind(), ObjKind::Instance);
        unsafe { &mut *self.0.as_ptr().cast::<ObjInstance>() }
    }

    #[must_use]
    pub fn as_bound_method(self) -> &'static ObjBoundMethod {
        assert_eq!(self.kind(), ObjKind::BoundMethod);
        unsafe { &*self.0.as_ptr().cast::<ObjBoundMethod>() }
    }
}

impl PartialEq for ObjRef {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for ObjRef {}

impl std::hash::Hash for ObjRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_ptr().hash(state);
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({:?}, {:?})", self.kind(), self.0.as_ptr())
    }
}

/// An immutable, interned, UTF-8-agnostic byte string.
#[repr(C)]
pub struct ObjString {
    pub header: ObjHeader,
    pub hash: u64,
    pub bytes: Box<[u8]>,
}

impl ObjString {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// FNV-1a string hashing.
#[must_use]
pub fn fnv1a_hash(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}

/// A compiled function: arity, upvalue count, its own chunk, optional name.
#[repr(C)]
pub struct ObjFunction {
    pub header: ObjHeader,
    pub arity: u8,
    pub upvalue_count: u8,
    pub chunk: Chunk,
    /// `None` for the implicit top-level `<script>` function.
    pub name: Option<ObjRef>,
}

/// The Rust implementation of a native ("builtin") function.
///
/// A native is handed the argument slice (the callee itself is not
/// included) and returns either a result value or an error message; the VM
/// turns an `Err` into a runtime error attributed to the call site.
pub type NativeFn = fn(&[Value]) -> Result<Value, String>;

#[repr(C)]
pub struct ObjNative {
    pub header: ObjHeader,
    pub function: NativeFn,
    pub name: ObjRef,
}

/// Either open (pointing at a live operand-stack slot) or closed (owning a
/// copy of the captured value).
#[repr(C)]
pub struct ObjUpvalue {
    pub header: ObjHeader,
    /// While open, a raw pointer into the VM's operand stack. Once closed,
    /// repointed at `closed` below so reads/writes keep working uniformly.
    pub location: *mut Value,
    pub closed: Value,
    /// Open-upvalue list link, sorted by descending stack address.
    pub next_open: Option<ObjRef>,
}

impl ObjUpvalue {
    #[must_use]
    pub fn is_open(&self) -> bool {
        !std::ptr::eq(self.location, &raw const self.closed)
    }

    #[must_use]
    pub fn get(&self) -> Value {
        unsafe { *self.location }
    }

    pub fn set(&mut self, value: Value) {
        unsafe {
            *self.location = value;
        }
    }
}

/// A function paired with its captured upvalues.
#[repr(C)]
pub struct ObjClosure {
    pub header: ObjHeader,
    pub function: ObjRef,
    pub upvalues: Box<[ObjRef]>,
}

/// A class: its name and a method table keyed by interned-string identity.
#[repr(C)]
pub struct ObjClass {
    pub header: ObjHeader,
    pub name: ObjRef,
    pub methods: HashMap<ObjRef, ObjRef>,
}

/// An instance of a class with its own field table.
#[repr(C)]
pub struct ObjInstance {
    pub header: ObjHeader,
    pub class: ObjRef,
    pub fields: HashMap<ObjRef, Value>,
}

/// A receiver bound to a method closure (`instance.method` without a call).
#[repr(C)]
pub struct ObjBoundMethod {
    pub header: ObjHeader,
    pub receiver: Value,
    pub method: ObjRef,
}
