//! The heap: allocation, the all-allocations list, and the mechanics of a
//! tri-color mark-and-sweep collection (blackening each object kind's
//! outgoing references, the pre-sweep intern-table cleanup, and the sweep
//! itself).
//!
//! What this module deliberately does *not* decide is *when* to collect or
//! *which* values are roots — that is policy, and it differs between the
//! compiler (whose roots are its in-progress function chain) and the
//! virtual machine (whose roots are the operand stack, call frames, open
//! upvalues, and globals). Both call [`Heap::collect_garbage`], passing a
//! closure that marks their own roots; the generic trace-and-sweep
//! algorithm lives here exactly once.

use std::collections::HashMap;
use std::mem::size_of;
use std::ptr::NonNull;

use crate::intern::InternTable;
use crate::object::{
    fnv1a_hash, NativeFn, ObjBoundMethod, ObjClass, ObjClosure, ObjFunction, ObjHeader,
    ObjInstance, ObjKind, ObjNative, ObjRef, ObjString, ObjUpvalue,
};
use crate::value::Value;

/// Growth factor applied to `next_gc` after each collection.
const GC_GROW_FACTOR: usize = 2;

/// Initial GC threshold, in bytes.
const DEFAULT_INITIAL_GC_THRESHOLD: usize = 1024 * 1024;

pub struct Heap {
    objects: Option<ObjRef>,
    bytes_allocated: usize,
    next_gc: usize,
    /// Forces a collection on every allocation past the threshold check,
    /// for deterministic GC exercise in tests.
    pub stress_gc: bool,
    strings: InternTable,
    gray_stack: Vec<ObjRef>,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self::with_initial_threshold(DEFAULT_INITIAL_GC_THRESHOLD)
    }

    #[must_use]
    pub fn with_initial_threshold(initial_gc_threshold: usize) -> Self {
        Self {
            objects: None,
            bytes_allocated: 0,
            next_gc: initial_gc_threshold,
            stress_gc: false,
            strings: InternTable::new(),
            gray_stack: Vec::new(),
        }
    }

    #[must_use]
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    #[must_use]
    pub fn next_gc(&self) -> usize {
        self.next_gc
    }

    #[must_use]
    pub fn should_collect(&self) -> bool {
        self.stress_gc || self.bytes_allocated > self.next_gc
    }

    #[must_use]
    pub fn intern_table(&self) -> &InternTable {
        &self.strings
    }

    fn link<T>(&mut self, boxed: Box<T>) -> ObjRef {
        let raw = Box::into_raw(boxed).cast::<ObjHeader>();
        let obj_ref = unsafe { ObjRef::new(NonNull::new(raw).expect("Box::into_raw is never null")) };
        obj_ref.set_next(self.objects);
        self.objects = Some(obj_ref);
        self.bytes_allocated += size_of::<T>();
        obj_ref
    }

    /// Intern a byte string, allocating a new [`ObjString`] only if an
    /// identical one is not already interned.
    pub fn intern_string(&mut self, bytes: &[u8]) -> ObjRef {
        let hash = fnv1a_hash(bytes);
        if let Some(existing) = self.strings.find(bytes, hash) {
            return existing;
        }
        let obj = ObjString {
            header: fresh_header(ObjKind::String),
            hash,
            bytes: bytes.to_vec().into_boxed_slice(),
        };
        let obj_ref = self.link(Box::new(obj));
        self.strings.insert(obj_ref);
        obj_ref
    }

    /// Allocate a fresh, empty function (arity 0, empty chunk). Callers
    /// (the compiler) mutate it in place via
    /// [`ObjRef::as_function_mut`] as they compile its body.
    pub fn alloc_function(&mut self, name: Option<ObjRef>) -> ObjRef {
        let obj = ObjFunction {
            header: fresh_header(ObjKind::Function),
            arity: 0,
            upvalue_count: 0,
            chunk: crate::chunk::Chunk::new(),
            name,
        };
        self.link(Box::new(obj))
    }

    pub fn alloc_native(&mut self, function: NativeFn, name: ObjRef) -> ObjRef {
        let obj = ObjNative {
            header: fresh_header(ObjKind::Native),
            function,
            name,
        };
        self.link(Box::new(obj))
    }

    pub fn alloc_open_upvalue(&mut self, location: *mut Value) -> ObjRef {
        let obj = ObjUpvalue {
            header: fresh_header(ObjKind::Upvalue),
            location,
            closed: Value::nil(),
            next_open: None,
        };
        self.link(Box::new(obj))
    }

    pub fn alloc_closure(&mut self, function: ObjRef, upvalues: Box<[ObjRef]>) -> ObjRef {
        let obj = ObjClosure {
            header: fresh_header(ObjKind::Closure),
            function,
            upvalues,
        };
        self.link(Box::new(obj))
    }

    pub fn alloc_class(&mut self, name: ObjRef) -> ObjRef {
        let obj = ObjClass {
            header: fresh_header(ObjKind::Class),
            name,
            methods: HashMap::new(),
        };
        self.link(Box::new(obj))
    }

    pub fn alloc_instance(&mut self, class: ObjRef) -> ObjRef {
        let obj = ObjInstance {
            header: fresh_header(ObjKind::Instance),
            class,
            fields: HashMap::new(),
        };
        self.link(Box::new(obj))
    }

    pub fn alloc_bound_method(&mut self, receiver: Value, method: ObjRef) -> ObjRef {
        let obj = ObjBoundMethod {
            header: fresh_header(ObjKind::BoundMethod),
            receiver,
            method,
        };
        self.link(Box::new(obj))
    }

    // --- GC: mark phase ---

    pub fn mark_value(&mut self, value: Value) {
        if let Some(obj) = value.as_obj() {
            self.mark_object(obj);
        }
    }

    pub fn mark_object(&mut self, obj: ObjRef) {
        if obj.is_marked() {
            return;
        }
        obj.set_marked(true);
        self.gray_stack.push(obj);
    }

    /// Drain the gray worklist, blackening each object by marking every
    /// reference it holds, until the worklist is empty.
    pub fn trace_references(&mut self) {
        while let Some(obj) = self.gray_stack.pop() {
            self.blacken(obj);
        }
    }

    fn blacken(&mut self, obj: ObjRef) {
        match obj.kind() {
            ObjKind::String | ObjKind::Native => {}
            ObjKind::Function => {
                let function = obj.as_function();
                if let Some(name) = function.name {
                    self.mark_object(name);
                }
                let constants: Vec<Value> = function.chunk.constants().to_vec();
                for constant in constants {
                    self.mark_value(constant);
                }
            }
            ObjKind::Upvalue => {
                let upvalue = obj.as_upvalue();
                self.mark_value(upvalue.get());
            }
            ObjKind::Closure => {
                let closure = obj.as_closure();
                self.mark_object(closure.function);
                let upvalues = closure.upvalues.clone();
                for upvalue in upvalues.iter() {
                    self.mark_object(*upvalue);
                }
            }
            ObjKind::Class => {
                let class = obj.as_class();
                self.mark_object(class.name);
                let methods: Vec<ObjRef> = class.methods.values().copied().collect();
                for method in methods {
                    self.mark_object(method);
                }
            }
            ObjKind::Instance => {
                let instance = obj.as_instance();
                self.mark_object(instance.class);
                let values: Vec<Value> = instance.fields.values().copied().collect();
                for value in values {
                    self.mark_value(value);
                }
            }
            ObjKind::BoundMethod => {
                let bound = obj.as_bound_method();
                self.mark_value(bound.receiver);
                self.mark_object(bound.method);
            }
        }
    }

    // --- GC: sweep phase ---

    /// Run a full collection: the caller marks its own roots via
    /// `mark_roots`, then this traces, cleans the intern table of
    /// now-unreachable strings, and sweeps the allocation list.
    ///
    /// Returns `(bytes_before, bytes_after)` for logging.
    pub fn collect_garbage(&mut self, mut mark_roots: impl FnMut(&mut Heap)) -> (usize, usize) {
        let before = self.bytes_allocated;
        mark_roots(self);
        self.trace_references();
        self.strings.remove_unmarked();
        self.sweep();
        self.next_gc = self.bytes_allocated * GC_GROW_FACTOR;
        (before, self.bytes_allocated)
    }

    fn sweep(&mut self) {
        let mut previous: Option<ObjRef> = None;
        let mut current = self.objects;
        while let Some(obj) = current {
            let next = obj.next();
            if obj.is_marked() {
                obj.set_marked(false);
                previous = Some(obj);
            } else {
                match previous {
                    Some(prev) => prev.set_next(next),
                    None => self.objects = next,
                }
                self.free(obj);
            }
            current = next;
        }
    }

    fn free(&mut self, obj: ObjRef) {
        let ptr = obj.as_ptr();
        unsafe {
            match obj.kind() {
                ObjKind::String => {
                    self.bytes_allocated -= size_of::<ObjString>();
                    drop(Box::from_raw(ptr.cast::<ObjString>()));
                }
                ObjKind::Function => {
                    self.bytes_allocated -= size_of::<ObjFunction>();
                    drop(Box::from_raw(ptr.cast::<ObjFunction>()));
                }
                ObjKind::Native => {
                    self.bytes_allocated -= size_of::<ObjNative>();
                    drop(Box::from_raw(ptr.cast::<ObjNative>()));
                }
                ObjKind::Upvalue => {
                    self.bytes_allocated -= size_of::<ObjUpvalue>();
                    drop(Box::from_raw(ptr.cast::<ObjUpvalue>()));
                }
                ObjKind::Closure => {
                    self.bytes_allocated -= size_of::<ObjClosure>();
                    drop(Box::from_raw(ptr.cast::<ObjClosure>()));
                }
                ObjKind::Class => {
                    self.bytes_allocated -= size_of::<ObjClass>();
                    drop(Box::from_raw(ptr.cast::<ObjClass>()));
                }
                ObjKind::Instance => {
                    self.bytes_allocated -= size_of::<ObjInstance>();
                    drop(Box::from_raw(ptr.cast::<ObjInstance>()));
                }
                ObjKind::BoundMethod => {
                    self.bytes_allocated -= size_of::<ObjBoundMethod>();
                    drop(Box::from_raw(ptr.cast::<ObjBoundMethod>()));
                }
            }
        }
    }

    /// Free every remaining object unconditionally. Called when the VM
    /// shuts down so the allocation list ends up empty once every live
    /// object has been freed.
    pub fn free_all(&mut self) {
        let mut current = self.objects.take();
        while let Some(obj) = current {
            let next = obj.next();
            self.free(obj);
            current = next;
        }
    }

    /// Count objects currently on the allocation list. Mainly a diagnostic
    /// for confirming the allocation list is empty once the VM is torn
    /// down.
    #[must_use]
    pub fn live_object_count(&self) -> usize {
        let mut count = 0;
        let mut current = self.objects;
        while let Some(obj) = current {
            count += 1;
            current = obj.next();
        }
        count
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.free_all();
    }
}

fn fresh_header(kind: ObjKind) -> ObjHeader {
    ObjHeader {
        kind,
        marked: false,
        next: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_bytes_twice_returns_the_same_object() {
        let mut heap = Heap::new();
        let a = heap.intern_string(b"hi");
        let b = heap.intern_string(b"hi");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_bytes_intern_to_distinct_objects() {
        let mut heap = Heap::new();
        let a = heap.intern_string(b"hi");
        let b = heap.intern_string(b"lo");
        assert_ne!(a, b);
    }

    #[test]
    fn unreachable_string_is_collected() {
        let mut heap = Heap::new();
        let a = heap.intern_string(b"transient");
        assert_eq!(heap.live_object_count(), 1);
        heap.collect_garbage(|_| {});
        assert_eq!(heap.live_object_count(), 0);
        let _ = a;
    }

    #[test]
    fn rooted_string_survives_collection() {
        let mut heap = Heap::new();
        let a = heap.intern_string(b"kept");
        heap.collect_garbage(|h| h.mark_object(a));
        assert_eq!(heap.live_object_count(), 1);
    }

    #[test]
    fn free_all_empties_the_allocation_list() {
        let mut heap = Heap::new();
        heap.intern_string(b"one");
        heap.intern_string(b"two");
        assert_eq!(heap.live_object_count(), 2);
        heap.free_all();
        assert_eq!(heap.live_object_count(), 0);
    }
}
