//! Object identities for reference-enabled streams.
//!
//! When references are enabled, the first occurrence of a user-type object
//! is written with a `t_identity` prefix and every later occurrence as a
//! `t_reference` to that id. This is what lets cyclic graphs serialize.

use crate::value::PofObject;
use std::collections::HashMap;

/// Maps objects already written in this session to their stream ids.
///
/// The library holds a handle to every registered object, so an address
/// cannot be reused by a different object while the session is alive.
#[derive(Debug, Default)]
pub struct ReferenceLibrary {
    ids: HashMap<usize, (i32, PofObject)>,
    next_id: i32,
}

impl ReferenceLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `obj` if it has been registered.
    pub fn identity_of(&self, obj: &PofObject) -> Option<i32> {
        self.ids.get(&obj.identity()).map(|(id, _)| *id)
    }

    /// Register `obj` and return its id; registering twice returns the
    /// existing id.
    pub fn register(&mut self, obj: &PofObject) -> i32 {
        let next = &mut self.next_id;
        self.ids
            .entry(obj.identity())
            .or_insert_with(|| {
                let id = *next;
                *next += 1;
                (id, obj.clone())
            })
            .0
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portable::PortableObject;
    use crate::reader::PofReader;
    use crate::writer::PofWriter;
    use gridwire_core::Result;

    #[derive(Debug, Default)]
    struct Leaf;

    impl PortableObject for Leaf {
        fn read_external(&mut self, _reader: &mut PofReader<'_, '_>) -> Result<()> {
            Ok(())
        }

        fn write_external(&self, _writer: &mut PofWriter<'_, '_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_ids_are_sequential_and_stable() {
        let mut lib = ReferenceLibrary::new();
        let a = PofObject::new(Leaf);
        let b = PofObject::new(Leaf);
        assert!(lib.is_empty());
        assert_eq!(lib.identity_of(&a), None);

        assert_eq!(lib.register(&a), 0);
        assert_eq!(lib.register(&b), 1);
        assert_eq!(lib.register(&a.clone()), 0);
        assert_eq!(lib.identity_of(&b), Some(1));
        assert_eq!(lib.len(), 2);
    }

    #[test]
    fn test_equal_but_distinct_objects_get_distinct_ids() {
        let mut lib = ReferenceLibrary::new();
        let first = lib.register(&PofObject::new(Leaf));
        let second = lib.register(&PofObject::new(Leaf));
        assert_ne!(first, second);
    }
}
