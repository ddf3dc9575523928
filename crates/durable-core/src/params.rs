//! Element descriptor vectors for generic durable containers.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::traits::{EntityFactoryProxy, RestorableAllocator};
use crate::types::DurableType;

/// Shared reference to an entity factory.
pub type FactoryRef<A> = Rc<dyn EntityFactoryProxy<A>>;

/// Positional type and factory descriptors.
///
/// Containers consume position 0 for their own elements and pass the rest
/// down to the entities they materialize, so `[Durable, Long]` with an
/// array factory at position 0 describes an array of arrays of longs. Maps
/// and pairs would consume more than one position; the vectors stay inline
/// for the common one- and two-entry cases.
pub struct GenericParams<A: RestorableAllocator> {
    types: SmallVec<[DurableType; 2]>,
    factories: SmallVec<[Option<FactoryRef<A>>; 2]>,
}

impl<A: RestorableAllocator> GenericParams<A> {
    /// Descriptors with no positions at all.
    pub fn empty() -> Self {
        Self {
            types: SmallVec::new(),
            factories: SmallVec::new(),
        }
    }

    /// Single-position descriptors for elements that need no factory.
    pub fn of(ty: DurableType) -> Self {
        let mut params = Self::empty();
        params.push(ty, None);
        params
    }

    /// Single-position descriptors with an element factory.
    pub fn with_factory(ty: DurableType, factory: FactoryRef<A>) -> Self {
        let mut params = Self::empty();
        params.push(ty, Some(factory));
        params
    }

    /// Build from separate type and factory vectors.
    ///
    /// The factory vector may be shorter than the type vector; missing
    /// positions have no factory.
    pub fn from_parts(types: &[DurableType], factories: &[Option<FactoryRef<A>>]) -> Self {
        Self {
            types: types.iter().copied().collect(),
            factories: factories.iter().cloned().collect(),
        }
    }

    /// Append a position.
    pub fn push(&mut self, ty: DurableType, factory: Option<FactoryRef<A>>) {
        // Keep the factory vector positionally aligned with the types.
        while self.factories.len() < self.types.len() {
            self.factories.push(None);
        }
        self.types.push(ty);
        self.factories.push(factory);
    }

    /// Builder form of [`push`](Self::push).
    pub fn then(mut self, ty: DurableType, factory: Option<FactoryRef<A>>) -> Self {
        self.push(ty, factory);
        self
    }

    /// The element type at position 0.
    pub fn element_type(&self) -> Option<DurableType> {
        self.types.first().copied()
    }

    /// The element factory at position 0.
    pub fn element_factory(&self) -> Option<&FactoryRef<A>> {
        self.factories.first().and_then(Option::as_ref)
    }

    /// Descriptors for a nested element: everything after position 0.
    pub fn shifted(&self) -> Self {
        Self {
            types: self.types.iter().skip(1).copied().collect(),
            factories: self.factories.iter().skip(1).cloned().collect(),
        }
    }

    /// All type positions.
    pub fn types(&self) -> &[DurableType] {
        &self.types
    }

    /// Number of type positions.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no type is described.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl<A: RestorableAllocator> Clone for GenericParams<A> {
    fn clone(&self) -> Self {
        Self {
            types: self.types.clone(),
            factories: self.factories.clone(),
        }
    }
}

impl<A: RestorableAllocator> Default for GenericParams<A> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<A: RestorableAllocator> fmt::Debug for GenericParams<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factories: SmallVec<[bool; 2]> = self.factories.iter().map(Option::is_some).collect();
        f.debug_struct("GenericParams")
            .field("types", &self.types)
            .field("factories", &factories)
            .finish()
    }
}
