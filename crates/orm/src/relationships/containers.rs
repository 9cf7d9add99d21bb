//! Relation containers
//!
//! Typed slots embedded in model structs. A container starts unloaded;
//! the eager loader fills it during `with(...)` resolution. Reading an
//! unloaded container is a typed failure, never a silent null.
//!
//! Containers are serde-skipped on their model structs; they are transient
//! view state, not stored columns.

use crate::error::{OrmResult, RelationError};
use crate::model::Model;

/// Required parent slot
#[derive(Debug, Clone)]
pub struct BelongsTo<M> {
    loaded: Option<Box<M>>,
}

impl<M: Model> BelongsTo<M> {
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn get(&self) -> OrmResult<&M> {
        self.loaded
            .as_deref()
            .ok_or_else(|| not_loaded::<M>().into())
    }

    pub fn set_loaded(&mut self, parent: M) {
        self.loaded = Some(Box::new(parent));
    }
}

impl<M> Default for BelongsTo<M> {
    fn default() -> Self {
        Self { loaded: None }
    }
}

/// Optional parent slot. Distinguishes "not loaded" from "loaded, and
/// there is no parent".
#[derive(Debug, Clone)]
pub struct OptionalBelongsTo<M> {
    loaded: Option<Option<Box<M>>>,
}

impl<M: Model> OptionalBelongsTo<M> {
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn get(&self) -> OrmResult<Option<&M>> {
        match &self.loaded {
            Some(parent) => Ok(parent.as_deref()),
            None => Err(not_loaded::<M>().into()),
        }
    }

    pub fn set_loaded(&mut self, parent: Option<M>) {
        self.loaded = Some(parent.map(Box::new));
    }
}

impl<M> Default for OptionalBelongsTo<M> {
    fn default() -> Self {
        Self { loaded: None }
    }
}

/// Child collection slot
#[derive(Debug, Clone)]
pub struct HasMany<M> {
    loaded: Option<Vec<M>>,
}

impl<M: Model> HasMany<M> {
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn get(&self) -> OrmResult<&[M]> {
        self.loaded
            .as_deref()
            .ok_or_else(|| not_loaded::<M>().into())
    }

    pub fn set_loaded(&mut self, children: Vec<M>) {
        self.loaded = Some(children);
    }
}

impl<M> Default for HasMany<M> {
    fn default() -> Self {
        Self { loaded: None }
    }
}

/// Zero-or-one child slot
#[derive(Debug, Clone)]
pub struct HasOne<M> {
    loaded: Option<Option<Box<M>>>,
}

impl<M: Model> HasOne<M> {
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn get(&self) -> OrmResult<Option<&M>> {
        match &self.loaded {
            Some(child) => Ok(child.as_deref()),
            None => Err(not_loaded::<M>().into()),
        }
    }

    pub fn set_loaded(&mut self, child: Option<M>) {
        self.loaded = Some(child.map(Box::new));
    }
}

impl<M> Default for HasOne<M> {
    fn default() -> Self {
        Self { loaded: None }
    }
}

/// Sibling collection slot, populated through a pivot
#[derive(Debug, Clone)]
pub struct ManyToMany<M> {
    loaded: Option<Vec<M>>,
}

impl<M: Model> ManyToMany<M> {
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn get(&self) -> OrmResult<&[M]> {
        self.loaded
            .as_deref()
            .ok_or_else(|| not_loaded::<M>().into())
    }

    pub fn set_loaded(&mut self, siblings: Vec<M>) {
        self.loaded = Some(siblings);
    }
}

impl<M> Default for ManyToMany<M> {
    fn default() -> Self {
        Self { loaded: None }
    }
}

fn not_loaded<M: Model>() -> RelationError {
    RelationError::NotLoaded {
        relation: M::table_name().to_string(),
    }
}
