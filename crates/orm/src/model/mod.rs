//! Model layer: trait, identifier, persistence state, and CRUD surface

pub mod core_trait;
pub mod crud;
pub mod identifier;
pub(crate) mod lifecycle;
pub mod state;

pub use core_trait::{hydrate, FieldDef, FieldKind, Model};
pub use crud::ModelCrud;
pub use identifier::{IdGeneration, IdValue};
pub use state::ModelState;
