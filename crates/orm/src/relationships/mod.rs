//! Relationship layer: containers, relation descriptors, and eager loading

pub mod belongs_to;
pub mod containers;
pub mod eager_loading;
pub mod has_many;
pub mod has_one;
pub mod many_to_many;

pub use belongs_to::{BelongsToRelation, OptionalBelongsToRelation};
pub use containers::{BelongsTo, HasMany, HasOne, ManyToMany, OptionalBelongsTo};
pub use eager_loading::{EagerLoad, IntoEagerLoad};
pub use has_many::HasManyRelation;
pub use has_one::HasOneRelation;
pub use many_to_many::{AttachMethod, ManyToManyRelation};
