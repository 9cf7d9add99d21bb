//! Lifecycle middleware
//!
//! A chain-of-responsibility around model writes. Each middleware receives
//! the event, the model, and an explicit `Next` continuation; code before
//! `next.run(...)` executes in registration order, code after it unwinds in
//! reverse. Returning an error before calling `next` vetoes the write.
//! Returning an error after `next` surfaces the failure but does not undo
//! the already-committed write.
//!
//! Registration happens on a `MiddlewareSet` handed to the `Database` at
//! construction; there is no mutable global registry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OrmResult;
use crate::model::Model;

/// Lifecycle events middleware can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Create,
    Update,
    Delete,
    SoftDelete,
    Restore,
}

/// The driver write at the end of the chain
#[async_trait]
pub(crate) trait Terminal<M: Model>: Send + Sync {
    async fn write(&self, model: &mut M) -> OrmResult<()>;
}

/// A single lifecycle middleware for a model type
#[async_trait]
pub trait Middleware<M: Model>: Send + Sync {
    async fn handle(
        &self,
        event: LifecycleEvent,
        model: &mut M,
        next: Next<'_, M>,
    ) -> OrmResult<()>;
}

/// Continuation handed to each middleware. Calling `run` advances to the
/// next middleware, or to the terminal write when the chain is exhausted.
pub struct Next<'a, M: Model> {
    chain: &'a [Arc<dyn Middleware<M>>],
    terminal: &'a dyn Terminal<M>,
}

impl<'a, M: Model> Next<'a, M> {
    pub async fn run(self, event: LifecycleEvent, model: &mut M) -> OrmResult<()> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    chain: rest,
                    terminal: self.terminal,
                };
                head.handle(event, model, next).await
            }
            None => self.terminal.write(model).await,
        }
    }
}

/// Per-model middleware registry, configured once and shared by clone
#[derive(Default)]
pub struct MiddlewareSet {
    by_model: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MiddlewareSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware to the chain for model type `M`
    pub fn register<M: Model>(&mut self, middleware: Arc<dyn Middleware<M>>) -> &mut Self {
        let entry = self
            .by_model
            .entry(TypeId::of::<M>())
            .or_insert_with(|| Box::new(Vec::<Arc<dyn Middleware<M>>>::new()));
        // The entry under M's TypeId is always a chain for M
        if let Some(chain) = entry.downcast_mut::<Vec<Arc<dyn Middleware<M>>>>() {
            chain.push(middleware);
        }
        self
    }

    /// The registered chain for `M`, empty when none was configured
    pub(crate) fn chain_for<M: Model>(&self) -> &[Arc<dyn Middleware<M>>] {
        self.by_model
            .get(&TypeId::of::<M>())
            .and_then(|entry| entry.downcast_ref::<Vec<Arc<dyn Middleware<M>>>>())
            .map(|chain| chain.as_slice())
            .unwrap_or(&[])
    }

    /// Run the chain for `M` around the given terminal write
    pub(crate) async fn run<M: Model>(
        &self,
        event: LifecycleEvent,
        model: &mut M,
        terminal: &dyn Terminal<M>,
    ) -> OrmResult<()> {
        let next = Next {
            chain: self.chain_for::<M>(),
            terminal,
        };
        next.run(event, model).await
    }
}

impl std::fmt::Debug for MiddlewareSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareSet")
            .field("model_types", &self.by_model.len())
            .finish()
    }
}
