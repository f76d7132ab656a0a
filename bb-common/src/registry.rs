//! Named handler registry
//!
//! One lookup-by-name table shared by the chat command surface and the
//! command bridge's service table. Each registry is parameterized by the
//! context its handlers receive (`C`) and what they produce (`R`); a miss is
//! reported as [`DispatchError::NotFound`] and each caller decides how to
//! answer it (a "not found" reply in chat, a log line on the bridge).
//!
//! Names are matched case-insensitively.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tracing::debug;

/// Lookup failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No handler registered under this name
    #[error("{table} not found: {name}")]
    NotFound { table: &'static str, name: String },
}

/// Type-erased async handler
pub type Handler<C, R> = Arc<dyn Fn(Arc<C>, Vec<String>) -> BoxFuture<'static, R> + Send + Sync>;

/// One registered name
pub struct Registered<C, R> {
    pub name: String,
    pub description: String,
    pub example: String,
    handler: Handler<C, R>,
}

impl<C, R> Registered<C, R> {
    /// Run the handler
    pub fn call(&self, ctx: Arc<C>, args: Vec<String>) -> BoxFuture<'static, R> {
        (self.handler)(ctx, args)
    }
}

impl<C, R> Clone for Registered<C, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            example: self.example.clone(),
            handler: self.handler.clone(),
        }
    }
}

/// Name → handler table
pub struct Registry<C, R> {
    table: &'static str,
    entries: BTreeMap<String, Registered<C, R>>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl<C, R> Registry<C, R>
where
    C: Send + Sync + 'static,
    R: Send + 'static,
{
    /// Empty registry; `table` names it in errors and logs (e.g. "Command", "Service")
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            entries: BTreeMap::new(),
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Register `handler` under `name`, replacing any previous handler of that name
    pub fn register<F, Fut>(
        &mut self,
        name: &str,
        description: &str,
        example: &str,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(Arc<C>, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let handler: Handler<C, R> = Arc::new(move |ctx, args| handler(ctx, args).boxed());
        self.entries.insert(
            normalize(name),
            Registered {
                name: name.to_string(),
                description: description.to_string(),
                example: example.to_string(),
                handler,
            },
        );
        self
    }

    /// Find the handler registered under `name`
    pub fn lookup(&self, name: &str) -> Result<&Registered<C, R>, DispatchError> {
        self.entries
            .get(&normalize(name))
            .ok_or_else(|| DispatchError::NotFound {
                table: self.table,
                name: name.trim().to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize(name))
    }

    /// Registered entries in name order
    pub fn entries(&self) -> impl Iterator<Item = &Registered<C, R>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up `name` and run its handler with `args`
    pub async fn dispatch(&self, ctx: Arc<C>, name: &str, args: Vec<String>) -> Result<R, DispatchError> {
        let entry = self.lookup(name)?;
        debug!("{} dispatch: {} {:?}", self.table, entry.name, args);
        Ok(entry.call(ctx, args).await)
    }
}
