//! Shared key/value store threaded through a workflow execution.
//!
//! A [`Context`] is a cheap handle: cloning it yields another handle on the
//! *same* store. [`Context::scope`] produces a prefixed view on that store and
//! [`Context::copy`] produces an independent snapshot.
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::error::ContextError;

/// A value stored in the context.
pub type Value = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub struct Context {
    store: Arc<DashMap<String, Value>>,
    prefix: Option<Arc<str>>,
    cancel: CancellationToken,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            prefix: None,
            cancel: CancellationToken::new(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => join_key(prefix, key),
            None => key.to_string(),
        }
    }

    /// Store a typed value under `key`, replacing any previous value.
    pub fn put<T: Any + Send + Sync>(&self, key: &str, value: T) -> Result<(), ContextError> {
        self.put_raw(key, Arc::new(value))
    }

    pub fn put_raw(&self, key: &str, value: Value) -> Result<(), ContextError> {
        if key.is_empty() {
            return Err(ContextError::EmptyKey);
        }
        self.store.insert(self.full_key(key), value);
        Ok(())
    }

    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.store.get(&self.full_key(key)).map(|v| v.value().clone())
    }

    /// Fetch a typed value. A value of another type is an error, a missing one is `None`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Result<Option<Arc<T>>, ContextError> {
        match self.get_raw(key) {
            None => Ok(None),
            Some(raw) => raw
                .downcast::<T>()
                .map(Some)
                .map_err(|_| ContextError::TypeMismatch {
                    key: self.full_key(key),
                    expected: type_name::<T>(),
                }),
        }
    }

    /// Like [`Context::get`], cloning the value out of its `Arc`.
    pub fn get_cloned<T: Any + Send + Sync + Clone>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ContextError> {
        Ok(self.get::<T>(key)?.map(|v| (*v).clone()))
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.store.remove(&self.full_key(key)).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains_key(&self.full_key(key))
    }

    /// Keys visible through this view, relative to its prefix.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = match &self.prefix {
            None => self.store.iter().map(|e| e.key().clone()).collect(),
            Some(prefix) => {
                let lead = join_key(prefix, "");
                self.store
                    .iter()
                    .filter_map(|e| e.key().strip_prefix(lead.as_str()).map(str::to_string))
                    .collect()
            }
        };
        keys.sort();
        keys
    }

    /// Number of entries in the backing store, regardless of scope.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// A view on the same store that rewrites every key to `prefix.key`.
    ///
    /// Writes through a scope are visible to the parent under the prefixed key.
    /// Scopes nest by concatenating prefixes.
    pub fn scope(&self, prefix: &str) -> Context {
        if prefix.is_empty() {
            return self.clone();
        }
        let prefix: Arc<str> = match &self.prefix {
            Some(parent) => Arc::from(join_key(parent, prefix)),
            None => Arc::from(prefix),
        };
        Context {
            store: Arc::clone(&self.store),
            prefix: Some(prefix),
            cancel: self.cancel.clone(),
        }
    }

    /// An independent shallow snapshot: a new store holding the same values.
    pub fn copy(&self) -> Context {
        self.copy_filtered(|_| true)
    }

    /// Snapshot only the entries whose full stored key satisfies `keep`.
    pub fn copy_filtered<F>(&self, keep: F) -> Context
    where
        F: Fn(&str) -> bool,
    {
        let store = DashMap::with_capacity(self.store.len());
        for entry in self.store.iter() {
            if keep(entry.key()) {
                store.insert(entry.key().clone(), entry.value().clone());
            }
        }
        Context {
            store: Arc::new(store),
            prefix: self.prefix.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Same store and scope, with a cancellation token derived from this one.
    ///
    /// Cancelling the parent cancels the child; cancelling the child leaves
    /// the parent untouched.
    pub fn with_child_token(&self) -> Context {
        Context {
            store: Arc::clone(&self.store),
            prefix: self.prefix.clone(),
            cancel: self.cancel.child_token(),
        }
    }

    pub(crate) fn with_token(&self, cancel: CancellationToken) -> Context {
        Context {
            store: Arc::clone(&self.store),
            prefix: self.prefix.clone(),
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request cancellation of everything running against this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until this context is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("prefix", &self.prefix)
            .field("keys", &self.keys())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.ends_with('.') {
        format!("{prefix}{key}")
    } else {
        format!("{prefix}.{key}")
    }
}
