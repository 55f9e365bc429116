//! Named SQL rewrite hooks applied before dispatch.

use std::fmt;
use std::sync::Arc;

/// A rewrite function. Returns `None` to leave the SQL unchanged.
pub type SqlRewriteFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Ordered registry of SQL rewrite hooks.
#[derive(Clone, Default)]
pub struct SqlRewriteHooks {
    hooks: Vec<(String, SqlRewriteFn)>,
}

impl SqlRewriteHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Registering an existing name replaces that hook in
    /// its original position.
    pub fn register<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        let name = name.into();
        let hook: SqlRewriteFn = Arc::new(hook);

        match self.hooks.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = hook,
            None => self.hooks.push((name, hook)),
        }
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.register(name, hook);
        self
    }

    /// Remove a hook by name.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(n, _)| n != name);
        self.hooks.len() != before
    }

    /// Apply every hook in registration order.
    pub fn apply(&self, sql: &str) -> String {
        let mut current = sql.to_string();

        for (name, hook) in &self.hooks {
            if let Some(rewritten) = hook(&current) {
                log::debug!("SQL rewrite hook '{}' changed statement", name);
                current = rewritten;
            }
        }

        current
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Registered names in order.
    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|(n, _)| n.as_str()).collect()
    }
}

impl fmt::Debug for SqlRewriteHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlRewriteHooks")
            .field("hooks", &self.names())
            .finish()
    }
}
