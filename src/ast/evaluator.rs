use crate::ast::{Expression, Registry};
use crate::error::Result;
use log::debug;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Parses and evaluates expressions against a finished registry, keeping the
/// most recently parsed expressions around for reuse.
pub struct Evaluator<T> {
    registry: Registry<T>,
    cache: Option<LruCache<String, Arc<Expression<T>>>>,
}

impl<T: Clone> Evaluator<T> {
    /// Creates a new `Evaluator` with a given maximum cache size. A size of
    /// zero disables caching.
    pub fn new(registry: Registry<T>, max_cache_size: usize) -> Self {
        Self {
            registry,
            cache: NonZeroUsize::new(max_cache_size).map(LruCache::new),
        }
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    /// Parse an expression string, reusing a cached tree when the same text
    /// was parsed before.
    pub fn parse_expression(&mut self, expression: &str) -> Result<Arc<Expression<T>>> {
        if let Some(cached) = self.cache.as_mut().and_then(|cache| cache.get(expression)) {
            debug!("Cache hit for expression: {}", expression);
            return Ok(Arc::clone(cached));
        }

        let parsed = Arc::new(self.registry.parse(expression)?);
        if let Some(cache) = self.cache.as_mut() {
            cache.put(expression.to_string(), Arc::clone(&parsed));
        }
        Ok(parsed)
    }

    /// Evaluates a given expression string against a provided context.
    ///
    /// # Arguments
    ///
    /// * `expression` - A string slice that holds the expression to be evaluated.
    /// * `context` - Variable values for the expression.
    ///
    /// # Returns
    ///
    /// * `Ok(T)` if parsing and evaluation succeed.
    /// * `Err(ExpressionError)` if either fails.
    pub fn evaluate_expression(
        &mut self,
        expression: &str,
        context: &HashMap<String, T>,
    ) -> Result<T> {
        let parsed = self.parse_expression(expression)?;
        parsed.evaluate_with(context)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.as_ref().map_or(0, LruCache::len)
    }
}

impl<T: Clone + Send + Sync> Evaluator<T> {
    /// Parses `expression` once and evaluates it against every context in
    /// parallel.
    pub fn evaluate_batch(
        &mut self,
        expression: &str,
        contexts: &[HashMap<String, T>],
    ) -> Result<Vec<Result<T>>> {
        let parsed = self.parse_expression(expression)?;
        Ok(parsed.evaluate_batch(contexts))
    }
}
