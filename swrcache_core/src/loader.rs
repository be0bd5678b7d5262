//! Source-data resolution
//!
//! The loader is the application's side of the contract: given a key,
//! produce the authoritative value. The engine imposes no latency
//! assumptions on it and converts its failures into misses on the read path.

use crate::error::Result;
use crate::key::Key;
use async_trait::async_trait;
use std::future::Future;

/// Resolves source data for a key
#[async_trait]
pub trait Loader<V>: Send + Sync {
    /// Fetch the authoritative value for `key`.
    async fn resolve(&self, key: &Key) -> Result<V>;
}

/// Loader backed by an async closure
///
/// Convenient for tests and small applications:
///
/// ```
/// use swrcache_core::error::Result;
/// use swrcache_core::key::Key;
/// use swrcache_core::loader::FnLoader;
///
/// let loader = FnLoader::new(|key: &Key| {
///     let key_string = key.to_string();
///     async move { Result::<String>::Ok(format!("value for {key_string}")) }
/// });
/// # let _ = loader;
/// ```
pub struct FnLoader<F> {
    resolve_fn: F,
}

impl<F> FnLoader<F> {
    /// Wrap an async closure as a loader.
    pub fn new(resolve_fn: F) -> Self {
        Self { resolve_fn }
    }
}

#[async_trait]
impl<V, F, Fut> Loader<V> for FnLoader<F>
where
    F: Fn(&Key) -> Fut + Send + Sync,
    Fut: Future<Output = Result<V>> + Send,
    V: Send,
{
    async fn resolve(&self, key: &Key) -> Result<V> {
        (self.resolve_fn)(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoaderError;

    fn key(id: &str) -> Key {
        Key::new("product", "item", None, None, id).unwrap()
    }

    #[tokio::test]
    async fn test_fn_loader_resolves() {
        let loader = FnLoader::new(|key: &Key| {
            let id = key.id_string().to_string();
            async move { Ok(format!("loaded:{id}")) }
        });
        let value = loader.resolve(&key("42")).await.unwrap();
        assert_eq!(value, "loaded:42");
    }

    #[tokio::test]
    async fn test_fn_loader_propagates_errors() {
        let loader: FnLoader<_> = FnLoader::new(|key: &Key| {
            let key_string = key.to_string();
            async move {
                Err::<String, _>(LoaderError::failed(&key_string, "upstream down").into())
            }
        });
        assert!(loader.resolve(&key("42")).await.is_err());
    }
}
