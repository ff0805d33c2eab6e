//! Cache warming inputs and results.

use std::future::Future;

use futures::future::BoxFuture;
use serde::{Serialize, Serializer};

use crate::cache::codec;

type Compute = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<String>> + Send>;

/// One key to precompute: the key suffix, its TTL and the computation that
/// produces its value.
pub struct WarmEntry {
    pub(crate) key: String,
    pub(crate) ttl: Option<u64>,
    pub(crate) compute: Compute,
}

impl WarmEntry {
    /// `ttl` of `None` uses the engine default.
    pub fn new<T, F, Fut>(key: impl Into<String>, ttl: Option<u64>, compute: F) -> Self
    where
        T: Serialize,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            key: key.into(),
            ttl,
            compute: Box::new(move || {
                Box::pin(async move {
                    let value = compute().await?;
                    let blob = codec::encode(&value)?;
                    Ok::<_, anyhow::Error>(blob)
                })
            }),
        }
    }
}

impl std::fmt::Debug for WarmEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmEntry")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Outcome of a warming run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmReport {
    /// Entries computed and written
    pub warmed: usize,
    /// Key suffixes whose computation failed
    #[serde(serialize_with = "sorted")]
    pub failed: Vec<String>,
}

fn sorted<S: Serializer>(keys: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    let mut keys = keys.to_vec();
    keys.sort();
    keys.serialize(serializer)
}
