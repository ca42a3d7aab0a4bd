//! Cluster Connection
//!
//! A [`ClusterConnection`] owns the store client and the error translator.
//! Hash adapters borrow both; they never keep state of their own, so any
//! number of adapters and scan cursors may be used against one connection
//! at the same time.
//!
//! ## Example
//!
//! ```
//! use flashhash::{ClusterConnection, MemoryCluster, RespClient};
//!
//! let cluster = MemoryCluster::new();
//! let connection = ClusterConnection::new(RespClient::new(&cluster));
//!
//! let hash = connection.hash_commands();
//! hash.hset(b"user:1", b"name", b"Ariz").unwrap();
//! assert_eq!(hash.hlen(b"user:1").unwrap(), 1);
//! ```

use crate::client::HashStoreClient;
use crate::error::{classify, HashError, StoreFailure};
use crate::hash::ClusterHashCommands;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Converts raw store failures into [`HashError`]s.
pub trait ErrorTranslator: Send + Sync {
    fn translate(&self, failure: StoreFailure) -> HashError;
}

impl<F> ErrorTranslator for F
where
    F: Fn(StoreFailure) -> HashError + Send + Sync,
{
    fn translate(&self, failure: StoreFailure) -> HashError {
        self(failure)
    }
}

/// Translator backed by [`classify`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTranslator;

impl ErrorTranslator for DefaultTranslator {
    fn translate(&self, failure: StoreFailure) -> HashError {
        let error = classify(failure);
        debug!(error = %error, "translated store failure");
        error
    }
}

/// A store client together with the translator for its failures.
pub struct ClusterConnection<C> {
    client: C,
    translator: Arc<dyn ErrorTranslator>,
}

impl<C: HashStoreClient> ClusterConnection<C> {
    /// Creates a connection using the [`DefaultTranslator`].
    pub fn new(client: C) -> Self {
        Self::with_translator(client, DefaultTranslator)
    }

    pub fn with_translator(client: C, translator: impl ErrorTranslator + 'static) -> Self {
        Self {
            client,
            translator: Arc::new(translator),
        }
    }

    /// Hash command adapter bound to this connection.
    pub fn hash_commands(&self) -> ClusterHashCommands<'_, C> {
        ClusterHashCommands::new(self)
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub(crate) fn translator(&self) -> &Arc<dyn ErrorTranslator> {
        &self.translator
    }

    /// Routes a failure through this connection's translator.
    pub fn translate(&self, failure: StoreFailure) -> HashError {
        self.translator.translate(failure)
    }
}

impl<C> fmt::Debug for ClusterConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConnection").finish_non_exhaustive()
    }
}
