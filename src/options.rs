//! Connection options.

use std::sync::Arc;
use std::time::Duration;

use crate::protocol::DEFAULT_PIPELINE;
use crate::schema::{Schema, SchemaSet};

/// Options shared by [`Client`](crate::Client) and
/// [`Session`](crate::Session).
///
/// Transport concerns below the byte stream (dialing, TLS, keep-alive)
/// belong to whatever produces the stream handed to
/// [`connect`](crate::Client::connect) or [`serve`](crate::serve); the core
/// only sees an already-connected channel.
#[derive(Debug, Clone)]
pub struct Options {
    /// Default deadline applied to each `exchange`; `None` leaves timeouts
    /// entirely to the caller's cancellation.
    pub timeout: Option<Duration>,
    /// Upper bound on out-of-order server response slots before new reads
    /// stall (backpressure).
    pub pipeline: usize,
    /// Schemas composed into the codec's resolver, in precedence order.
    pub schemas: SchemaSet,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: None,
            pipeline: DEFAULT_PIPELINE,
            schemas: SchemaSet::standard(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default exchange deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the out-of-order response window.
    pub fn with_pipeline(mut self, pipeline: usize) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Replaces the schema set.
    pub fn with_schemas(mut self, schemas: SchemaSet) -> Self {
        self.schemas = schemas;
        self
    }

    /// Appends a schema with lowest precedence.
    pub fn with_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.schemas.push(schema);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert!(options.timeout.is_none());
        assert_eq!(options.pipeline, DEFAULT_PIPELINE);
        assert!(!options.schemas.is_empty());
    }

    #[test]
    fn test_builder_chaining() {
        let options = Options::new()
            .with_timeout(Duration::from_secs(5))
            .with_pipeline(8)
            .with_schemas(SchemaSet::empty());
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.pipeline, 8);
        assert!(options.schemas.is_empty());
    }
}
