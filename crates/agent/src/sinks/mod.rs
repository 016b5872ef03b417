pub mod stdout;

pub use stdout::StdoutSink;

use async_trait::async_trait;

use crate::alerts::AlertResult;

/// Destination for drained alert results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, results: &[AlertResult]) -> crate::Result<()>;
}
