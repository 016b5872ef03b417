mod file;
mod models;

pub use file::FileStore;
pub use models::*;

use async_trait::async_trait;

/// Persistence for the cached definitions document.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    async fn load(&self) -> crate::Result<Vec<ClusterDefinitions>>;
    async fn save(&self, document: &[ClusterDefinitions]) -> crate::Result<()>;
}
