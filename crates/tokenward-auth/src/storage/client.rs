//! Client storage trait.
//!
//! Registration and secret rotation happen elsewhere; the token endpoints
//! only ever resolve a client by id.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Client;

/// Read access to registered OAuth clients.
///
/// # Example
///
/// ```ignore
/// use tokenward_auth::storage::ClientStorage;
///
/// async fn example(storage: &dyn ClientStorage) -> AuthResult<()> {
///     if let Some(client) = storage.find_by_client_id("my-app").await? {
///         println!("Found {} client", client.client_type);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Find a client by its OAuth client_id.
    ///
    /// Inactive clients are returned as well; the authenticator rejects them.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>>;
}
