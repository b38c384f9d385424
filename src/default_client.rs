//! Process-wide default [`Client`], lazily built with [`ClientConfig::secure_defaults`] the
//! first time a package-level convenience function is called.

use once_cell::sync::OnceCell;

use netfetch_core::{Client, ClientConfig, Result};

static DEFAULT_CLIENT: OnceCell<Client> = OnceCell::new();

pub(crate) fn get() -> Result<&'static Client> {
    DEFAULT_CLIENT.get_or_try_init(|| Client::new(ClientConfig::secure_defaults()))
}

/// Closes the process-wide default client. Idempotent, since [`Client::close`] is. `OnceCell`
/// is not reset, so a convenience call afterward reuses the same (now closed) client rather
/// than rebuilding one; tests that need a fresh client should build their own instead.
pub fn shutdown_default_client() {
    if let Some(client) = DEFAULT_CLIENT.get() {
        client.close();
    }
}
