pub mod provider_client;
#[cfg(test)]
pub(crate) mod scripted;

pub use provider_client::{HttpProviderClient, ProviderApi};
