//! Durable token stores
//!
//! Both stores implement the common `TokenStore` contract: `save` rejects
//! records without an access token and `load` reports them as corrupt.

pub mod file;
pub mod keychain;

pub use file::FileTokenStore;
pub use keychain::KeychainTokenStore;
