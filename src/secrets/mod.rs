//! Secret Manager module
//!
//! Master key + encrypted store architecture:
//!
//! - one master key, kept in a 0600 key file or injected through the environment
//! - every value encrypted with an AEAD key derived from the master key
//! - decrypted values held in an in-process cache until invalidated

pub mod cache;
pub mod category;
pub mod cipher;
pub mod manager;
pub mod master_key;

pub use category::infer_category;
pub use manager::SecretManager;
pub use master_key::{KeySource, MasterKey};
