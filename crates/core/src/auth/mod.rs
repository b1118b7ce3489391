//! Password hashing and owner capability tokens.

pub mod password;
pub mod token;

pub use password::{PasswordError, hash_password, verify_password};
pub use token::{OwnerToken, hash_token};
