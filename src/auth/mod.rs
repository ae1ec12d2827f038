//! Credentials: Argon2 password hashing and signed access tokens.

mod password;
mod token;

pub use password::{hash_password, verify_password};
pub use token::{decode_token, issue_token, token_from_header, Claims};
