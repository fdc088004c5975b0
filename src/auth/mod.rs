//! Authentication module
//!
//! Credentials for the logged-in session. Token provisioning (OAuth
//! app registration and authorization) happens outside this crate.

mod credential;

pub use credential::{Credential, CredentialProvider, StaticCredentialProvider};
