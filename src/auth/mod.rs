pub mod identity;
pub mod jwks;
pub mod policy;
pub mod webhook;
