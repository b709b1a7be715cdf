//! Data models shared across the session layer.
//!
//! - `AccessCredential`, `CsrfToken`: opaque tokens with redacted `Debug`
//! - `SessionUser`: the authenticated principal

pub mod token;
pub mod user;

pub use token::{AccessCredential, CsrfToken};
pub use user::SessionUser;
