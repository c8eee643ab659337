//! Automates the developer portal to create push notification certificates.
//!
//! A [`portal::PortalSession`] drives one browser through login, app lookup and
//! the certificate wizard. The browser sits behind [`browser::PortalDriver`],
//! so the flow runs the same against Chrome over CDP or a scripted fake.

pub mod browser;
pub mod config;
pub mod credentials;
pub mod error;
pub mod portal;
