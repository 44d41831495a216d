//! identeco — authentication companion service for PostgREST backends.
//!
//! Accounts live in the `auth` schema of the backing database and are
//! exposed to the rest of the stack through signed session tokens. The
//! crate is split into the credential core (`identity`), the stateless
//! token engine (`token`), the OAuth2 federation adapters (`oauth`) and
//! the HTTP/mail boundary (`identeco`).

pub mod cli;
pub mod identeco;
pub mod identity;
pub mod oauth;
pub mod token;
