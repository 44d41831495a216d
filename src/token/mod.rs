//! Stateless signed tokens.
//!
//! Two kinds are issued: HS256 session tokens carrying identity claims
//! for downstream services, and password-reset tokens whose MAC is
//! bound to the account's current password hash so a password change
//! invalidates every outstanding token without any stored state.

pub mod reset;
pub mod session;
