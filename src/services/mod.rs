//! Service layer: domain logic called by the socket and HTTP handlers.

pub mod presence;
