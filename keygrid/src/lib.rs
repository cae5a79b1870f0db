pub mod cache;
pub mod domain;
pub mod events;
pub mod persistence;
pub mod ports;
pub mod secret;
pub mod services;

#[cfg(test)]
pub(crate) mod testutil;
