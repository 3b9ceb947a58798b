//! Platform adapter for the live API

mod rest;
pub mod wire;

pub use rest::RestPlatform;
