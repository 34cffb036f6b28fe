pub mod error;
pub mod models;
pub mod pairing;
pub mod registry;
pub mod settings;
