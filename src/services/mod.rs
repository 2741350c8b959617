// src/services/mod.rs

pub mod scorer;
pub mod store;
