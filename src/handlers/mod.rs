// src/handlers/mod.rs

pub mod auth;
pub mod comments;
pub mod profile;
pub mod quiz;
pub mod statistics;
pub mod submission;
