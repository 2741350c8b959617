// src/models/mod.rs

pub mod comment;
pub mod quiz;
pub mod statistic;
pub mod submission;
pub mod user;
