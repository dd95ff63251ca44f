// Library exports for the Motion Coach CLI
// This allows testing of internal modules

pub mod commands;
pub mod config;
pub mod recording;
