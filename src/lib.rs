#![forbid(unsafe_code)]

pub mod api;
pub mod app;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod content;
pub mod logging;
pub mod poll;
pub mod quiz;
pub mod render;
pub mod shell;
pub mod speech;

#[cfg(test)]
mod testing;
