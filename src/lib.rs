pub mod cli;
pub mod config;
pub mod sink;
pub mod source;
pub mod store;
pub mod web;
