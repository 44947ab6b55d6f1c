pub mod analysis;
pub mod archive;
pub mod capture;
pub mod cli;
pub mod config;
pub mod global;
pub mod page;
pub mod store;
