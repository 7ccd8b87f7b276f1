pub mod approvals;
pub mod collections;
pub mod config;
pub mod generation;
pub mod health;
pub mod proposals;
pub mod sections;
pub mod templates;
pub mod utils;
