pub mod admin;
pub mod repo;
pub mod repo_types;
