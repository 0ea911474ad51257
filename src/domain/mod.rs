pub mod error;
pub mod repository;
pub mod schema;
pub mod todo;
