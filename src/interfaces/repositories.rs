pub mod document;
pub mod image;
pub mod sqlx_repo;
