pub mod document;
pub mod image;
pub mod variant;
