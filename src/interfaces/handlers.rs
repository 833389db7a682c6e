pub mod documents;
pub mod home;
pub mod images;
pub mod system;
