pub mod extract;
pub mod sanitize;
pub mod transcode;
pub mod valid_uuid;
