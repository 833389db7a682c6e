use uuid::Uuid;

use crate::errors::AppError;

/// Parses a path segment that must be a UUID, mapping failure to a 400.
pub fn valid_uuid(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::InvalidInput(format!("Not a valid UUID: {id}")))
}
