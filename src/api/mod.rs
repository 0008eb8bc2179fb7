//! Versioned REST APIs

pub mod v1;

use crate::resource::{ApiManager, RegistryError};

/// Build the manager holding every API version
pub fn manager() -> Result<ApiManager, RegistryError> {
    let mut manager = ApiManager::new();
    manager.add_version(v1::version()?)?;
    Ok(manager)
}
