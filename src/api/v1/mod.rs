//! Version 1 of the time tracking API

pub mod activities;
pub mod clients;
pub mod groups;
pub mod projects;
pub mod tags;
pub mod tasks;
pub mod users;

use crate::resource::{ApiVersion, RegistryError, ResourceRegistry};

pub const VERSION: &str = "v1";

pub fn registry() -> Result<ResourceRegistry, RegistryError> {
    let mut registry = ResourceRegistry::new();
    registry.register(users::resource()?)?;
    registry.register(groups::resource()?)?;
    registry.register(clients::resource()?)?;
    registry.register(projects::resource()?)?;
    registry.register(tasks::resource()?)?;
    registry.register(tags::resource()?)?;
    registry.register(activities::resource()?)?;
    Ok(registry)
}

pub fn version() -> Result<ApiVersion, RegistryError> {
    Ok(ApiVersion::new(VERSION, registry()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_resource() {
        let registry = registry().unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(
            names,
            vec!["activities", "clients", "groups", "projects", "tags", "tasks", "users"]
        );
        assert_eq!(registry.model("activities").unwrap().table, "time_activity");
    }
}
