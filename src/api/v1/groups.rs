use crate::filter::{BySearchFields, CollectionByPrimaryKey, FilterOp, SearchField};
use crate::models::GROUP;
use crate::resource::{ConfigurationError, ResourceDef};
use crate::schemas::definitions::GROUP_SCHEMA;
use crate::schemas::FieldType;

pub fn resource() -> Result<ResourceDef, ConfigurationError> {
    ResourceDef::builder("groups", &GROUP, &GROUP_SCHEMA)
        .doc("Groups of users sharing projects")
        .filter(CollectionByPrimaryKey)
        .filter(BySearchFields::new().field(
            "name",
            SearchField::with_ops(FieldType::String, &[FilterOp::Eq, FilterOp::Contains]),
        ))
        .build()
}
