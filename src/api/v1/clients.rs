use crate::filter::{BySearchFields, CollectionByPrimaryKey, FilterOp, SearchField};
use crate::models::CLIENT;
use crate::resource::{ConfigurationError, ResourceDef};
use crate::schemas::definitions::CLIENT_SCHEMA;
use crate::schemas::FieldType;

pub fn resource() -> Result<ResourceDef, ConfigurationError> {
    ResourceDef::builder("clients", &CLIENT, &CLIENT_SCHEMA)
        .doc("Clients projects are done for")
        .filter(CollectionByPrimaryKey)
        .filter(BySearchFields::new().field(
            "name",
            SearchField::with_ops(
                FieldType::String,
                &[FilterOp::Eq, FilterOp::Contains, FilterOp::Starts, FilterOp::Ends],
            ),
        ))
        .build()
}
