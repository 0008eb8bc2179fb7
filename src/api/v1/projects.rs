use crate::filter::{ByCurrentUser, BySearchFields, CollectionByPrimaryKey, FilterOp, SearchField};
use crate::models::PROJECT;
use crate::resource::{ConfigurationError, ResourceDef};
use crate::schemas::definitions::PROJECT_SCHEMA;
use crate::schemas::FieldType;

pub fn resource() -> Result<ResourceDef, ConfigurationError> {
    let search = BySearchFields::new()
        .field(
            "name",
            SearchField::with_ops(FieldType::String, &[FilterOp::Eq, FilterOp::Contains, FilterOp::Starts]),
        )
        .field(
            "client_id",
            SearchField::with_ops(
                FieldType::Integer,
                &[FilterOp::Eq, FilterOp::In, FilterOp::Null, FilterOp::NotNull],
            ),
        )
        .field("is_public", SearchField::with_ops(FieldType::Boolean, &[FilterOp::Eq]))
        .field("is_active", SearchField::with_ops(FieldType::Boolean, &[FilterOp::Eq]));

    ResourceDef::builder("projects", &PROJECT, &PROJECT_SCHEMA)
        .doc("Projects, optionally done for a client")
        .filter(CollectionByPrimaryKey)
        .filter(ByCurrentUser::new().filter_nulls())
        .filter(search)
        .build()
}
