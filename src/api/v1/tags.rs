use crate::filter::{ByCurrentUser, BySearchFields, CollectionByPrimaryKey, FilterOp, SearchField};
use crate::models::TAG;
use crate::resource::{ConfigurationError, ResourceDef};
use crate::schemas::definitions::TAG_SCHEMA;
use crate::schemas::FieldType;

pub fn resource() -> Result<ResourceDef, ConfigurationError> {
    let search = BySearchFields::new()
        .field(
            "name",
            SearchField::with_ops(FieldType::String, &[FilterOp::Eq, FilterOp::Contains, FilterOp::Starts]),
        )
        .field(
            "tag_type",
            SearchField::with_ops(FieldType::String, &[FilterOp::Eq, FilterOp::In]),
        );

    ResourceDef::builder("tags", &TAG, &TAG_SCHEMA)
        .doc("Tags to classify activities")
        .filter(CollectionByPrimaryKey)
        .filter(ByCurrentUser::new())
        .filter(search)
        .build()
}
