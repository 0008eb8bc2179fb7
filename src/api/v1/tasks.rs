use crate::filter::{ByCurrentUser, BySearchFields, CollectionByPrimaryKey, FilterOp, SearchField};
use crate::models::TASK;
use crate::resource::{ConfigurationError, ResourceDef};
use crate::schemas::definitions::TASK_SCHEMA;
use crate::schemas::FieldType;

pub fn resource() -> Result<ResourceDef, ConfigurationError> {
    let search = BySearchFields::new()
        .field(
            "name",
            SearchField::with_ops(FieldType::String, &[FilterOp::Eq, FilterOp::Contains]),
        )
        .field(
            "project_id",
            SearchField::with_ops(FieldType::Integer, &[FilterOp::Eq, FilterOp::In, FilterOp::Null]),
        );

    ResourceDef::builder("tasks", &TASK, &TASK_SCHEMA)
        .doc("Tasks of a project")
        .filter(CollectionByPrimaryKey)
        .filter(ByCurrentUser::new())
        .filter(search)
        .build()
}
