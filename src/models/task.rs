use crate::database::model::{Column, ModelDef, RelationKind, Relationship, ID_COLUMN};
use crate::models::{PROJECT, USER};

/// Project phase or area that hours are booked to
pub static TASK: ModelDef = ModelDef {
    name: "Task",
    table: "time_task",
    columns: &[
        ID_COLUMN,
        Column::text("name"),
        Column::integer("parent_id").nullable().references("time_task"),
        Column::integer("project_id").nullable().references("time_project"),
        Column::integer("user_id").references("time_user"),
    ],
    relationships: &[
        Relationship {
            name: "project",
            target: &PROJECT,
            kind: RelationKind::BelongsTo { column: "project_id" },
        },
        Relationship {
            name: "user",
            target: &USER,
            kind: RelationKind::BelongsTo { column: "user_id" },
        },
        Relationship {
            name: "parent",
            target: &TASK,
            kind: RelationKind::BelongsTo { column: "parent_id" },
        },
        Relationship {
            name: "children",
            target: &TASK,
            kind: RelationKind::HasMany { remote_column: "parent_id" },
        },
    ],
    owner_column: Some("user_id"),
};
