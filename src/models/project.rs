use crate::database::model::{Column, ModelDef, RelationKind, Relationship, ID_COLUMN};
use crate::models::group::PROJECT_GROUP;
use crate::models::{CLIENT, GROUP, TASK, USER};

/// Project for a client, or internal when it has no client
pub static PROJECT: ModelDef = ModelDef {
    name: "Project",
    table: "time_project",
    columns: &[
        ID_COLUMN,
        Column::text("name"),
        Column::integer("client_id").nullable().references("time_client"),
        Column::integer("parent_id").nullable().references("time_project"),
        Column::integer("user_id").references("time_user"),
        Column::boolean("is_public").default("0"),
        Column::boolean("is_active").default("1"),
        Column::datetime("active_from").nullable(),
        Column::datetime("active_until").nullable(),
    ],
    relationships: &[
        Relationship {
            name: "client",
            target: &CLIENT,
            kind: RelationKind::BelongsTo { column: "client_id" },
        },
        Relationship {
            name: "user",
            target: &USER,
            kind: RelationKind::BelongsTo { column: "user_id" },
        },
        Relationship {
            name: "parent",
            target: &PROJECT,
            kind: RelationKind::BelongsTo { column: "parent_id" },
        },
        Relationship {
            name: "tasks",
            target: &TASK,
            kind: RelationKind::HasMany { remote_column: "project_id" },
        },
        Relationship {
            name: "children",
            target: &PROJECT,
            kind: RelationKind::HasMany { remote_column: "parent_id" },
        },
        Relationship {
            name: "groups",
            target: &GROUP,
            kind: RelationKind::ManyToMany {
                association: &PROJECT_GROUP,
                local_column: "project_id",
                remote_column: "group_id",
            },
        },
    ],
    owner_column: Some("user_id"),
};
