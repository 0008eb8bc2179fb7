use crate::database::model::{Association, Column, ModelDef, RelationKind, Relationship, ID_COLUMN};
use crate::models::{NOW, PROJECT, TAG, TASK, USER};

pub const ACTIVITY_TYPES: [&str; 9] = [
    "unassigned",
    "working",
    "break",
    "trip",
    "vacation",
    "holiday",
    "sick",
    "onleave",
    "appointment",
];

/// Tags attached to an activity
pub static ACTIVITY_TAG: Association = Association {
    table: "time_activity_tag",
    left: ("activity_id", "time_activity"),
    right: ("tag_id", "time_tag"),
};

/// A record of activity: work on a project, breaks or time away
pub static ACTIVITY: ModelDef = ModelDef {
    name: "Activity",
    table: "time_activity",
    columns: &[
        ID_COLUMN,
        Column::text("description"),
        Column::datetime("start").default(NOW),
        Column::datetime("end").nullable(),
        Column::text("activity_type").default("'unassigned'"),
        Column::integer("project_id").nullable().references("time_project"),
        Column::integer("task_id").nullable().references("time_task"),
        Column::integer("user_id").references("time_user"),
    ],
    relationships: &[
        Relationship {
            name: "project",
            target: &PROJECT,
            kind: RelationKind::BelongsTo { column: "project_id" },
        },
        Relationship {
            name: "task",
            target: &TASK,
            kind: RelationKind::BelongsTo { column: "task_id" },
        },
        Relationship {
            name: "user",
            target: &USER,
            kind: RelationKind::BelongsTo { column: "user_id" },
        },
        Relationship {
            name: "tags",
            target: &TAG,
            kind: RelationKind::ManyToMany {
                association: &ACTIVITY_TAG,
                local_column: "activity_id",
                remote_column: "tag_id",
            },
        },
    ],
    owner_column: Some("user_id"),
};
