use crate::database::model::{Association, Column, ModelDef, RelationKind, Relationship, ID_COLUMN};
use crate::models::user::GROUP_USER;
use crate::models::{PROJECT, USER};

/// Groups allowed to work on a project
pub static PROJECT_GROUP: Association = Association {
    table: "time_project_group",
    left: ("project_id", "time_project"),
    right: ("group_id", "time_group"),
};

pub static GROUP: ModelDef = ModelDef {
    name: "Group",
    table: "time_group",
    columns: &[ID_COLUMN, Column::text("name"), Column::text("description").nullable()],
    relationships: &[
        Relationship {
            name: "users",
            target: &USER,
            kind: RelationKind::ManyToMany {
                association: &GROUP_USER,
                local_column: "group_id",
                remote_column: "user_id",
            },
        },
        Relationship {
            name: "projects",
            target: &PROJECT,
            kind: RelationKind::ManyToMany {
                association: &PROJECT_GROUP,
                local_column: "group_id",
                remote_column: "project_id",
            },
        },
    ],
    owner_column: None,
};
