use crate::database::model::{Association, Column, ModelDef, RelationKind, Relationship, ID_COLUMN};
use crate::models::{GROUP, TAG};

/// Users in a group
pub static GROUP_USER: Association = Association {
    table: "time_group_user",
    left: ("group_id", "time_group"),
    right: ("user_id", "time_user"),
};

pub static USER: ModelDef = ModelDef {
    name: "User",
    table: "time_user",
    columns: &[
        ID_COLUMN,
        Column::text("email").unique(),
        Column::text("first_name"),
        Column::text("last_name"),
        Column::text("key").unique().read_permission("time_user_read_key"),
        Column::text("salt").private(),
        Column::text("password").nullable().private(),
        Column::boolean("is_admin").default("0"),
    ],
    relationships: &[
        Relationship {
            name: "tags",
            target: &TAG,
            kind: RelationKind::HasMany { remote_column: "user_id" },
        },
        Relationship {
            name: "groups",
            target: &GROUP,
            kind: RelationKind::ManyToMany {
                association: &GROUP_USER,
                local_column: "user_id",
                remote_column: "group_id",
            },
        },
    ],
    owner_column: None,
};
