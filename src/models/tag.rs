use crate::database::model::{Column, ModelDef, RelationKind, Relationship, ID_COLUMN};
use crate::models::USER;

pub const TAG_TYPES: [&str; 3] = ["system", "accounting", "activity"];

pub static TAG: ModelDef = ModelDef {
    name: "Tag",
    table: "time_tag",
    columns: &[
        ID_COLUMN,
        Column::text("name"),
        Column::text("short_name").nullable(),
        Column::text("description").nullable(),
        Column::text("tag_type").default("'activity'"),
        // Set when this tag is an alias of another one
        Column::integer("original_id").nullable().references("time_tag"),
        Column::integer("user_id").references("time_user"),
    ],
    relationships: &[
        Relationship {
            name: "user",
            target: &USER,
            kind: RelationKind::BelongsTo { column: "user_id" },
        },
        Relationship {
            name: "original",
            target: &TAG,
            kind: RelationKind::BelongsTo { column: "original_id" },
        },
        Relationship {
            name: "aliases",
            target: &TAG,
            kind: RelationKind::HasMany { remote_column: "original_id" },
        },
    ],
    owner_column: Some("user_id"),
};
