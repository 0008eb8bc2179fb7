use crate::database::model::{Column, ModelDef, RelationKind, Relationship, ID_COLUMN};
use crate::models::PROJECT;

pub static CLIENT: ModelDef = ModelDef {
    name: "Client",
    table: "time_client",
    columns: &[ID_COLUMN, Column::text("name")],
    relationships: &[Relationship {
        name: "projects",
        target: &PROJECT,
        kind: RelationKind::HasMany { remote_column: "client_id" },
    }],
    owner_column: None,
};
