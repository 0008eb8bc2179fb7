//! Static model definitions.
//!
//! A [`ModelDef`] describes one table: its columns, declared relationships and
//! the column that names the owning user. Definitions are plain `static`
//! values so resources, filters and the session can share them freely.

use crate::database::query::Query;

/// Storage type of a column, used for DDL, row decoding and value coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    Boolean,
    DateTime,
}

impl ColumnKind {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Text => "TEXT",
            ColumnKind::Boolean => "BOOLEAN",
            // Stored as RFC 3339 text
            ColumnKind::DateTime => "TEXT",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "Integer",
            ColumnKind::Text => "String",
            ColumnKind::Boolean => "Boolean",
            ColumnKind::DateTime => "DateTime",
        }
    }
}

/// Who may see a column when an object is serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    /// Never serialized
    Private,
    /// Serialized only for users holding the permission
    Permission(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub unique: bool,
    pub references: Option<&'static str>,
    pub default: Option<&'static str>,
    pub visibility: Visibility,
}

impl Column {
    const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            unique: false,
            references: None,
            default: None,
            visibility: Visibility::Public,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Integer)
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Boolean)
    }

    pub const fn datetime(name: &'static str) -> Self {
        Self::new(name, ColumnKind::DateTime)
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn references(mut self, table: &'static str) -> Self {
        self.references = Some(table);
        self
    }

    /// SQL default expression
    pub const fn default(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    pub const fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub const fn read_permission(mut self, permission: &'static str) -> Self {
        self.visibility = Visibility::Permission(permission);
        self
    }

    fn ddl(&self) -> String {
        if self.name == ID {
            return format!("\"{}\" INTEGER PRIMARY KEY AUTOINCREMENT", ID);
        }

        let mut ddl = format!("\"{}\" {}", self.name, self.kind.sql_type());
        if !self.nullable {
            ddl.push_str(" NOT NULL");
        }
        if self.unique {
            ddl.push_str(" UNIQUE");
        }
        if let Some(default) = self.default {
            ddl.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(table) = self.references {
            ddl.push_str(&format!(" REFERENCES \"{}\" (\"{}\")", table, ID));
        }
        ddl
    }
}

/// Name of the primary key column shared by all models
pub const ID: &str = "id";

/// Primary key column; every model lists it first
pub const ID_COLUMN: Column = Column::integer(ID);

/// Table joining two models in a many-to-many relationship
#[derive(Debug)]
pub struct Association {
    pub table: &'static str,
    pub left: (&'static str, &'static str),
    pub right: (&'static str, &'static str),
}

impl Association {
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (\
             \"{l}\" INTEGER NOT NULL REFERENCES \"{lt}\" (\"id\") ON DELETE CASCADE, \
             \"{r}\" INTEGER NOT NULL REFERENCES \"{rt}\" (\"id\") ON DELETE CASCADE, \
             PRIMARY KEY (\"{l}\", \"{r}\"))",
            table = self.table,
            l = self.left.0,
            lt = self.left.1,
            r = self.right.0,
            rt = self.right.1,
        )
    }
}

#[derive(Debug)]
pub enum RelationKind {
    /// Foreign key on this model pointing at the target
    BelongsTo { column: &'static str },
    /// Foreign key on the target pointing back at this model
    HasMany { remote_column: &'static str },
    /// Rows linked through an association table
    ManyToMany {
        association: &'static Association,
        local_column: &'static str,
        remote_column: &'static str,
    },
}

#[derive(Debug)]
pub struct Relationship {
    pub name: &'static str,
    pub target: &'static ModelDef,
    pub kind: RelationKind,
}

impl Relationship {
    /// Whether the relationship holds a collection of objects
    pub fn is_list(&self) -> bool {
        !matches!(self.kind, RelationKind::BelongsTo { .. })
    }

    /// Query for the target objects related to the object with primary key `pk`.
    ///
    /// `owner` is the model declaring this relationship.
    pub fn query(&self, owner: &ModelDef, pk: i64) -> Query {
        let query = self.target.query();
        match self.kind {
            RelationKind::BelongsTo { column } => query.raw(
                format!("\"{}\" = (SELECT \"{}\" FROM \"{}\" WHERE \"{}\" = ?)", ID, column, owner.table, ID),
                vec![pk.into()],
            ),
            RelationKind::HasMany { remote_column } => query.raw(format!("\"{}\" = ?", remote_column), vec![pk.into()]),
            RelationKind::ManyToMany {
                association,
                local_column,
                remote_column,
            } => query.raw(
                format!(
                    "\"{}\" IN (SELECT \"{}\" FROM \"{}\" WHERE \"{}\" = ?)",
                    ID, remote_column, association.table, local_column
                ),
                vec![pk.into()],
            ),
        }
    }
}

/// Description of a persisted model
#[derive(Debug)]
pub struct ModelDef {
    /// Class-like name, e.g. `Project`
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [Column],
    pub relationships: &'static [Relationship],
    /// Column holding the id of the user that owns a row
    pub owner_column: Option<&'static str>,
}

impl ModelDef {
    /// Get a permission name for this model, e.g. `time_project_read`
    pub fn get_permission(&self, suffix: &str) -> String {
        format!("{}_{}", self.table, suffix)
    }

    /// Default permissions every model defines
    pub fn default_permissions(&self) -> Vec<String> {
        ["create", "read", "update", "delete", "action"]
            .iter()
            .map(|suffix| self.get_permission(suffix))
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn query(&'static self) -> Query {
        Query::new(self)
    }

    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(Column::ddl).collect();
        format!("CREATE TABLE IF NOT EXISTS \"{}\" ({})", self.table, columns.join(", "))
    }

    /// Association tables used by this model's many-to-many relationships
    pub fn associations(&self) -> impl Iterator<Item = &'static Association> + '_ {
        self.relationships.iter().filter_map(|r| match r.kind {
            RelationKind::ManyToMany { association, .. } => Some(association),
            _ => None,
        })
    }
}
