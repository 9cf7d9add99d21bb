//! Schema Representation - backend-neutral DDL descriptions
//!
//! Migrations build `SchemaStatement`s through the fluent `Schema` entry
//! points; drivers translate them to their own DDL.

use crate::value::Value;

/// Column type tags
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Uuid,
    DateTime,
    Json,
    /// Backend enum type with its allowed cases
    Enum { name: String, cases: Vec<String> },
}

/// A column definition
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub default: Option<Value>,
}

impl ColumnDefinition {
    fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            unique: false,
            auto_increment: false,
            default: None,
        }
    }
}

/// Action taken when a referenced row is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceAction {
    Restrict,
    Cascade,
    SetNull,
}

/// Table-level constraints
#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraint {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    ForeignKey {
        columns: Vec<String>,
        references_table: String,
        references_columns: Vec<String>,
        on_delete: Option<ReferenceAction>,
    },
    /// Check that the named columns are either all null or all set. This is
    /// how composite foreign keys forbid partially-populated references.
    AllOrNothing(Vec<String>),
}

/// A complete table definition
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub constraints: Vec<TableConstraint>,
    pub if_not_exists: bool,
}

/// One DDL operation
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaStatement {
    CreateTable(TableDefinition),
    AlterTable {
        table: String,
        add_columns: Vec<ColumnDefinition>,
        drop_columns: Vec<String>,
        add_constraints: Vec<TableConstraint>,
    },
    DropTable {
        table: String,
    },
}

/// Entry points for building schema statements
pub struct Schema;

impl Schema {
    /// Begin a CREATE TABLE statement
    pub fn create(table: &str) -> TableBuilder {
        TableBuilder::new(table, false)
    }

    /// Begin an idempotent CREATE TABLE IF NOT EXISTS statement
    pub fn create_if_not_exists(table: &str) -> TableBuilder {
        TableBuilder::new(table, true)
    }

    /// Begin an ALTER TABLE statement
    pub fn alter(table: &str) -> AlterBuilder {
        AlterBuilder {
            table: table.to_string(),
            add_columns: Vec::new(),
            drop_columns: Vec::new(),
            add_constraints: Vec::new(),
        }
    }

    /// A DROP TABLE statement
    pub fn drop(table: &str) -> SchemaStatement {
        SchemaStatement::DropTable {
            table: table.to_string(),
        }
    }
}

/// Fluent builder for CREATE TABLE. Column modifiers (`nullable`, `unique`,
/// `default_value`) apply to the most recently added column.
pub struct TableBuilder {
    definition: TableDefinition,
}

impl TableBuilder {
    fn new(table: &str, if_not_exists: bool) -> Self {
        Self {
            definition: TableDefinition {
                name: table.to_string(),
                columns: Vec::new(),
                constraints: Vec::new(),
                if_not_exists,
            },
        }
    }

    /// Auto-incrementing integer primary key named `id`
    pub fn id(mut self) -> Self {
        let mut column = ColumnDefinition::new("id", ColumnType::Int);
        column.auto_increment = true;
        self.definition.columns.push(column);
        self.definition
            .constraints
            .push(TableConstraint::PrimaryKey(vec!["id".to_string()]));
        self
    }

    /// Add a non-null column
    pub fn column(mut self, name: &str, column_type: ColumnType) -> Self {
        self.definition
            .columns
            .push(ColumnDefinition::new(name, column_type));
        self
    }

    /// Mark the last column nullable
    pub fn nullable(mut self) -> Self {
        if let Some(column) = self.definition.columns.last_mut() {
            column.nullable = true;
        }
        self
    }

    /// Mark the last column unique
    pub fn unique(mut self) -> Self {
        if let Some(column) = self.definition.columns.last_mut() {
            column.unique = true;
        }
        self
    }

    /// Give the last column a default value
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        if let Some(column) = self.definition.columns.last_mut() {
            column.default = Some(value.into());
        }
        self
    }

    /// Nullable `created_at`/`updated_at` timestamp columns
    pub fn timestamps(self) -> Self {
        self.column("created_at", ColumnType::DateTime)
            .nullable()
            .column("updated_at", ColumnType::DateTime)
            .nullable()
    }

    /// Nullable `deleted_at` soft-delete timestamp column
    pub fn soft_deletes(self) -> Self {
        self.column("deleted_at", ColumnType::DateTime).nullable()
    }

    /// Composite primary key over the given columns
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.definition.constraints.push(TableConstraint::PrimaryKey(
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Unique constraint over the given columns
    pub fn unique_on(mut self, columns: &[&str]) -> Self {
        self.definition.constraints.push(TableConstraint::Unique(
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Foreign key constraint
    pub fn foreign_key(
        mut self,
        columns: &[&str],
        references_table: &str,
        references_columns: &[&str],
    ) -> Self {
        self.definition.constraints.push(TableConstraint::ForeignKey {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            references_table: references_table.to_string(),
            references_columns: references_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: None,
        });
        self
    }

    /// All-or-nothing check over a composite reference's columns
    pub fn all_or_nothing(mut self, columns: &[&str]) -> Self {
        self.definition.constraints.push(TableConstraint::AllOrNothing(
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Finish the statement
    pub fn build(self) -> SchemaStatement {
        SchemaStatement::CreateTable(self.definition)
    }
}

/// Fluent builder for ALTER TABLE
pub struct AlterBuilder {
    table: String,
    add_columns: Vec<ColumnDefinition>,
    drop_columns: Vec<String>,
    add_constraints: Vec<TableConstraint>,
}

impl AlterBuilder {
    /// Add a nullable column (additions must be nullable or carry a default
    /// so existing rows stay valid)
    pub fn add_column(mut self, name: &str, column_type: ColumnType) -> Self {
        let mut column = ColumnDefinition::new(name, column_type);
        column.nullable = true;
        self.add_columns.push(column);
        self
    }

    /// Drop a column
    pub fn drop_column(mut self, name: &str) -> Self {
        self.drop_columns.push(name.to_string());
        self
    }

    /// Add a table constraint
    pub fn add_constraint(mut self, constraint: TableConstraint) -> Self {
        self.add_constraints.push(constraint);
        self
    }

    /// Finish the statement
    pub fn build(self) -> SchemaStatement {
        SchemaStatement::AlterTable {
            table: self.table,
            add_columns: self.add_columns,
            drop_columns: self.drop_columns,
            add_constraints: self.add_constraints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_builder_applies_modifiers_to_last_column() {
        let statement = Schema::create("tags")
            .id()
            .column("name", ColumnType::Text)
            .unique()
            .column("note", ColumnType::Text)
            .nullable()
            .build();

        let SchemaStatement::CreateTable(def) = statement else {
            panic!("expected create table");
        };
        assert_eq!(def.name, "tags");
        let name = &def.columns[1];
        assert!(name.unique && !name.nullable);
        let note = &def.columns[2];
        assert!(note.nullable && !note.unique);
        assert_eq!(
            def.constraints[0],
            TableConstraint::PrimaryKey(vec!["id".to_string()])
        );
    }

    #[test]
    fn composite_reference_records_all_or_nothing_check() {
        let statement = Schema::create("orbits")
            .column("star_system", ColumnType::Text)
            .nullable()
            .column("star_ordinal", ColumnType::Int)
            .nullable()
            .all_or_nothing(&["star_system", "star_ordinal"])
            .build();

        let SchemaStatement::CreateTable(def) = statement else {
            panic!("expected create table");
        };
        assert!(def.constraints.iter().any(|c| matches!(
            c,
            TableConstraint::AllOrNothing(cols) if cols.len() == 2
        )));
    }
}
