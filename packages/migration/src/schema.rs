//! Live schema model consumed by the lifecycle orchestrator.
//!
//! `ensure` and `drop` operate on whatever `SchemaModel` they are handed, and
//! revision autogeneration diffs the live database against it. `AppSchema`
//! is the model this workspace ships with.

use sea_orm_migration::prelude::*;

/// One table of the schema model: its name and its backend-neutral
/// `CREATE TABLE` statement.
#[derive(Debug, Clone)]
pub struct ModelTable {
    pub name: String,
    pub create: TableCreateStatement,
}

impl ModelTable {
    pub fn new(name: impl Into<String>, create: TableCreateStatement) -> Self {
        Self {
            name: name.into(),
            create,
        }
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.create
            .get_columns()
            .iter()
            .map(|col| col.get_column_name())
            .collect()
    }
}

/// Source of the tables the application expects to exist.
///
/// Tables are returned in creation order; teardown walks them in reverse.
pub trait SchemaModel: Send + Sync {
    fn tables(&self) -> Vec<ModelTable>;

    fn table_names(&self) -> Vec<String> {
        self.tables().into_iter().map(|t| t.name).collect()
    }
}

#[derive(Iden)]
enum Releases {
    Table,
    Id,
    Version,
    DeployedAt,
    Notes,
}

#[derive(Iden)]
enum Settings {
    Table,
    Key,
    Value,
    UpdatedAt,
}

/// The application's current table set.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppSchema;

impl SchemaModel for AppSchema {
    fn tables(&self) -> Vec<ModelTable> {
        vec![
            ModelTable::new(
                Releases::Table.to_string(),
                Table::create()
                    .table(Releases::Table)
                    .col(
                        ColumnDef::new(Releases::Id)
                            .big_integer()
                            .not_null()
                            .primary_key()
                            .auto_increment(),
                    )
                    .col(ColumnDef::new(Releases::Version).string().not_null())
                    .col(
                        ColumnDef::new(Releases::DeployedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Releases::Notes).text().null())
                    .to_owned(),
            ),
            ModelTable::new(
                Settings::Table.to_string(),
                Table::create()
                    .table(Settings::Table)
                    .col(
                        ColumnDef::new(Settings::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Settings::Value).text().not_null())
                    .col(
                        ColumnDef::new(Settings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            ),
        ]
    }
}
