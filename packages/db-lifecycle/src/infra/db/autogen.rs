//! Revision autogeneration: diff the live schema against the model and write
//! the result out as a new migration source file.

use std::fs;
use std::path::{Path, PathBuf};

use migration::{ModelTable, SchemaModel};
use sea_orm::sea_query::{Alias, ColumnDef, Table};
use sea_orm::DatabaseBackend;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::DbLifecycleError;
use crate::infra::db::introspect::LiveSchema;

/// Structural difference between the live database and the schema model
#[derive(Debug, Clone, Default)]
pub struct SchemaDiff {
    pub create_tables: Vec<ModelTable>,
    pub drop_tables: Vec<String>,
    pub add_columns: Vec<(String, ColumnDef)>,
    pub drop_columns: Vec<(String, String)>,
}

/// Backend SQL for one side (up or down) of a revision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedSql {
    pub up: Vec<String>,
    pub down: Vec<String>,
}

impl SchemaDiff {
    pub fn between<S>(live: &LiveSchema, model: &S) -> Self
    where
        S: SchemaModel + ?Sized,
    {
        let mut diff = SchemaDiff::default();
        let tables = model.tables();

        for table in &tables {
            match live.columns(&table.name) {
                None => diff.create_tables.push(table.clone()),
                Some(live_cols) => {
                    for col in table.create.get_columns() {
                        let name = col.get_column_name();
                        if !live_cols.iter().any(|c| *c == name) {
                            diff.add_columns.push((table.name.clone(), col.clone()));
                        }
                    }
                    let model_cols = table.column_names();
                    for live_col in live_cols {
                        if !model_cols.contains(live_col) {
                            diff.drop_columns
                                .push((table.name.clone(), live_col.clone()));
                        }
                    }
                }
            }
        }

        for live_table in live.table_names() {
            if !tables.iter().any(|t| t.name == live_table) {
                diff.drop_tables.push(live_table.to_string());
            }
        }

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.create_tables.is_empty()
            && self.drop_tables.is_empty()
            && self.add_columns.is_empty()
            && self.drop_columns.is_empty()
    }

    /// Dropped tables and columns cannot be restored by `down`
    pub fn irreversible_ops(&self) -> usize {
        self.drop_tables.len() + self.drop_columns.len()
    }

    pub fn render(&self, backend: DatabaseBackend) -> RenderedSql {
        let mut up = Vec::new();
        let mut down = Vec::new();

        for table in &self.create_tables {
            up.push(backend.build(&table.create).sql);
            let drop = Table::drop()
                .table(Alias::new(table.name.as_str()))
                .to_owned();
            down.push(backend.build(&drop).sql);
        }
        for (table, col) in &self.add_columns {
            let add = Table::alter()
                .table(Alias::new(table.as_str()))
                .add_column(col.clone())
                .to_owned();
            up.push(backend.build(&add).sql);
            let remove = Table::alter()
                .table(Alias::new(table.as_str()))
                .drop_column(Alias::new(col.get_column_name()))
                .to_owned();
            down.push(backend.build(&remove).sql);
        }
        for (table, col) in &self.drop_columns {
            let remove = Table::alter()
                .table(Alias::new(table.as_str()))
                .drop_column(Alias::new(col.as_str()))
                .to_owned();
            up.push(backend.build(&remove).sql);
        }
        for table in &self.drop_tables {
            let drop = Table::drop().table(Alias::new(table.as_str())).to_owned();
            up.push(backend.build(&drop).sql);
        }

        // undo in reverse order of application
        down.reverse();
        RenderedSql { up, down }
    }
}

/// `m{YYYYMMDD_HHMMSS}_{slug}`, the naming scheme the migrator orders by
pub fn revision_id(now: OffsetDateTime, message: &str) -> Result<String, DbLifecycleError> {
    let stamp = now
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .map_err(|e| DbLifecycleError::script(format!("failed to format revision timestamp: {e}")))?;
    Ok(format!("m{stamp}_{}", slugify(message)))
}

fn slugify(message: &str) -> String {
    let mut slug = String::new();
    for c in message.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "autogenerated".to_string()
    } else {
        slug.chars().take(48).collect::<String>().trim_end_matches('_').to_string()
    }
}

/// Directory holding the migration crate sources (`lib.rs` + one file per revision)
#[derive(Debug, Clone)]
pub struct ScriptDirectory {
    dir: PathBuf,
}

impl ScriptDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Revision ids listed in `lib.rs`'s `migrations()`, in chain order.
    pub fn registered_revisions(&self) -> Result<Vec<String>, DbLifecycleError> {
        let lib_path = self.dir.join("lib.rs");
        let lib_src =
            fs::read_to_string(&lib_path).map_err(|e| DbLifecycleError::io(&lib_path, e))?;
        Ok(registered_ids(&lib_src))
    }

    /// Write `<id>.rs` and register it in `lib.rs`. Returns the new file's path.
    pub fn write_revision(
        &self,
        id: &str,
        parent: Option<&str>,
        message: &str,
        diff: &SchemaDiff,
    ) -> Result<PathBuf, DbLifecycleError> {
        let lib_path = self.dir.join("lib.rs");
        let lib_src =
            fs::read_to_string(&lib_path).map_err(|e| DbLifecycleError::io(&lib_path, e))?;
        let registered = register_module(&lib_src, id)?;

        let script_path = self.dir.join(format!("{id}.rs"));
        if script_path.exists() {
            return Err(DbLifecycleError::script(format!(
                "revision file already exists: {}",
                script_path.display()
            )));
        }

        let script = render_script(id, parent, message, diff);
        fs::write(&script_path, script).map_err(|e| DbLifecycleError::io(&script_path, e))?;
        fs::write(&lib_path, registered).map_err(|e| DbLifecycleError::io(&lib_path, e))?;

        debug!(script = %script_path.display(), "revision script written");
        info!(revision = id, lib = %lib_path.display(), "revision registered");
        Ok(script_path)
    }
}

fn registered_ids(lib_src: &str) -> Vec<String> {
    const OPEN: &str = "Box::new(";
    const CLOSE: &str = "::Migration)";

    let mut ids = Vec::new();
    let mut rest = lib_src;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            break;
        };
        let id = after[..end].trim();
        if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            ids.push(id.to_string());
        }
        rest = &after[end + CLOSE.len()..];
    }
    ids
}

/// Add `mod <id>;` after the last revision module and append the revision to
/// the `migrations()` list.
fn register_module(lib_src: &str, id: &str) -> Result<String, DbLifecycleError> {
    let entry_marker = "::Migration)";
    let Some(entry_idx) = lib_src.rfind(entry_marker) else {
        return Err(DbLifecycleError::script(
            "lib.rs has no Box::new(<revision>::Migration) entry to append after",
        ));
    };
    let mut entry_end = entry_idx + entry_marker.len();

    let line_start = lib_src[..entry_idx].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let indent: String = lib_src[line_start..]
        .chars()
        .take_while(|c| c.is_whitespace())
        .collect();

    let entry = if lib_src[entry_end..].starts_with(',') {
        entry_end += 1;
        format!("\n{indent}Box::new({id}::Migration),")
    } else {
        format!(", Box::new({id}::Migration)")
    };

    let mut out = String::with_capacity(lib_src.len() + 64);
    out.push_str(&lib_src[..entry_end]);
    out.push_str(&entry);
    out.push_str(&lib_src[entry_end..]);

    let mod_line = format!("mod {id};");
    let mut lines: Vec<String> = out.lines().map(str::to_string).collect();
    let Some(last_mod) = lines
        .iter()
        .rposition(|l| l.trim_start().starts_with("mod m") && l.contains(';'))
    else {
        return Err(DbLifecycleError::script(
            "lib.rs has no `mod m...;` revision module declaration",
        ));
    };
    lines.insert(last_mod + 1, mod_line);

    let mut joined = lines.join("\n");
    if lib_src.ends_with('\n') {
        joined.push('\n');
    }
    Ok(joined)
}

fn render_statements(name: &str, statements: &[String]) -> String {
    let mut out = format!("const {name}: &[&str] = &[\n");
    for sql in statements {
        out.push_str(&format!("    r##\"{sql}\"##,\n"));
    }
    out.push_str("];\n");
    out
}

fn render_script(id: &str, parent: Option<&str>, message: &str, diff: &SchemaDiff) -> String {
    let postgres = diff.render(DatabaseBackend::Postgres);
    let sqlite = diff.render(DatabaseBackend::Sqlite);
    let message = message.lines().next().unwrap_or_default();

    let mut out = String::new();
    out.push_str(&format!("//! Revision ID: {id}\n"));
    out.push_str(&format!("//! Revises: {}\n", parent.unwrap_or("<base>")));
    out.push_str(&format!("//! Message: {message}\n"));
    out.push_str("//!\n//! Autogenerated from the live schema; review before applying.\n");
    if diff.is_empty() {
        out.push_str("//! No schema changes were detected.\n");
    }
    if diff.irreversible_ops() > 0 {
        out.push_str(&format!(
            "//! {} drop(s) in `up` have no counterpart in `down`.\n",
            diff.irreversible_ops()
        ));
    }
    out.push('\n');
    out.push_str("use sea_orm_migration::prelude::*;\n");
    out.push_str("use sea_orm_migration::sea_orm::{ConnectionTrait, DbBackend};\n\n");
    out.push_str("#[derive(DeriveMigrationName)]\npub struct Migration;\n\n");
    out.push_str(&render_statements("UP_POSTGRES", &postgres.up));
    out.push_str(&render_statements("UP_SQLITE", &sqlite.up));
    out.push_str(&render_statements("DOWN_POSTGRES", &postgres.down));
    out.push_str(&render_statements("DOWN_SQLITE", &sqlite.down));
    out.push_str(
        r#"
async fn run(manager: &SchemaManager<'_>, statements: &[&str]) -> Result<(), DbErr> {
    for sql in statements {
        manager.get_connection().execute_unprepared(sql).await?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        match manager.get_database_backend() {
            DbBackend::Postgres => run(manager, UP_POSTGRES).await,
            _ => run(manager, UP_SQLITE).await,
        }
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        match manager.get_database_backend() {
            DbBackend::Postgres => run(manager, DOWN_POSTGRES).await,
            _ => run(manager, DOWN_SQLITE).await,
        }
    }
}
"#,
    );
    out
}

#[cfg(test)]
mod tests {
    use migration::{AppSchema, ModelTable, SchemaModel};
    use sea_orm::sea_query::{Alias, ColumnDef, Table};
    use sea_orm::DatabaseBackend;
    use time::macros::datetime;

    use super::{
        register_module, registered_ids, render_script, revision_id, slugify, SchemaDiff,
    };
    use crate::infra::db::introspect::LiveSchema;

    struct WithAudit;

    impl SchemaModel for WithAudit {
        fn tables(&self) -> Vec<ModelTable> {
            let mut tables = AppSchema.tables();
            tables.push(ModelTable::new(
                "audit_log",
                Table::create()
                    .table(Alias::new("audit_log"))
                    .col(ColumnDef::new(Alias::new("id")).integer().not_null().primary_key())
                    .col(ColumnDef::new(Alias::new("entry")).text().not_null())
                    .to_owned(),
            ));
            tables
        }
    }

    fn app_schema_live() -> LiveSchema {
        LiveSchema::from_tables(vec![
            ("releases", vec!["id", "version", "deployed_at", "notes"]),
            ("settings", vec!["key", "value", "updated_at"]),
        ])
    }

    #[test]
    fn test_diff_empty_when_in_sync() {
        let diff = SchemaDiff::between(&app_schema_live(), &AppSchema);
        assert!(diff.is_empty());
        let sql = diff.render(DatabaseBackend::Sqlite);
        assert!(sql.up.is_empty());
        assert!(sql.down.is_empty());
    }

    #[test]
    fn test_diff_detects_new_table() {
        let diff = SchemaDiff::between(&app_schema_live(), &WithAudit);
        assert_eq!(diff.create_tables.len(), 1);
        assert_eq!(diff.create_tables[0].name, "audit_log");
        assert!(diff.drop_tables.is_empty());
        assert_eq!(diff.irreversible_ops(), 0);

        let sql = diff.render(DatabaseBackend::Postgres);
        assert_eq!(sql.up.len(), 1);
        assert!(sql.up[0].starts_with("CREATE TABLE \"audit_log\""));
        assert_eq!(sql.down, vec!["DROP TABLE \"audit_log\"".to_string()]);
    }

    #[test]
    fn test_diff_detects_column_changes() {
        let live = LiveSchema::from_tables(vec![
            ("releases", vec!["id", "version", "deployed_at", "legacy_flag"]),
            ("settings", vec!["key", "value", "updated_at"]),
            ("old_cache", vec!["k"]),
        ]);
        let diff = SchemaDiff::between(&live, &AppSchema);

        assert!(diff.create_tables.is_empty());
        assert_eq!(diff.add_columns.len(), 1);
        assert_eq!(diff.add_columns[0].0, "releases");
        assert_eq!(diff.add_columns[0].1.get_column_name(), "notes");
        assert_eq!(
            diff.drop_columns,
            vec![("releases".to_string(), "legacy_flag".to_string())]
        );
        assert_eq!(diff.drop_tables, vec!["old_cache".to_string()]);
        assert_eq!(diff.irreversible_ops(), 2);

        let sql = diff.render(DatabaseBackend::Sqlite);
        assert_eq!(sql.up.len(), 3);
        assert_eq!(sql.down.len(), 1);
        assert!(sql.down[0].contains("DROP COLUMN \"notes\""));
    }

    #[test]
    fn test_revision_id_format() {
        let now = datetime!(2026-10-17 09:05:03 UTC);
        assert_eq!(
            revision_id(now, "Add audit log!").unwrap(),
            "m20261017_090503_add_audit_log"
        );
        assert_eq!(
            revision_id(now, "").unwrap(),
            "m20261017_090503_autogenerated"
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Add  users--table "), "add_users_table");
        assert_eq!(slugify("***"), "autogenerated");
        assert_eq!(slugify("ÄÖ settings"), "settings");
    }

    #[test]
    fn test_register_module_multiline() {
        let lib = "pub use sea_orm_migration::prelude::*;\n\
                   \n\
                   mod m20250823_000001_init; // keep filename + module name in sync\n\
                   \n\
                   pub struct Migrator;\n\
                   \n\
                   impl MigratorTrait for Migrator {\n\
                   \x20   fn migrations() -> Vec<Box<dyn MigrationTrait>> {\n\
                   \x20       vec![\n\
                   \x20           Box::new(m20250823_000001_init::Migration),\n\
                   \x20       ]\n\
                   \x20   }\n\
                   }\n";

        let out = register_module(lib, "m20261017_090503_add_audit_log").unwrap();
        assert!(out.contains(
            "mod m20250823_000001_init; // keep filename + module name in sync\nmod m20261017_090503_add_audit_log;\n"
        ));
        assert!(out.contains(
            "            Box::new(m20250823_000001_init::Migration),\n            Box::new(m20261017_090503_add_audit_log::Migration),\n"
        ));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_register_module_single_line() {
        let lib = "mod m1_init;\nfn migrations() { vec![Box::new(m1_init::Migration)] }";
        let out = register_module(lib, "m2_next").unwrap();
        assert_eq!(
            out,
            "mod m1_init;\nmod m2_next;\nfn migrations() { vec![Box::new(m1_init::Migration), Box::new(m2_next::Migration)] }"
        );
    }

    #[test]
    fn test_registered_ids_follow_chain_order() {
        let lib = "mod m1_init;\nmod m2_next;\nfn migrations() {\n    vec![\n        Box::new(m1_init::Migration),\n        Box::new(m2_next::Migration),\n    ]\n}\n";
        assert_eq!(registered_ids(lib), vec!["m1_init", "m2_next"]);

        let registered = register_module(lib, "m3_last").unwrap();
        assert_eq!(registered_ids(&registered), vec!["m1_init", "m2_next", "m3_last"]);

        assert!(registered_ids("pub struct Migrator;\n").is_empty());
    }

    #[test]
    fn test_register_module_requires_existing_entry() {
        assert!(register_module("pub struct Migrator;\n", "m2_next").is_err());
    }

    #[test]
    fn test_render_script_headers() {
        let diff = SchemaDiff::between(&app_schema_live(), &WithAudit);
        let script = render_script(
            "m20261017_090503_add_audit_log",
            Some("m20250823_000001_init"),
            "add audit log",
            &diff,
        );
        assert!(script.starts_with("//! Revision ID: m20261017_090503_add_audit_log\n"));
        assert!(script.contains("//! Revises: m20250823_000001_init\n"));
        assert!(script.contains("#[derive(DeriveMigrationName)]"));
        assert!(script.contains("const UP_POSTGRES: &[&str] = &[\n    r##\"CREATE TABLE \"audit_log\""));
        assert!(script.contains("const DOWN_SQLITE: &[&str] = &[\n    r##\"DROP TABLE \"audit_log\"\"##,\n];"));
    }
}
