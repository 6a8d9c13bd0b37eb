//! Materialization of decoded catalogs into SQLite.
//!
//! Tables:
//! - `catalog_properties`: one row (id = 1) with the header and owner data
//! - `catalog_custom_field`: custom field definitions, unique by tag
//! - `catalog_movie`: one row per record, keyed by the record's stable index,
//!   with a column per scalar field of the record layout
//! - `catalog_movie_custom_field`: custom field values per record
//! - `catalog_movie_list_value`: text list values per record, in order
//! - `catalog_movie_<group>`: entries of each group field per record, in
//!   order (`catalog_movie_extras` for the AMC extras)
//!
//! Every write is an upsert keyed by the record index, so exporting the same
//! catalog twice leaves the database unchanged.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use crate::amc::format::layout::{custom_field_tag, RecordLayout};
use crate::amc::types::error::{AmcError, Result};
use crate::amc::types::layout::{BlobKind, FieldKind, FieldSpec};
use crate::amc::types::models::{CatalogHeader, DecodedCatalog, FieldValue, Fields, MovieRecord};
use crate::export::images::{group_field_path, image_extension, image_file_name};

pub const SCHEMA_VERSION: i64 = 1;

/// Default number of records per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default largest blob stored inline.
pub const DEFAULT_INLINE_MAX: usize = 16 * 1024 * 1024;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS catalog_schema_version (version INTEGER PRIMARY KEY);",
    "CREATE TABLE IF NOT EXISTS catalog_properties (\
        id INTEGER PRIMARY KEY CHECK (id = 1),\
        version INTEGER NOT NULL,\
        signature TEXT NOT NULL,\
        encoding TEXT NOT NULL,\
        owner_name TEXT,\
        owner_mail TEXT,\
        owner_site TEXT,\
        description TEXT,\
        column_settings TEXT,\
        gui_properties TEXT\
    );",
    "CREATE TABLE IF NOT EXISTS catalog_custom_field (\
        id INTEGER PRIMARY KEY AUTOINCREMENT,\
        tag TEXT NOT NULL UNIQUE,\
        name TEXT,\
        type TEXT,\
        default_value TEXT,\
        multi_values INTEGER,\
        excluded_in_scripts INTEGER\
    );",
    "CREATE TABLE IF NOT EXISTS catalog_movie_custom_field (\
        record_index INTEGER NOT NULL REFERENCES catalog_movie(record_index) ON DELETE CASCADE,\
        tag TEXT NOT NULL,\
        value TEXT,\
        PRIMARY KEY (record_index, tag)\
    );",
    "CREATE TABLE IF NOT EXISTS catalog_movie_list_value (\
        record_index INTEGER NOT NULL REFERENCES catalog_movie(record_index) ON DELETE CASCADE,\
        field TEXT NOT NULL,\
        position INTEGER NOT NULL,\
        value TEXT,\
        PRIMARY KEY (record_index, field, position)\
    );",
    "CREATE INDEX IF NOT EXISTS idx_catalog_movie_custom_field_tag ON catalog_movie_custom_field(tag);",
];

/// How blob payloads end up in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobStorage {
    /// Store the bytes themselves, up to `max_len`. Larger payloads only
    /// get their size recorded.
    Inline { max_len: usize },
    /// Store the path the image extractor writes the payload to.
    Reference { image_dir: PathBuf },
}

impl Default for BlobStorage {
    fn default() -> Self {
        BlobStorage::Inline {
            max_len: DEFAULT_INLINE_MAX,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub batch_size: usize,
    pub blob_storage: BlobStorage,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            blob_storage: BlobStorage::default(),
        }
    }
}

/// Counts of what an export wrote, plus the records that failed.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub rows: usize,
    pub custom_values: usize,
    pub list_values: usize,
    /// Group entries, i.e. extras.
    pub extras: usize,
    pub failures: Vec<AmcError>,
}

impl ExportReport {
    pub fn merge(&mut self, other: ExportReport) {
        self.rows += other.rows;
        self.custom_values += other.custom_values;
        self.list_values += other.list_values;
        self.extras += other.extras;
        self.failures.extend(other.failures);
    }
}

#[derive(Debug, Clone, Copy)]
enum ColumnSource {
    Value,
    BlobData,
    BlobSize,
    BlobFile { path_field: &'static str },
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    field: Cow<'static, str>,
    kind: FieldKind,
    source: ColumnSource,
}

impl Column {
    fn new(name: String, spec: &FieldSpec, source: ColumnSource) -> Self {
        Self {
            name,
            field: spec.name.clone(),
            kind: spec.kind,
            source,
        }
    }

    fn sql_type(&self) -> &'static str {
        match (self.source, self.kind) {
            (ColumnSource::Value, FieldKind::Text(_)) => "TEXT",
            (ColumnSource::Value, _) => "INTEGER",
            (ColumnSource::BlobData, _) => "BLOB",
            (ColumnSource::BlobSize, _) => "INTEGER",
            (ColumnSource::BlobFile { .. }, _) => "TEXT",
        }
    }
}

/// Scalar and blob fields become columns; custom field values, lists and
/// groups are stored in child tables.
fn columns_for(specs: &[FieldSpec]) -> Vec<Column> {
    let mut columns = Vec::new();
    for spec in specs {
        if custom_field_tag(&spec.name).is_some() {
            continue;
        }
        match spec.kind {
            FieldKind::Text(_) | FieldKind::Integer(_) | FieldKind::Boolean(_) => {
                columns.push(Column::new(spec.name.to_string(), spec, ColumnSource::Value));
            }
            FieldKind::Blob(kind) => {
                columns.push(Column::new(spec.name.to_string(), spec, ColumnSource::BlobData));
                columns.push(Column::new(
                    format!("{}_size", spec.name),
                    spec,
                    ColumnSource::BlobSize,
                ));
                if let BlobKind::Image { path_field } = kind {
                    columns.push(Column::new(
                        format!("{}_file", spec.name),
                        spec,
                        ColumnSource::BlobFile { path_field },
                    ));
                }
            }
            FieldKind::TextList(_) | FieldKind::Group(_) => {}
        }
    }
    columns
}

fn create_table_sql(table: &str, keys: &str, columns: &[Column], tail: &str) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS \"{}\" ({}", table, keys);
    for column in columns {
        sql.push_str(&format!(", \"{}\" {}", column.name, column.sql_type()));
    }
    sql.push_str(tail);
    sql.push_str(");");
    sql
}

/// `INSERT` of `keys` followed by `columns`, updating `columns` when a row
/// with the same `conflict` key exists.
fn upsert_sql(table: &str, keys: &[&str], conflict: &str, columns: &[Column]) -> String {
    let names: Vec<String> = keys
        .iter()
        .map(|k| k.to_string())
        .chain(columns.iter().map(|c| format!("\"{}\"", c.name)))
        .collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = keys
        .iter()
        .filter(|k| **k != conflict)
        .map(|k| format!("{0} = excluded.{0}", k))
        .chain(
            columns
                .iter()
                .map(|c| format!("\"{0}\" = excluded.\"{0}\"", c.name)),
        )
        .collect();
    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {};",
        table,
        names.join(", "),
        placeholders.join(", "),
        conflict,
        updates.join(", ")
    )
}

fn insert_sql(table: &str, keys: &[&str], columns: &[Column]) -> String {
    let names: Vec<String> = keys
        .iter()
        .map(|k| k.to_string())
        .chain(columns.iter().map(|c| format!("\"{}\"", c.name)))
        .collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({});",
        table,
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Child table holding the entries of one group field.
#[derive(Debug, Clone)]
struct GroupTable {
    field: Cow<'static, str>,
    table: String,
    columns: Vec<Column>,
    insert: String,
}

impl GroupTable {
    fn new(spec: &FieldSpec, entry: &[FieldSpec]) -> Self {
        let table = format!("catalog_movie_{}", spec.name);
        let columns = columns_for(entry);
        let insert = insert_sql(&table, &["record_index", "position"], &columns);
        Self {
            field: spec.name.clone(),
            table,
            columns,
            insert,
        }
    }
}

/// Writes decoded records into a SQLite database.
///
/// Columns follow the [`RecordLayout`] the records were decoded with. The
/// connection is shared through a mutex; every method holds the lock for the
/// duration of one transaction.
#[derive(Debug)]
pub struct DatabaseExporter {
    conn: Arc<Mutex<Connection>>,
    options: ExportOptions,
    movie_columns: Vec<Column>,
    movie_upsert: String,
    groups: Vec<GroupTable>,
}

impl DatabaseExporter {
    /// Opens (or creates) a database file and prepares the schema for `layout`.
    pub fn open(
        path: impl AsRef<Path>,
        layout: &RecordLayout,
        options: ExportOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        info!("Exporting catalog to SQLite: {}", path.display());
        let conn = Connection::open(path).map_err(|e| AmcError::export("database", e))?;
        Self::new(Arc::new(Mutex::new(conn)), layout, options)
    }

    /// Uses an existing connection and prepares the schema for `layout`.
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        layout: &RecordLayout,
        options: ExportOptions,
    ) -> Result<Self> {
        let movie_columns = columns_for(layout.fields());
        let movie_upsert = upsert_sql(
            "catalog_movie",
            &["record_index", "record_offset"],
            "record_index",
            &movie_columns,
        );
        let groups = layout
            .fields()
            .iter()
            .filter_map(|spec| match spec.kind {
                FieldKind::Group(entry) => Some(GroupTable::new(spec, entry)),
                _ => None,
            })
            .collect();

        let exporter = Self {
            conn,
            options,
            movie_columns,
            movie_upsert,
            groups,
        };
        exporter.bootstrap_schema()?;
        Ok(exporter)
    }

    pub fn connection(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    fn bootstrap_schema(&self) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| AmcError::LockPoisoned)?;
        let tx = conn
            .transaction()
            .map_err(|e| AmcError::export("schema", e))?;

        for statement in SCHEMA {
            tx.execute_batch(statement)
                .map_err(|e| AmcError::export("schema", e))?;
        }
        tx.execute_batch(&create_table_sql(
            "catalog_movie",
            "record_index INTEGER PRIMARY KEY, record_offset INTEGER NOT NULL",
            &self.movie_columns,
            "",
        ))
        .map_err(|e| AmcError::export("schema", e))?;
        for group in &self.groups {
            tx.execute_batch(&create_table_sql(
                &group.table,
                "record_index INTEGER NOT NULL REFERENCES catalog_movie(record_index) ON DELETE CASCADE, position INTEGER NOT NULL",
                &group.columns,
                ", PRIMARY KEY (record_index, position)",
            ))
            .map_err(|e| AmcError::export("schema", e))?;
        }

        let version = tx
            .query_row("SELECT MAX(version) FROM catalog_schema_version;", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .map_err(|e| AmcError::export("schema", e))?;
        match version {
            None => {
                tx.execute(
                    "INSERT INTO catalog_schema_version(version) VALUES (?1);",
                    [SCHEMA_VERSION],
                )
                .map_err(|e| AmcError::export("schema", e))?;
            }
            Some(v) if v != SCHEMA_VERSION => {
                return Err(AmcError::InvalidFormat(format!(
                    "Database schema version {} is not supported (expected {})",
                    v, SCHEMA_VERSION
                )));
            }
            Some(_) => {}
        }

        tx.commit().map_err(|e| AmcError::export("schema", e))?;
        debug!(
            "Database schema version {} ready ({} movie columns, {} group tables)",
            SCHEMA_VERSION,
            self.movie_columns.len(),
            self.groups.len()
        );
        Ok(())
    }

    /// Writes the catalog properties and custom field definitions.
    pub fn prepare(&self, header: &CatalogHeader) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| AmcError::LockPoisoned)?;
        let tx = conn
            .transaction()
            .map_err(|e| AmcError::export("catalog properties", e))?;

        let props = &header.properties;
        tx.execute(
            "INSERT INTO catalog_properties (id, version, signature, encoding, owner_name, owner_mail, owner_site, description, column_settings, gui_properties) \
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(id) DO UPDATE SET version = excluded.version, signature = excluded.signature, encoding = excluded.encoding, \
             owner_name = excluded.owner_name, owner_mail = excluded.owner_mail, owner_site = excluded.owner_site, \
             description = excluded.description, column_settings = excluded.column_settings, gui_properties = excluded.gui_properties;",
            params![
                header.version,
                header.signature,
                header.encoding.name(),
                props.owner_name,
                props.owner_mail,
                props.owner_site,
                props.description,
                header.column_settings,
                header.gui_properties,
            ],
        )
        .map_err(|e| AmcError::export("catalog properties", e))?;

        for def in &header.custom_fields {
            tx.execute(
                "INSERT INTO catalog_custom_field (tag, name, type, default_value, multi_values, excluded_in_scripts) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(tag) DO UPDATE SET name = excluded.name, type = excluded.type, default_value = excluded.default_value, \
                 multi_values = excluded.multi_values, excluded_in_scripts = excluded.excluded_in_scripts;",
                params![
                    def.tag,
                    def.name,
                    def.field_type,
                    def.default_value,
                    def.multi_values,
                    def.excluded_in_scripts,
                ],
            )
            .map_err(|e| AmcError::export(format!("custom field '{}'", def.tag), e))?;
        }

        tx.commit()
            .map_err(|e| AmcError::export("catalog properties", e))?;
        debug!(
            "Catalog properties and {} custom field definitions written",
            header.custom_fields.len()
        );
        Ok(())
    }

    /// Writes `records` in one transaction.
    ///
    /// Each record runs in its own savepoint: a record whose statements fail
    /// is rolled back alone and reported in [`ExportReport::failures`].
    pub fn export_batch(&self, records: &[MovieRecord]) -> Result<ExportReport> {
        let mut report = ExportReport::default();
        if records.is_empty() {
            return Ok(report);
        }

        let mut conn = self.conn.lock().map_err(|_| AmcError::LockPoisoned)?;
        let mut tx = conn
            .transaction()
            .map_err(|e| AmcError::export("batch", e))?;

        for record in records {
            let sp = tx
                .savepoint()
                .map_err(|e| AmcError::export("batch", e))?;
            match self.write_record(&sp, record) {
                Ok(counts) => {
                    sp.commit()
                        .map_err(|e| AmcError::export(format!("record #{}", record.index), e))?;
                    report.rows += 1;
                    report.custom_values += counts.custom_values;
                    report.list_values += counts.list_values;
                    report.extras += counts.group_entries;
                }
                Err(e) => {
                    warn!("Record #{} not exported: {}", record.index, e);
                    report.failures.push(e);
                }
            }
        }

        tx.commit().map_err(|e| AmcError::export("batch", e))?;
        debug!(
            "Committed batch of {} records ({} failed)",
            report.rows,
            report.failures.len()
        );
        Ok(report)
    }

    /// Writes the header and every record, committing every `batch_size` records.
    pub fn export_catalog(&self, catalog: &DecodedCatalog) -> Result<ExportReport> {
        self.prepare(&catalog.header)?;
        let mut report = ExportReport::default();
        for batch in catalog.records.chunks(self.options.batch_size.max(1)) {
            report.merge(self.export_batch(batch)?);
        }
        info!(
            "Database export complete: {} movies, {} custom field values, {} extras, {} failed",
            report.rows,
            report.custom_values,
            report.extras,
            report.failures.len()
        );
        Ok(report)
    }

    fn write_record(&self, conn: &Connection, record: &MovieRecord) -> Result<RecordCounts> {
        let what = || format!("record #{}", record.index);
        let mut counts = RecordCounts::default();

        let mut values = vec![
            Value::Integer(record.index as i64),
            Value::Integer(record.offset as i64),
        ];
        values.extend(self.column_values(
            &self.movie_columns,
            &record.fields,
            |field| field.to_string(),
            record.index,
        ));
        conn.prepare_cached(&self.movie_upsert)
            .and_then(|mut stmt| stmt.execute(params_from_iter(values)))
            .map_err(|e| AmcError::export(what(), e))?;

        let index = record.index as i64;
        let child_tables = ["catalog_movie_custom_field", "catalog_movie_list_value"]
            .into_iter()
            .chain(self.groups.iter().map(|g| g.table.as_str()));
        for table in child_tables {
            conn.execute(&format!("DELETE FROM \"{}\" WHERE record_index = ?1;", table), [index])
                .map_err(|e| AmcError::export(what(), e))?;
        }

        let mut custom_insert = conn
            .prepare_cached(
                "INSERT INTO catalog_movie_custom_field (record_index, tag, value) VALUES (?1, ?2, ?3);",
            )
            .map_err(|e| AmcError::export(what(), e))?;
        let mut list_insert = conn
            .prepare_cached(
                "INSERT INTO catalog_movie_list_value (record_index, field, position, value) VALUES (?1, ?2, ?3, ?4);",
            )
            .map_err(|e| AmcError::export(what(), e))?;
        for (name, value) in record.fields.iter() {
            match value {
                FieldValue::Text(text) => {
                    if let Some(tag) = custom_field_tag(name) {
                        custom_insert
                            .execute(params![index, tag, text])
                            .map_err(|e| AmcError::export(what(), e))?;
                        counts.custom_values += 1;
                    }
                }
                FieldValue::TextList(items) => {
                    for (i, item) in items.iter().enumerate() {
                        list_insert
                            .execute(params![index, name, (i + 1) as i64, item])
                            .map_err(|e| AmcError::export(what(), e))?;
                        counts.list_values += 1;
                    }
                }
                _ => {}
            }
        }

        for group in &self.groups {
            let Some(entries) = record.fields.group(&group.field) else {
                continue;
            };
            let mut insert = conn
                .prepare_cached(&group.insert)
                .map_err(|e| AmcError::export(what(), e))?;
            for (i, entry) in entries.iter().enumerate() {
                let position = i + 1;
                let mut values = vec![Value::Integer(index), Value::Integer(position as i64)];
                values.extend(self.column_values(
                    &group.columns,
                    entry,
                    |field| group_field_path(&group.field, position, field),
                    record.index,
                ));
                insert
                    .execute(params_from_iter(values))
                    .map_err(|e| AmcError::export(what(), e))?;
                counts.group_entries += 1;
            }
        }

        Ok(counts)
    }

    /// Values for `columns` in order; absent fields are NULL.
    fn column_values(
        &self,
        columns: &[Column],
        fields: &Fields,
        field_path: impl Fn(&str) -> String,
        index: usize,
    ) -> Vec<Value> {
        columns
            .iter()
            .map(|column| match (column.source, fields.get(&column.field)) {
                (ColumnSource::Value, Some(FieldValue::Text(text))) => Value::Text(text.clone()),
                (ColumnSource::Value, Some(FieldValue::Integer(i))) => Value::Integer(*i),
                (ColumnSource::Value, Some(FieldValue::Boolean(b))) => {
                    Value::Integer(i64::from(*b))
                }
                (ColumnSource::BlobData, Some(FieldValue::Blob(blob))) => {
                    match &self.options.blob_storage {
                        BlobStorage::Inline { max_len }
                            if !blob.is_empty() && blob.len() <= *max_len =>
                        {
                            Value::Blob(blob.data().to_vec())
                        }
                        _ => Value::Null,
                    }
                }
                (ColumnSource::BlobSize, Some(FieldValue::Blob(blob))) => {
                    Value::Integer(blob.declared_len() as i64)
                }
                (ColumnSource::BlobFile { path_field }, Some(FieldValue::Blob(blob))) => {
                    match &self.options.blob_storage {
                        BlobStorage::Reference { image_dir } if !blob.is_empty() => {
                            let name = image_file_name(
                                index,
                                &field_path(&column.field),
                                &image_extension(fields, path_field),
                            );
                            Value::Text(image_dir.join(name).to_string_lossy().into_owned())
                        }
                        _ => Value::Null,
                    }
                }
                _ => Value::Null,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct RecordCounts {
    custom_values: usize,
    list_values: usize,
    group_entries: usize,
}
