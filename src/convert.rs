//! Form to table conversion, with a PostgreSQL `CREATE TABLE` for the result.

use serde_json::{json, Value};

use crate::dsl::model::{ColumnType, FieldType, FormDefinition, FormField, TableDefinition};
use crate::dsl::validator::validate_table;
use crate::error::SchemaError;

const FALLBACK_TABLE_NAME: &str = "converted_form";

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub table: TableDefinition,
    pub sql: String,
}

/// One column per field, in field order. The table is validated like any
/// other definition before the DDL is rendered from it.
pub fn convert_form(form: &FormDefinition) -> Result<Conversion, SchemaError> {
    let columns: Vec<Value> = form
        .fields
        .iter()
        .map(|field| {
            let mut column = json!({
                "name": column_name(&field.name),
                "type": column_type(field).as_str(),
            });
            if !field.label.is_empty() {
                column["description"] = Value::String(field.label.clone());
            }
            column
        })
        .collect();
    let table = validate_table(&json!({"title": form.title, "columns": columns}))?;
    let sql = create_table_sql(&table_name(&form.title), &table, &form.fields);
    Ok(Conversion { table, sql })
}

/// Lowercased, with anything outside `[a-z0-9_]` replaced by `_`.
pub fn sql_identifier(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' { c } else { '_' })
        .collect()
}

fn column_name(field_name: &str) -> String {
    let name = sql_identifier(field_name);
    match name.as_str() {
        // `id` is the generated primary key
        "id" => "field_id".to_string(),
        _ if name.starts_with(|c: char| c.is_ascii_digit()) => format!("c_{name}"),
        _ => name,
    }
}

fn table_name(title: &str) -> String {
    let name = sql_identifier(title);
    if name.chars().all(|c| c == '_') {
        FALLBACK_TABLE_NAME.to_string()
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("t_{name}")
    } else {
        name
    }
}

fn column_type(field: &FormField) -> ColumnType {
    match field.field_type {
        FieldType::Number | FieldType::Slider => ColumnType::Number,
        FieldType::Date | FieldType::Time | FieldType::DateTime => ColumnType::Date,
        FieldType::Switch => ColumnType::Boolean,
        // a checkbox with options is a multi-choice, not a flag
        FieldType::Checkbox if field.options.as_ref().map_or(true, Vec::is_empty) => ColumnType::Boolean,
        _ => ColumnType::String,
    }
}

fn sql_type(field: &FormField, column: ColumnType) -> &'static str {
    if field.field_type == FieldType::Email {
        return "VARCHAR(255)";
    }
    match column {
        ColumnType::String => "TEXT",
        ColumnType::Number => "INTEGER",
        ColumnType::Date => "DATE",
        ColumnType::Boolean => "BOOLEAN",
    }
}

fn create_table_sql(name: &str, table: &TableDefinition, fields: &[FormField]) -> String {
    let mut lines = vec!["  id SERIAL PRIMARY KEY".to_string()];
    for (column, field) in table.columns.iter().zip(fields) {
        let mut line = format!("  {} {}", column.name, sql_type(field, column.column_type));
        if field.required {
            line.push_str(" NOT NULL");
        }
        lines.push(line);
    }
    format!("CREATE TABLE {name} (\n{}\n);", lines.join(",\n"))
}
