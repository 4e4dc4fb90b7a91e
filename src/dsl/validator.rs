use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::dsl::model::{
    ColumnType, Definition, FieldType, FieldValidation, FormDefinition, FormField, Limit,
    TableColumn, TableDefinition, TargetKind, DEFAULT_LAYOUT,
};
use crate::error::SchemaError;

type Object = Map<String, Value>;

pub fn validate(kind: TargetKind, value: &Value) -> Result<Definition, SchemaError> {
    match kind {
        TargetKind::Form => validate_form(value).map(Definition::Form),
        TargetKind::Table => validate_table(value).map(Definition::Table),
    }
}

/// Turns a parsed model response into a conforming form.
///
/// Field names are camelCased and made unique (`name`, `name_1`, ...),
/// choice controls get an option list, and every field carries a validation
/// block. Running it again on its own output changes nothing.
pub fn validate_form(value: &Value) -> Result<FormDefinition, SchemaError> {
    let root = root_object(value)?;
    let title = required_title(root, value)?;
    let layout = match root.get("layout") {
        None | Some(Value::Null) => DEFAULT_LAYOUT.to_string(),
        Some(Value::String(layout)) if !layout.trim().is_empty() => layout.trim().to_string(),
        Some(Value::String(_)) => DEFAULT_LAYOUT.to_string(),
        Some(_) => return Err(invalid_schema("layout", "must be a string", value)),
    };
    let items = required_items(root, "fields", value)?;

    let mut names = NameRegistry::default();
    let fields = items
        .iter()
        .enumerate()
        .map(|(index, item)| validate_field(index, item, &mut names))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FormDefinition { title, layout, fields })
}

pub fn validate_table(value: &Value) -> Result<TableDefinition, SchemaError> {
    let root = root_object(value)?;
    let title = required_title(root, value)?;
    let items = required_items(root, "columns", value)?;

    let mut names = NameRegistry::default();
    let (columns, source_keys): (Vec<_>, Vec<_>) = items
        .iter()
        .enumerate()
        .map(|(index, item)| validate_column(index, item, &mut names))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .unzip();
    let renames = sample_key_renames(&columns, &source_keys);

    let sample_data = match root.get("sampleData") {
        None | Some(Value::Null) => None,
        Some(Value::Array(rows)) => Some(
            rows.iter()
                .map(|row| {
                    row.as_object()
                        .map(|row| rename_keys(row, &renames))
                        .ok_or_else(|| invalid_schema("sampleData", "rows must be JSON objects", value))
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(_) => return Err(invalid_schema("sampleData", "must be an array", value)),
    };

    Ok(TableDefinition {
        title,
        columns,
        sample_data,
    })
}

fn validate_field(index: usize, item: &Value, names: &mut NameRegistry) -> Result<FormField, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidField {
        index,
        reason,
        raw_json: item.to_string(),
    };
    let obj = item
        .as_object()
        .ok_or_else(|| invalid("must be a JSON object".into()))?;

    let raw_name = optional_string(obj, "name").map_err(invalid)?;
    let label = optional_string(obj, "label").map_err(invalid)?;
    let type_name = optional_string(obj, "type")
        .map_err(invalid)?
        .ok_or_else(|| invalid("`type` is missing".into()))?;
    let field_type = FieldType::parse_loose(&type_name)
        .ok_or_else(|| invalid(format!("unsupported field type `{type_name}`")))?;

    let source_name = raw_name
        .as_deref()
        .or(label.as_deref())
        .ok_or_else(|| invalid("`name` and `label` are both missing".into()))?;
    let normalized = to_camel_case(source_name);
    if normalized.is_empty() {
        return Err(invalid(format!("name `{source_name}` has no letters or digits")));
    }
    let name = names.claim(normalized);
    let label = label.unwrap_or_else(|| humanize(&name));

    let required = optional_bool(obj, "required").map_err(invalid)?.unwrap_or(false);
    let options = match obj.get("options") {
        None | Some(Value::Null) => field_type.is_choice().then(Vec::new),
        Some(Value::Array(entries)) => Some(
            entries
                .iter()
                .map(option_text)
                .collect::<Result<Vec<_>, _>>()
                .map_err(invalid)?,
        ),
        Some(_) => return Err(invalid("`options` must be an array".into())),
    };
    let validation = field_validation(obj.get("validation"), required).map_err(invalid)?;

    Ok(FormField {
        name,
        label,
        field_type,
        placeholder: optional_string(obj, "placeholder").map_err(invalid)?,
        required,
        options,
        validation,
        description: optional_string(obj, "description").map_err(invalid)?,
        default_value: obj.get("defaultValue").filter(|v| !v.is_null()).cloned(),
    })
}

/// Row keys to move onto a column's final name: the source key must differ
/// from it and must not be another column's final name. A duplicate column
/// shares its key with the column that kept the name, so the value stays there.
fn sample_key_renames<'a>(columns: &'a [TableColumn], source_keys: &'a [String]) -> Vec<(&'a str, &'a str)> {
    columns
        .iter()
        .zip(source_keys)
        .filter(|(column, key)| column.name != **key && !columns.iter().any(|c| c.name == **key))
        .map(|(column, key)| (key.as_str(), column.name.as_str()))
        .collect()
}

fn rename_keys(row: &Object, renames: &[(&str, &str)]) -> Object {
    let mut row = row.clone();
    for (from, to) in renames {
        if row.contains_key(*to) {
            continue;
        }
        if let Some(cell) = row.remove(*from) {
            row.insert((*to).to_string(), cell);
        }
    }
    row
}

/// The column plus the row key the model used for it.
fn validate_column(
    index: usize,
    item: &Value,
    names: &mut NameRegistry,
) -> Result<(TableColumn, String), SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidField {
        index,
        reason,
        raw_json: item.to_string(),
    };
    let obj = item
        .as_object()
        .ok_or_else(|| invalid("must be a JSON object".into()))?;

    let (name, key) = match optional_string(obj, "name").map_err(invalid)? {
        Some(name) => (name, "name"),
        None => optional_string(obj, "label")
            .map_err(invalid)?
            .map(|label| (label, "label"))
            .ok_or_else(|| invalid("`name` is missing".into()))?,
    };
    let source_key = obj.get(key).and_then(Value::as_str).unwrap_or(name.as_str()).to_string();
    let type_name = optional_string(obj, "type")
        .map_err(invalid)?
        .ok_or_else(|| invalid("`type` is missing".into()))?;
    let column_type = ColumnType::parse_loose(&type_name)
        .ok_or_else(|| invalid(format!("unsupported column type `{type_name}`")))?;

    let column = TableColumn {
        name: names.claim(name),
        column_type,
        description: optional_string(obj, "description").map_err(invalid)?,
    };
    Ok((column, source_key))
}

fn field_validation(value: Option<&Value>, required: bool) -> Result<FieldValidation, String> {
    let obj = match value {
        None | Some(Value::Null) => return Ok(FieldValidation::required(required)),
        Some(Value::String(pattern)) => {
            return Ok(FieldValidation {
                pattern: (!pattern.is_empty()).then(|| pattern.clone()),
                ..FieldValidation::required(required)
            })
        }
        Some(Value::Object(obj)) => obj,
        Some(_) => return Err("`validation` must be an object".into()),
    };

    let pattern = match obj.get("pattern") {
        None | Some(Value::Null) => None,
        Some(Value::String(pattern)) => (!pattern.is_empty()).then(|| pattern.clone()),
        Some(_) => return Err("`validation.pattern` must be a string".into()),
    };

    Ok(FieldValidation {
        required: optional_bool(obj, "required")?.unwrap_or(required),
        pattern,
        min: limit(obj, "min")?,
        max: limit(obj, "max")?,
        min_length: length(obj, &["minLength", "min_length"])?,
        max_length: length(obj, &["maxLength", "max_length"])?,
    })
}

fn limit(obj: &Object, key: &str) -> Result<Option<Limit>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(|n| Some(Limit::Number(n)))
            .ok_or_else(|| format!("`validation.{key}` is out of range")),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => Ok(Some(Limit::Text(text.trim().to_string()))),
        Some(_) => Err(format!("`validation.{key}` must be a number or string")),
    }
}

fn length(obj: &Object, keys: &[&str]) -> Result<Option<u64>, String> {
    let Some((key, value)) = keys.iter().find_map(|k| obj.get(*k).map(|v| (*k, v))) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| format!("`validation.{key}` must be a non-negative integer")),
        Value::String(text) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| format!("`validation.{key}` must be a non-negative integer")),
        _ => Err(format!("`validation.{key}` must be a non-negative integer")),
    }
}

fn option_text(entry: &Value) -> Result<String, String> {
    match entry {
        Value::String(text) => Ok(text.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Object(obj) => ["label", "value"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .map(|text| text.trim().to_string())
            .ok_or_else(|| format!("option {entry} has no `label` or `value`")),
        _ => Err(format!("option {entry} must be a string")),
    }
}

fn root_object(value: &Value) -> Result<&Object, SchemaError> {
    value
        .as_object()
        .ok_or_else(|| invalid_schema("<root>", "must be a JSON object", value))
}

fn required_title(root: &Object, value: &Value) -> Result<String, SchemaError> {
    match root.get("title") {
        None | Some(Value::Null) => Err(invalid_schema("title", "is missing", value)),
        Some(Value::String(title)) if !title.trim().is_empty() => Ok(title.trim().to_string()),
        Some(Value::String(_)) => Err(invalid_schema("title", "must not be empty", value)),
        Some(_) => Err(invalid_schema("title", "must be a string", value)),
    }
}

fn required_items<'a>(root: &'a Object, key: &str, value: &Value) -> Result<&'a Vec<Value>, SchemaError> {
    match root.get(key) {
        None | Some(Value::Null) => Err(invalid_schema(key, "is missing", value)),
        Some(Value::Array(items)) if !items.is_empty() => Ok(items),
        Some(Value::Array(_)) => Err(invalid_schema(key, "must contain at least one entry", value)),
        Some(_) => Err(invalid_schema(key, "must be an array", value)),
    }
}

fn invalid_schema(key: &str, reason: &str, value: &Value) -> SchemaError {
    SchemaError::InvalidSchema {
        key: key.to_string(),
        reason: reason.to_string(),
        raw_json: value.to_string(),
    }
}

fn optional_string(obj: &Object, key: &str) -> Result<Option<String>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => {
            let text = text.trim();
            Ok((!text.is_empty()).then(|| text.to_string()))
        }
        Some(_) => Err(format!("`{key}` must be a string")),
    }
}

fn optional_bool(obj: &Object, key: &str) -> Result<Option<bool>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(_) => Err(format!("`{key}` must be true or false")),
    }
}

/// camelCases a display name: separators are dropped, the character after
/// each one is uppercased and the first character lowercased.
///
/// A trailing `_N` is kept when the part before it is already camelCase, so
/// names produced by deduplication survive another pass unchanged.
pub fn to_camel_case(raw: &str) -> String {
    let raw = raw.trim();
    if let Some((base, digits)) = raw.rsplit_once('_') {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            let camel = camelize(base);
            if !camel.is_empty() && camel == base {
                return format!("{camel}_{digits}");
            }
        }
    }
    camelize(raw)
}

fn camelize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut upper_next = false;
    for c in raw.chars() {
        if !c.is_alphanumeric() {
            upper_next = true;
            continue;
        }
        if out.is_empty() {
            out.extend(c.to_lowercase());
        } else if upper_next {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        upper_next = false;
    }
    out
}

/// "emailAddress_1" -> "Email Address 1"
fn humanize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '_' || c == '-' {
            out.push(' ');
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            out.push(' ');
        }
        if out.is_empty() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
    }
    out
}

/// Hands out unique names in order of first occurrence.
#[derive(Debug, Default)]
struct NameRegistry {
    used: HashSet<String>,
    next_suffix: HashMap<String, usize>,
}

impl NameRegistry {
    /// Suffixes always hang off the root: a taken `a_1` becomes `a_2`,
    /// never `a_1_1`.
    fn claim(&mut self, base: String) -> String {
        if self.used.insert(base.clone()) {
            return base;
        }
        let root = dedupe_root(&base).to_string();
        let mut n = self.next_suffix.get(&root).copied().unwrap_or(1);
        loop {
            let candidate = format!("{root}_{n}");
            n += 1;
            if self.used.insert(candidate.clone()) {
                self.next_suffix.insert(root, n);
                return candidate;
            }
        }
    }
}

/// `name` without a trailing `_N` dedupe suffix.
pub(crate) fn dedupe_root(name: &str) -> &str {
    match name.rsplit_once('_') {
        Some((root, digits))
            if !root.is_empty() && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            root
        }
        _ => name,
    }
}
