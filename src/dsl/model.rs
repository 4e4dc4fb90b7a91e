use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_LAYOUT: &str = "vertical";
pub const MISSING_CELL: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Form,
    Table,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Form => "form",
            TargetKind::Table => "table",
        }
    }

    /// Key of the ordered item array inside a definition of this kind.
    pub fn items_key(self) -> &'static str {
        match self {
            TargetKind::Form => "fields",
            TargetKind::Table => "columns",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "form" => Ok(TargetKind::Form),
            "table" => Ok(TargetKind::Table),
            other => Err(format!("unknown target kind `{other}` (expected form or table)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub use_case: String,
    pub kind: TargetKind,
}

impl GenerationRequest {
    pub fn new(use_case: impl Into<String>, kind: TargetKind) -> Self {
        Self { use_case: use_case.into(), kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Definition {
    Form(FormDefinition),
    Table(TableDefinition),
}

impl Definition {
    pub fn kind(&self) -> TargetKind {
        match self {
            Definition::Form(_) => TargetKind::Form,
            Definition::Table(_) => TargetKind::Table,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Definition::Form(form) => &form.title,
            Definition::Table(table) => &table.title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    pub title: String,
    #[serde(default = "default_layout")]
    pub layout: String,
    pub fields: Vec<FormField>,
}

fn default_layout() -> String {
    DEFAULT_LAYOUT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub validation: FieldValidation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Limit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Limit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
}

impl FieldValidation {
    pub fn required(required: bool) -> Self {
        Self { required, ..Self::default() }
    }
}

/// Bound of a `min`/`max` rule: numeric for numbers and sliders, textual for
/// dates and times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Limit {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "password")]
    Password,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "tel")]
    Tel,
    #[serde(rename = "url")]
    Url,
    #[serde(rename = "textarea")]
    Textarea,
    #[serde(rename = "select")]
    Select,
    #[serde(rename = "multi_select")]
    MultiSelect,
    #[serde(rename = "radio")]
    Radio,
    #[serde(rename = "checkbox")]
    Checkbox,
    #[serde(rename = "switch")]
    Switch,
    #[serde(rename = "slider")]
    Slider,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "time")]
    Time,
    #[serde(rename = "datetime")]
    DateTime,
    #[serde(rename = "file")]
    File,
    #[serde(rename = "tags")]
    Tags,
}

impl FieldType {
    pub const ALL: [FieldType; 18] = [
        FieldType::Text,
        FieldType::Email,
        FieldType::Password,
        FieldType::Number,
        FieldType::Tel,
        FieldType::Url,
        FieldType::Textarea,
        FieldType::Select,
        FieldType::MultiSelect,
        FieldType::Radio,
        FieldType::Checkbox,
        FieldType::Switch,
        FieldType::Slider,
        FieldType::Date,
        FieldType::Time,
        FieldType::DateTime,
        FieldType::File,
        FieldType::Tags,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Password => "password",
            FieldType::Number => "number",
            FieldType::Tel => "tel",
            FieldType::Url => "url",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::MultiSelect => "multi_select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Switch => "switch",
            FieldType::Slider => "slider",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::DateTime => "datetime",
            FieldType::File => "file",
            FieldType::Tags => "tags",
        }
    }

    /// Controls that pick from an option list.
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            FieldType::Select | FieldType::MultiSelect | FieldType::Radio | FieldType::Checkbox
        )
    }

    /// Resolves a model-supplied type name, including the common synonyms
    /// models emit for the canonical names.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let key = raw.trim().to_ascii_lowercase();
        if let Some(found) = Self::ALL.iter().find(|t| t.as_str() == key) {
            return Some(*found);
        }
        let alias = match key.as_str() {
            "string" | "input" | "short_text" => FieldType::Text,
            "phone" | "telephone" => FieldType::Tel,
            "integer" | "int" | "float" | "decimal" => FieldType::Number,
            "text_area" | "long_text" | "multiline" => FieldType::Textarea,
            "dropdown" => FieldType::Select,
            "multiselect" | "multi-select" => FieldType::MultiSelect,
            "toggle" | "boolean" | "bool" => FieldType::Switch,
            "range" => FieldType::Slider,
            "datetime-local" | "date_time" => FieldType::DateTime,
            "file_upload" | "upload" => FieldType::File,
            "tag" | "chips" => FieldType::Tags,
            _ => return None,
        };
        Some(alias)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub title: String,
    pub columns: Vec<TableColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_data: Option<Vec<Map<String, Value>>>,
}

impl TableDefinition {
    /// Display text of one sample cell; rows missing the column render as `N/A`.
    pub fn cell_text(&self, row: &Map<String, Value>, column: &str) -> String {
        match row.get(column) {
            None | Some(Value::Null) => MISSING_CELL.to_string(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Date,
    Boolean,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
        }
    }

    pub fn parse_loose(raw: &str) -> Option<Self> {
        let found = match raw.trim().to_ascii_lowercase().as_str() {
            "string" | "text" | "varchar" | "email" | "url" | "enum" => ColumnType::String,
            "number" | "integer" | "int" | "float" | "decimal" | "currency" => ColumnType::Number,
            "date" | "datetime" | "timestamp" | "time" => ColumnType::Date,
            "boolean" | "bool" => ColumnType::Boolean,
            _ => return None,
        };
        Some(found)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
