//! Form/table schema language: the typed model plus the stages that turn
//! free-text model output into it.

pub mod cleaner;
pub mod model;
pub mod parser;
pub mod repair;
pub mod validator;

pub use model::{
    ColumnType, Definition, FieldType, FieldValidation, FormDefinition, FormField,
    GenerationRequest, Limit, TableColumn, TableDefinition, TargetKind,
};
