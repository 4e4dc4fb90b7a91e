//! Field-level edits of stored definitions.
//!
//! Edits work on the generic JSON form of a definition and the result goes
//! back through the validator, so an edited document satisfies every rule a
//! generated one does.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dsl::model::TargetKind;
use crate::dsl::validator::{dedupe_root, to_camel_case, validate};
use crate::error::FormgenError;
use crate::store::{StoreError, StoredDocument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum FieldEdit {
    /// Inserts `field` at `position`, or appends when absent or past the end.
    Add {
        field: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
    },
    Remove {
        name: String,
    },
    /// Merges `patch` into the named entry; `null` values delete keys.
    Update {
        name: String,
        patch: Value,
    },
}

/// Applies `edit` and returns the next version of `document`.
///
/// Names of untouched entries never change: a colliding name on the added or
/// updated entry gets the next free `_N` suffix instead.
pub fn apply_edit(document: &StoredDocument, edit: &FieldEdit) -> Result<StoredDocument, FormgenError> {
    let kind = document.kind;
    let mut value = serde_json::to_value(&document.definition).map_err(StoreError::from)?;
    let items = value
        .get_mut(kind.items_key())
        .and_then(Value::as_array_mut)
        .ok_or_else(|| FormgenError::InvalidInput(format!("document has no `{}`", kind.items_key())))?;

    match edit {
        FieldEdit::Add { field, position } => {
            let mut entry = entry_object(field)?;
            claim_unique_name(kind, &mut entry, items, None);
            let at = position.unwrap_or(items.len()).min(items.len());
            items.insert(at, Value::Object(entry));
        }
        FieldEdit::Remove { name } => {
            let index = position_of(items, name)?;
            items.remove(index);
        }
        FieldEdit::Update { name, patch } => {
            let index = position_of(items, name)?;
            let patch = entry_object(patch)?;
            let mut entry = items[index].as_object().cloned().unwrap_or_default();
            for (key, patched) in patch {
                if patched.is_null() {
                    entry.remove(&key);
                } else {
                    entry.insert(key, patched);
                }
            }
            claim_unique_name(kind, &mut entry, items, Some(index));
            items[index] = Value::Object(entry);
        }
    }

    let definition = validate(kind, &value)?;
    Ok(document.revised(definition))
}

fn entry_object(value: &Value) -> Result<Map<String, Value>, FormgenError> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| FormgenError::InvalidInput("a field edit must carry a JSON object".into()))
}

fn position_of(items: &[Value], name: &str) -> Result<usize, FormgenError> {
    items
        .iter()
        .position(|item| item.get("name").and_then(Value::as_str) == Some(name))
        .ok_or_else(|| FormgenError::InvalidInput(format!("no field named `{name}`")))
}

fn claim_unique_name(kind: TargetKind, entry: &mut Map<String, Value>, items: &[Value], skip: Option<usize>) {
    let source = ["name", "label"]
        .iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .unwrap_or_default();
    let base = match kind {
        TargetKind::Form => to_camel_case(source),
        TargetKind::Table => source.to_string(),
    };
    if base.is_empty() {
        // left for the validator to reject
        return;
    }

    let taken: HashSet<&str> = items
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != skip)
        .filter_map(|(_, item)| item.get("name").and_then(Value::as_str))
        .collect();
    let root = dedupe_root(&base);
    let mut name = base.clone();
    let mut n = 1;
    while taken.contains(name.as_str()) {
        name = format!("{root}_{n}");
        n += 1;
    }
    entry.insert("name".into(), Value::String(name));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::model::{Definition, FieldType};
    use crate::dsl::validator::{validate_form, validate_table};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn form_document() -> StoredDocument {
        let form = validate_form(&json!({
            "title": "Signup",
            "fields": [
                {"name": "fullName", "label": "Full Name", "type": "text", "required": true},
                {"name": "email", "label": "Email", "type": "email"}
            ]
        }))
        .unwrap();
        StoredDocument::new(Definition::Form(form), Some("signup".into()))
    }

    fn names(doc: &StoredDocument) -> Vec<String> {
        match &doc.definition {
            Definition::Form(form) => form.fields.iter().map(|f| f.name.clone()).collect(),
            Definition::Table(table) => table.columns.iter().map(|c| c.name.clone()).collect(),
        }
    }

    #[test]
    fn add_inserts_and_bumps_version() {
        let doc = form_document();
        let edit = FieldEdit::Add {
            field: json!({"label": "Phone Number", "type": "tel"}),
            position: Some(1),
        };
        let next = apply_edit(&doc, &edit).unwrap();
        assert_eq!(names(&next), ["fullName", "phoneNumber", "email"]);
        assert_eq!(next.id, doc.id);
        assert_eq!(next.version, 2);
        assert_eq!(next.prompt.as_deref(), Some("signup"));
    }

    #[test]
    fn colliding_add_keeps_existing_names() {
        let doc = form_document();
        let edit = FieldEdit::Add {
            field: json!({"name": "Email", "label": "Work Email", "type": "email"}),
            position: Some(0),
        };
        let next = apply_edit(&doc, &edit).unwrap();
        assert_eq!(names(&next), ["email_1", "fullName", "email"]);
    }

    #[test]
    fn colliding_suffixed_add_takes_next_free_suffix() {
        let doc = apply_edit(
            &form_document(),
            &FieldEdit::Add {
                field: json!({"name": "email", "type": "email"}),
                position: None,
            },
        )
        .unwrap();
        let edit = FieldEdit::Add {
            field: json!({"name": "email_1", "type": "email"}),
            position: None,
        };
        let next = apply_edit(&doc, &edit).unwrap();
        assert_eq!(names(&next), ["fullName", "email", "email_1", "email_2"]);
    }

    #[test]
    fn position_past_end_appends() {
        let edit = FieldEdit::Add {
            field: json!({"name": "age", "type": "number"}),
            position: Some(99),
        };
        let next = apply_edit(&form_document(), &edit).unwrap();
        assert_eq!(names(&next).last().map(String::as_str), Some("age"));
    }

    #[test]
    fn remove_unknown_field_is_invalid_input() {
        let err = apply_edit(&form_document(), &FieldEdit::Remove { name: "nope".into() }).unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn removing_last_field_is_rejected_by_validation() {
        let doc = form_document();
        let doc = apply_edit(&doc, &FieldEdit::Remove { name: "email".into() }).unwrap();
        let err = apply_edit(&doc, &FieldEdit::Remove { name: "fullName".into() }).unwrap_err();
        assert!(matches!(err, FormgenError::Schema { .. }));
    }

    #[test]
    fn update_merges_patch_and_revalidates() {
        let edit = FieldEdit::Update {
            name: "email".into(),
            patch: json!({"type": "select", "options": ["a", "b"], "label": null}),
        };
        let next = apply_edit(&form_document(), &edit).unwrap();
        let Definition::Form(form) = &next.definition else {
            panic!("expected a form");
        };
        let field = &form.fields[1];
        assert_eq!(field.field_type, FieldType::Select);
        assert_eq!(field.options, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(field.label, "Email");
    }

    #[test]
    fn update_with_unknown_type_fails() {
        let edit = FieldEdit::Update {
            name: "email".into(),
            patch: json!({"type": "hologram"}),
        };
        let err = apply_edit(&form_document(), &edit).unwrap_err();
        assert_eq!(err.status(), 422);
    }

    #[test]
    fn table_columns_are_editable() {
        let table = validate_table(&json!({
            "title": "People",
            "columns": [{"name": "Name", "type": "string"}]
        }))
        .unwrap();
        let doc = StoredDocument::new(Definition::Table(table), None);
        let edit = FieldEdit::Add {
            field: json!({"name": "Name", "type": "number"}),
            position: None,
        };
        let next = apply_edit(&doc, &edit).unwrap();
        assert_eq!(names(&next), ["Name", "Name_1"]);
    }

    #[test]
    fn edits_deserialize_from_tagged_json() {
        let edit: FieldEdit = serde_json::from_value(json!({"op": "remove", "name": "email"})).unwrap();
        assert_eq!(edit, FieldEdit::Remove { name: "email".into() });
    }
}
