//! Transport-agnostic entry points: each call returns a status and a JSON
//! body, ready to be written by whatever front end sits on top.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::convert::{convert_form, Conversion};
use crate::dsl::model::{Definition, GenerationRequest, TargetKind};
use crate::dsl::validator::validate;
use crate::edit::{apply_edit, FieldEdit};
use crate::error::{ErrorBody, FormgenError};
use crate::llm::ModelClient;
use crate::pipeline::Pipeline;
use crate::store::{DocumentId, DocumentStore, StoredDocument};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn from_result<T: Serialize>(result: Result<T, FormgenError>, ok_status: u16) -> Self {
        let err = match result {
            Ok(value) => match serde_json::to_value(value) {
                Ok(body) => return Self { status: ok_status, body },
                Err(err) => FormgenError::Storage(err.into()),
            },
            Err(err) => err,
        };

        let status = err.status();
        if status >= 500 {
            error!(status, error = %err, "request failed");
        } else {
            warn!(status, error = %err, "request rejected");
        }
        let body = serde_json::to_value(ErrorBody::from(&err))
            .unwrap_or_else(|_| json!({"error": err.to_string()}));
        Self { status, body }
    }
}

#[derive(Debug, Serialize)]
struct Created {
    id: DocumentId,
}

#[derive(Debug, Serialize)]
struct Deleted {
    id: DocumentId,
    deleted: bool,
}

#[derive(Debug, Serialize)]
struct Converted {
    document: StoredDocument,
    sql: String,
}

/// Generation plus storage of definitions.
///
/// Without a pipeline every call except `generate` still works; the CLI uses
/// that to serve stored documents without model credentials.
pub struct FormService<C, S> {
    pipeline: Option<Pipeline<C>>,
    store: S,
}

impl<C: ModelClient, S: DocumentStore> FormService<C, S> {
    pub fn new(pipeline: Pipeline<C>, store: S) -> Self {
        Self {
            pipeline: Some(pipeline),
            store,
        }
    }

    pub fn without_model(store: S) -> Self {
        Self { pipeline: None, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Body is `{"useCase": "..."}`; `{"prompt": "..."}` is accepted too.
    pub fn generate(&self, body: &Value, kind: TargetKind) -> ApiResponse {
        let result = use_case_from(body).and_then(|use_case| {
            self.generate_document(&GenerationRequest::new(use_case, kind))
        });
        ApiResponse::from_result(result, 201)
    }

    pub fn get(&self, id: &str) -> ApiResponse {
        ApiResponse::from_result(self.fetch(id), 200)
    }

    /// Body is `{"kind"?, "definition"}` or a bare definition.
    pub fn post(&self, body: &Value) -> ApiResponse {
        let result = self.submit(body).map(|doc| Created { id: doc.id });
        ApiResponse::from_result(result, 201)
    }

    pub fn list(&self) -> ApiResponse {
        ApiResponse::from_result(self.store.list().map_err(FormgenError::from), 200)
    }

    pub fn delete(&self, id: &str) -> ApiResponse {
        let result = self.remove(id).map(|id| Deleted { id, deleted: true });
        ApiResponse::from_result(result, 200)
    }

    pub fn edit(&self, id: &str, edit: &FieldEdit) -> ApiResponse {
        ApiResponse::from_result(self.apply(id, edit), 200)
    }

    pub fn convert(&self, id: &str) -> ApiResponse {
        let result = self
            .convert_to_table(id)
            .map(|(document, sql)| Converted { document, sql });
        ApiResponse::from_result(result, 201)
    }

    /// Runs the pipeline and stores the result; nothing is stored on failure.
    pub fn generate_document(&self, request: &GenerationRequest) -> Result<StoredDocument, FormgenError> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| FormgenError::ServiceUnavailable("no model client is configured".into()))?;
        let generated = pipeline.generate(request)?;
        let document = self
            .store
            .put(generated.definition, Some(request.use_case.trim().to_string()))?;
        info!(id = %document.id, kind = %document.kind, repaired = generated.repaired, "document generated");
        Ok(document)
    }

    pub fn fetch(&self, id: &str) -> Result<StoredDocument, FormgenError> {
        let id = DocumentId::parse(id)?;
        Ok(self.store.get(&id)?)
    }

    pub fn submit(&self, body: &Value) -> Result<StoredDocument, FormgenError> {
        let (kind, definition) = submitted_definition(body)?;
        let definition = validate(kind, definition)?;
        let prompt = body.get("prompt").and_then(Value::as_str).map(str::to_string);
        let document = self.store.put(definition, prompt)?;
        info!(id = %document.id, kind = %document.kind, "document submitted");
        Ok(document)
    }

    pub fn remove(&self, id: &str) -> Result<DocumentId, FormgenError> {
        let id = DocumentId::parse(id)?;
        self.store.delete(&id)?;
        info!(id = %id, "document deleted");
        Ok(id)
    }

    pub fn apply(&self, id: &str, edit: &FieldEdit) -> Result<StoredDocument, FormgenError> {
        let current = self.fetch(id)?;
        let next = apply_edit(&current, edit)?;
        self.store.save(&next)?;
        info!(id = %next.id, version = next.version, "document edited");
        Ok(next)
    }

    /// Stores the table converted from form `id` as a new document.
    pub fn convert_to_table(&self, id: &str) -> Result<(StoredDocument, String), FormgenError> {
        let source = self.fetch(id)?;
        let Definition::Form(form) = &source.definition else {
            return Err(FormgenError::InvalidInput(format!(
                "document `{}` is a {}, only forms can be converted",
                source.id, source.kind
            )));
        };
        let Conversion { table, sql } = convert_form(form)?;
        let document = self.store.put(Definition::Table(table), source.prompt.clone())?;
        info!(from = %source.id, to = %document.id, "form converted to table");
        Ok((document, sql))
    }
}

fn use_case_from(body: &Value) -> Result<String, FormgenError> {
    ["useCase", "prompt"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| FormgenError::InvalidInput("Use case is required".into()))
}

fn submitted_definition(body: &Value) -> Result<(TargetKind, &Value), FormgenError> {
    if !body.is_object() {
        return Err(FormgenError::InvalidInput("request body must be a JSON object".into()));
    }
    let definition = body.get("definition").unwrap_or(body);
    let kind = match body.get("kind").and_then(Value::as_str) {
        Some(kind) => kind.parse().map_err(FormgenError::InvalidInput)?,
        None => infer_kind(definition)?,
    };
    Ok((kind, definition))
}

fn infer_kind(definition: &Value) -> Result<TargetKind, FormgenError> {
    match (definition.get("fields").is_some(), definition.get("columns").is_some()) {
        (true, false) => Ok(TargetKind::Form),
        (false, true) => Ok(TargetKind::Table),
        _ => Err(FormgenError::InvalidInput(
            "cannot tell whether the definition is a form or a table; set `kind`".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationParams;
    use crate::llm::LlmError;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    struct Fixed(&'static str);

    impl ModelClient for Fixed {
        fn complete(&self, _prompt: &str, _params: &GenerationParams) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    const FORM_REPLY: &str = r#"```json
{"title": "Contact", "layout": "vertical", "fields": [
  {"name": "fullName", "label": "Full Name", "type": "text", "required": true},
  {"name": "email", "label": "Email", "type": "email", "required": true}
]}
```"#;

    fn service(reply: &'static str) -> FormService<Fixed, MemoryStore> {
        FormService::new(Pipeline::new(Fixed(reply), GenerationParams::default()), MemoryStore::new())
    }

    #[test]
    fn generate_stores_the_document() {
        let svc = service(FORM_REPLY);
        let resp = svc.generate(&json!({"useCase": "contact form"}), TargetKind::Form);
        assert_eq!(resp.status, 201);
        assert_eq!(resp.body["kind"], "form");
        assert_eq!(resp.body["prompt"], "contact form");
        assert_eq!(resp.body["definition"]["fields"][1]["name"], "email");

        let id = resp.body["id"].as_str().unwrap();
        let got = svc.get(id);
        assert_eq!(got.status, 200);
        assert_eq!(got.body, resp.body);
    }

    #[test]
    fn generate_requires_a_use_case() {
        let svc = service(FORM_REPLY);
        let resp = svc.generate(&json!({"useCase": "   "}), TargetKind::Form);
        assert_eq!(resp.status, 400);
        assert_eq!(resp.body, json!({"error": "Use case is required"}));
        assert!(svc.store().is_empty());
    }

    #[test]
    fn failed_generation_stores_nothing() {
        let svc = service("I could not build that.");
        let resp = svc.generate(&json!({"prompt": "x"}), TargetKind::Table);
        assert_eq!(resp.status, 422);
        assert_eq!(resp.body["error"], "Failed to extract JSON");
        assert_eq!(resp.body["rawText"], "I could not build that.");
        assert!(svc.store().is_empty());
    }

    #[test]
    fn generate_without_model_is_unavailable() {
        let svc: FormService<Fixed, MemoryStore> = FormService::without_model(MemoryStore::new());
        let resp = svc.generate(&json!({"useCase": "x"}), TargetKind::Form);
        assert_eq!(resp.status, 502);
    }

    #[test]
    fn post_infers_kind_and_validates() {
        let svc = service(FORM_REPLY);
        let resp = svc.post(&json!({
            "title": "Inventory",
            "columns": [{"name": "Item", "type": "string"}, {"name": "Qty", "type": "integer"}]
        }));
        assert_eq!(resp.status, 201);
        let stored = svc.fetch(resp.body["id"].as_str().unwrap()).unwrap();
        assert_eq!(stored.kind, TargetKind::Table);

        let wrapped = svc.post(&json!({"kind": "form", "definition": {"title": "T", "fields": []}}));
        assert_eq!(wrapped.status, 422);

        let ambiguous = svc.post(&json!({"title": "T"}));
        assert_eq!(ambiguous.status, 400);
    }

    #[test]
    fn get_and_delete_report_missing_ids() {
        let svc = service(FORM_REPLY);
        assert_eq!(svc.get("0123456789abcdef0123456789abcdef").status, 404);
        assert_eq!(svc.get("../etc/passwd").status, 400);

        let id = svc.post(&json!({"title": "T", "fields": [{"name": "a", "type": "text"}]})).body["id"]
            .as_str()
            .unwrap()
            .to_string();
        let resp = svc.delete(&id);
        assert_eq!(resp.body, json!({"id": id, "deleted": true}));
        assert_eq!(svc.delete(&id).status, 404);
    }

    #[test]
    fn list_returns_documents_oldest_first() {
        let svc = service(FORM_REPLY);
        svc.generate(&json!({"useCase": "one"}), TargetKind::Form);
        svc.generate(&json!({"useCase": "two"}), TargetKind::Form);
        let resp = svc.list();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn edit_saves_a_new_version() {
        let svc = service(FORM_REPLY);
        let doc = svc.generate_document(&GenerationRequest::new("contact", TargetKind::Form)).unwrap();
        let resp = svc.edit(doc.id.as_str(), &FieldEdit::Remove { name: "email".into() });
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body["version"], 2);

        let stored = svc.fetch(doc.id.as_str()).unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(svc.store().len(), 1);
    }

    #[test]
    fn convert_stores_a_new_table() {
        let svc = service(FORM_REPLY);
        let doc = svc.generate_document(&GenerationRequest::new("contact", TargetKind::Form)).unwrap();
        let resp = svc.convert(doc.id.as_str());
        assert_eq!(resp.status, 201);
        assert_eq!(resp.body["document"]["kind"], "table");
        assert!(resp.body["sql"].as_str().unwrap().starts_with("CREATE TABLE contact ("));
        assert_eq!(svc.store().len(), 2);

        let table_id = resp.body["document"]["id"].as_str().unwrap();
        assert_eq!(svc.convert(table_id).status, 400);
    }
}
