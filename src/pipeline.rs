use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::GenerationParams;
use crate::dsl::model::{Definition, GenerationRequest};
use crate::dsl::parser::{parse_response, ParseOutcome};
use crate::dsl::validator::validate;
use crate::error::FormgenError;
use crate::llm::prompt::build_prompt;
use crate::llm::ModelClient;

/// A validated definition plus the model text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub definition: Definition,
    pub raw_text: String,
    pub repaired: bool,
}

/// prompt -> model -> clean -> strict parse or repair -> validate.
///
/// Each call is independent; nothing is retried and nothing survives a failure.
pub struct Pipeline<C> {
    client: C,
    params: GenerationParams,
    debug_dir: Option<PathBuf>,
}

impl<C: ModelClient> Pipeline<C> {
    pub fn new(client: C, params: GenerationParams) -> Self {
        Self {
            client,
            params,
            debug_dir: None,
        }
    }

    /// Dumps raw, cleaned and repaired text of every response into `dir`.
    pub fn with_debug_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = dir;
        self
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn generate(&self, request: &GenerationRequest) -> Result<Generated, FormgenError> {
        let prompt = build_prompt(request)?;
        self.params.validate()?;

        info!(kind = %request.kind, model = %self.params.model, "requesting definition");
        let raw = self.client.complete(&prompt, &self.params)?;

        let outcome = parse_response(&raw);
        self.dump(&raw, &outcome);
        let repaired = outcome.is_repaired();
        if repaired {
            info!(kind = %request.kind, "model output needed repair");
        }
        let parsed = outcome.into_result(&raw)?;

        let definition =
            validate(request.kind, &parsed.value).map_err(|err| FormgenError::from(err).with_raw_text(&raw))?;
        info!(kind = %request.kind, title = %definition.title(), "definition validated");

        Ok(Generated {
            definition,
            raw_text: raw,
            repaired,
        })
    }

    fn dump(&self, raw: &str, outcome: &ParseOutcome) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        if let Err(err) = fs::create_dir_all(dir) {
            warn!(error = %err, dir = %dir.display(), "cannot create debug directory");
            return;
        }

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3f");
        let mut files = vec![("raw.txt", raw), ("cleaned.json", outcome.cleaned())];
        match outcome {
            ParseOutcome::Repaired { repaired, .. } | ParseOutcome::Failed { repaired, .. } => {
                files.push(("repaired.json", repaired.as_str()));
            }
            ParseOutcome::NoObject { .. } | ParseOutcome::Strict { .. } => {}
        }
        for (suffix, contents) in files {
            let path = dir.join(format!("{stamp}_{suffix}"));
            if let Err(err) = fs::write(&path, contents) {
                warn!(error = %err, path = %path.display(), "cannot write debug dump");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::model::TargetKind;
    use crate::llm::LlmError;
    use std::cell::RefCell;

    struct Canned {
        reply: Result<String, u16>,
        prompts: RefCell<Vec<String>>,
    }

    impl Canned {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl ModelClient for Canned {
        fn complete(&self, prompt: &str, _params: &GenerationParams) -> Result<String, LlmError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(LlmError::Status {
                    status: *status,
                    body: "quota exceeded".into(),
                }),
            }
        }
    }

    fn pipeline(client: Canned) -> Pipeline<Canned> {
        Pipeline::new(client, GenerationParams::default())
    }

    #[test]
    fn empty_use_case_never_reaches_the_model() {
        let p = pipeline(Canned::ok("{}"));
        let err = p.generate(&GenerationRequest::new(" ", TargetKind::Form)).unwrap_err();
        assert!(matches!(err, FormgenError::InvalidInput(_)));
        assert!(p.client.prompts.borrow().is_empty());
    }

    #[test]
    fn service_failures_are_surfaced() {
        let p = pipeline(Canned {
            reply: Err(429),
            prompts: RefCell::new(Vec::new()),
        });
        let err = p.generate(&GenerationRequest::new("survey", TargetKind::Form)).unwrap_err();
        assert_eq!(err.status(), 502);
        assert!(err.to_string().contains("429"));
        assert_eq!(p.client.prompts.borrow().len(), 1);
    }

    #[test]
    fn repaired_output_is_flagged() {
        let p = pipeline(Canned::ok(
            r#"{"title":"T","fields":[{"name":"code","label":"Code","type":"text","validation":{"pattern":"\d{4}"}},]}"#,
        ));
        let generated = p.generate(&GenerationRequest::new("codes", TargetKind::Form)).unwrap();
        assert!(generated.repaired);
        match generated.definition {
            Definition::Form(form) => assert_eq!(form.fields[0].validation.pattern.as_deref(), Some(r"\d{4}")),
            other => panic!("expected a form, got {other:?}"),
        }
    }

    #[test]
    fn validation_failure_carries_raw_text() {
        let raw = "```json\n{\"title\": \"T\", \"columns\": []}\n```";
        let p = pipeline(Canned::ok(raw));
        let err = p.generate(&GenerationRequest::new("x", TargetKind::Table)).unwrap_err();
        match err {
            FormgenError::Schema { raw_text, .. } => assert_eq!(raw_text.as_deref(), Some(raw)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn replies_without_an_object_report_no_json() {
        for raw in ["\"Sorry, I cannot build that form.\"", "null", "42", "[]", "true"] {
            let p = pipeline(Canned::ok(raw));
            let err = p.generate(&GenerationRequest::new("survey", TargetKind::Form)).unwrap_err();
            match err {
                FormgenError::NoJsonFound { raw_text } => assert_eq!(raw_text, raw),
                other => panic!("{raw} -> unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn debug_dumps_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(Canned::ok("{\"title\": \"T\", \"fields\": [],}"))
            .with_debug_dir(Some(dir.path().to_path_buf()));
        let _ = p.generate(&GenerationRequest::new("x", TargetKind::Form));

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 3);
        assert!(names.iter().any(|n| n.ends_with("_repaired.json")));
    }
}
