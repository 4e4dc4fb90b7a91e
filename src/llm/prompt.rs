use crate::dsl::model::{FieldType, GenerationRequest, TargetKind};
use crate::error::FormgenError;

const OUTPUT_RULES: &str = "IMPORTANT INSTRUCTIONS:
- Respond ONLY with a single valid JSON object
- NO additional text, comments, markdown or code block markers
- Escape every backslash inside string values (write \\\\d, not \\d)
- Strictly follow this JSON structure:";

/// Builds the instruction text for one generation request.
///
/// The target shape is spelled out verbatim so the validator's required keys
/// match what the model is asked for.
pub fn build_prompt(request: &GenerationRequest) -> Result<String, FormgenError> {
    let use_case = request.use_case.trim();
    if use_case.is_empty() {
        return Err(FormgenError::InvalidInput(format!(
            "Please provide a valid {} description",
            request.kind
        )));
    }

    Ok(match request.kind {
        TargetKind::Form => form_prompt(use_case),
        TargetKind::Table => table_prompt(use_case),
    })
}

fn form_prompt(use_case: &str) -> String {
    let types = FieldType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join("|");
    format!(
        r#"You are a form generation assistant. Create a form definition based on the requirements below.

{OUTPUT_RULES}

{{
  "title": "Form Title",
  "layout": "vertical",
  "fields": [
    {{
      "name": "fieldName",
      "label": "Field Label",
      "type": "{types}",
      "placeholder": "Optional placeholder",
      "required": true,
      "options": ["option1", "option2"],
      "validation": {{
        "required": true,
        "pattern": "optional regex",
        "min": "optional min value",
        "max": "optional max value",
        "minLength": 0,
        "maxLength": 100
      }}
    }}
  ]
}}

RULES:
1. Use camelCase for field names and keep them unique
2. Choose appropriate field types
3. Provide options for select, multi_select, radio and checkbox fields
4. Add meaningful validation
5. Include helpful placeholders

Create a form for this use case: {use_case}"#
    )
}

fn table_prompt(use_case: &str) -> String {
    format!(
        r#"You are a table generation assistant. Generate a comprehensive table structure for the use case below.

{OUTPUT_RULES}

{{
  "title": "Table Title",
  "columns": [
    {{
      "name": "ColumnName1",
      "type": "string|number|date|boolean",
      "description": "Column description"
    }}
  ],
  "sampleData": [
    {{
      "ColumnName1": "Sample Value"
    }}
  ]
}}

RULES:
1. Use these EXACT keys: title, columns, sampleData
2. Columns MUST have: name, type, description
3. Every sampleData row MUST use the column names as keys
4. Provide 3-5 realistic sample rows

Create a table for this use case: {use_case}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_use_case_is_rejected() {
        let err = build_prompt(&GenerationRequest::new("  \n ", TargetKind::Form)).unwrap_err();
        assert!(matches!(err, FormgenError::InvalidInput(_)));
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn form_prompt_embeds_shape_and_use_case() {
        let prompt = build_prompt(&GenerationRequest::new("  job application ", TargetKind::Form)).unwrap();
        assert!(prompt.ends_with("Create a form for this use case: job application"));
        assert!(prompt.contains("\"fields\": ["));
        assert!(prompt.contains("text|email|password"));
        assert!(prompt.contains("NO additional text"));
    }

    #[test]
    fn table_prompt_names_exact_keys() {
        let prompt = build_prompt(&GenerationRequest::new("inventory", TargetKind::Table)).unwrap();
        assert!(prompt.contains("\"sampleData\": ["));
        assert!(prompt.contains("title, columns, sampleData"));
        assert!(prompt.ends_with("inventory"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let request = GenerationRequest::new("feedback survey", TargetKind::Form);
        assert_eq!(build_prompt(&request).unwrap(), build_prompt(&request).unwrap());
    }
}
