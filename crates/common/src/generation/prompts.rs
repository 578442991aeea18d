//! Prompt templates and response schemas for the generation backend

use serde_json::{json, Value};

pub(crate) const QUERY_LABEL: &str = "Query:";
pub(crate) const CONTENT_LABEL: &str = "Content:";
pub(crate) const QUESTION_LABEL: &str = "Question:";

pub(crate) fn search_terms_prompt(query: &str, max_terms: usize) -> String {
    format!(
        "You are a useful assistant who generates Google search terms as a JSON list of strings \
         for a given query.\n\
         Max search terms: {max_terms}\n\
         {QUERY_LABEL} {query}"
    )
}

pub(crate) fn search_terms_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": { "type": "STRING" }
    })
}

pub(crate) fn analysis_prompt(content: &str, question: &str) -> String {
    format!(
        "You are a text analyst who finds answers to a question within a piece of content.\n\
         Return the answer to the question from the content if it is present, \
         as a JSON object with the fields \"answer\" and \"confidence\".\n\
         \"confidence\" is a floating point number between 0 and 1 stating how certain it is \
         that the answer is present in the content and completely matches the question.\n\
         {CONTENT_LABEL} {content}\n\
         {QUESTION_LABEL} {question}"
    )
}

pub(crate) fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "answer": { "type": "STRING" },
            "confidence": { "type": "NUMBER" }
        },
        "required": ["answer", "confidence"]
    })
}

/// Whether a schema describes a top-level array
pub(crate) fn is_array_schema(schema: &Value) -> bool {
    schema
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case("array"))
}

/// Text following `label` on the first line that starts with it
pub(crate) fn labelled_line<'a>(prompt: &'a str, label: &str) -> Option<&'a str> {
    prompt
        .lines()
        .find_map(|line| line.trim_start().strip_prefix(label))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_carry_inputs_on_labelled_lines() {
        let prompt = search_terms_prompt("capital of France", 3);
        assert!(prompt.contains("Max search terms: 3"));
        assert_eq!(labelled_line(&prompt, QUERY_LABEL), Some("capital of France"));

        let prompt = analysis_prompt("Paris is the capital.", "capital of France?");
        assert_eq!(labelled_line(&prompt, CONTENT_LABEL), Some("Paris is the capital."));
        assert_eq!(labelled_line(&prompt, QUESTION_LABEL), Some("capital of France?"));
    }

    #[test]
    fn test_schema_shape() {
        assert!(is_array_schema(&search_terms_schema()));
        assert!(!is_array_schema(&analysis_schema()));
    }
}
