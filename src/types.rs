use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use utoipa::ToSchema;

use crate::constants::{MISSING_FIELDS_MESSAGE, UNPARSED_RESPONSE_MESSAGE};

/// A validated grading request.
#[derive(Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct GradeRequest {
    /// The exam question.
    pub question: String,
    /// Rubric points, in the order they should be graded.
    pub rubric:   Vec<String>,
    /// The student's answer.
    pub answer:   String,
}

/// Why an inbound body could not become a [`GradeRequest`].
///
/// Every variant is reported to the caller with the same fixed message; the
/// detail only shows up in the logs.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The body is not a JSON object.
    #[error("request body is not a JSON object")]
    MalformedBody,
    /// A required field is absent or empty.
    #[error("`{0}` is missing or empty")]
    Missing(&'static str),
    /// A required field has the wrong JSON type.
    #[error("`{0}` has the wrong type")]
    WrongType(&'static str),
}

impl ValidationError {
    /// The message shown to API callers.
    pub fn public_message(&self) -> &'static str {
        MISSING_FIELDS_MESSAGE
    }
}

impl GradeRequest {
    /// Parses and validates a raw request body.
    ///
    /// A field counts as missing when it is absent, `null`, `false`, `0`, or
    /// an empty string. An empty rubric array is accepted.
    pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|_| ValidationError::MalformedBody)?;
        let Value::Object(fields) = value else {
            return Err(ValidationError::MalformedBody);
        };

        let question = required(&fields, "question")?;
        let rubric = required(&fields, "rubric")?;
        let answer = required(&fields, "answer")?;

        Ok(Self {
            question: as_string(question, "question")?,
            rubric:   as_rubric(rubric)?,
            answer:   as_string(answer, "answer")?,
        })
    }
}

/// Looks up a field and rejects it when it is not truthy.
fn required<'a>(
    fields: &'a Map<String, Value>,
    key: &'static str,
) -> Result<&'a Value, ValidationError> {
    match fields.get(key) {
        Some(value) if is_truthy(value) => Ok(value),
        _ => Err(ValidationError::Missing(key)),
    }
}

/// JSON truthiness: `null`, `false`, zero, and `""` are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Extracts a string field.
fn as_string(value: &Value, key: &'static str) -> Result<String, ValidationError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or(ValidationError::WrongType(key))
}

/// Extracts the rubric, which must be an array of strings.
fn as_rubric(value: &Value) -> Result<Vec<String>, ValidationError> {
    value
        .as_array()
        .ok_or(ValidationError::WrongType("rubric"))?
        .iter()
        .map(|point| as_string(point, "rubric"))
        .collect()
}

/// Score awarded for a single rubric point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RubricBreakdownItem {
    /// The rubric text, echoed back.
    pub point: String,
    /// Marks awarded; conventionally 0, 0.5 or 1.
    #[schema(value_type = f64)]
    pub score: Number,
    /// Marks available for this point.
    #[schema(value_type = f64)]
    pub max:   Number,
}

/// A successfully parsed grade.
///
/// Numbers are kept as written by the model so the report serializes back
/// exactly as it was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
    /// Marks awarded across all points.
    #[schema(value_type = f64)]
    pub total:     Number,
    /// Marks available across all points.
    #[schema(value_type = f64)]
    pub out_of:    Number,
    /// Per-point scores.
    pub breakdown: Vec<RubricBreakdownItem>,
    /// Short feedback for the student.
    pub feedback:  String,
}

/// What the grading adapter hands back to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GradeResult {
    /// The model replied with a well-formed report.
    Report(GradeReport),
    /// The model's reply could not be used; `raw` holds it after cleanup.
    Unparsed {
        /// Always [`UNPARSED_RESPONSE_MESSAGE`].
        error: String,
        /// Model output with code fences removed.
        raw:   String,
    },
}

impl GradeResult {
    /// Wraps unusable model output.
    pub fn unparsed(raw: impl Into<String>) -> Self {
        Self::Unparsed {
            error: UNPARSED_RESPONSE_MESSAGE.to_owned(),
            raw:   raw.into(),
        }
    }

    /// Returns the report, if parsing succeeded.
    pub fn report(&self) -> Option<&GradeReport> {
        match self {
            Self::Report(report) => Some(report),
            Self::Unparsed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn accepts_a_complete_request() {
        let request = GradeRequest::from_json(&body(json!({
            "question": "Define osmosis",
            "rubric": ["Mentions water", "Mentions a membrane"],
            "answer": "Water moves across a membrane",
        })))
        .expect("valid request");

        assert_eq!(request.question, "Define osmosis");
        assert_eq!(request.rubric, vec!["Mentions water", "Mentions a membrane"]);
        assert_eq!(request.answer, "Water moves across a membrane");
    }

    #[test]
    fn rejects_each_missing_field() {
        let complete = json!({ "question": "q", "rubric": ["p"], "answer": "a" });
        for key in ["question", "rubric", "answer"] {
            let mut partial = complete.clone();
            partial.as_object_mut().unwrap().remove(key);
            assert_eq!(
                GradeRequest::from_json(&body(partial)),
                Err(ValidationError::Missing(key))
            );
        }
    }

    #[test]
    fn falsy_values_count_as_missing() {
        for falsy in [json!(null), json!(""), json!(false), json!(0)] {
            let request = json!({ "question": falsy, "rubric": ["p"], "answer": "a" });
            assert_eq!(
                GradeRequest::from_json(&body(request)),
                Err(ValidationError::Missing("question"))
            );
        }
    }

    #[test]
    fn empty_rubric_is_accepted() {
        let request =
            GradeRequest::from_json(&body(json!({ "question": "q", "rubric": [], "answer": "a" })))
                .expect("empty rubric is allowed");
        assert!(request.rubric.is_empty());
    }

    #[test]
    fn wrong_types_are_rejected() {
        let request = json!({ "question": "q", "rubric": "not a list", "answer": "a" });
        assert_eq!(
            GradeRequest::from_json(&body(request)),
            Err(ValidationError::WrongType("rubric"))
        );

        let request = json!({ "question": "q", "rubric": ["ok", 3], "answer": "a" });
        assert_eq!(
            GradeRequest::from_json(&body(request)),
            Err(ValidationError::WrongType("rubric"))
        );

        let request = json!({ "question": 42, "rubric": ["p"], "answer": "a" });
        assert_eq!(
            GradeRequest::from_json(&body(request)),
            Err(ValidationError::WrongType("question"))
        );
    }

    #[test]
    fn non_object_bodies_are_malformed() {
        assert_eq!(GradeRequest::from_json(b"not json"), Err(ValidationError::MalformedBody));
        assert_eq!(GradeRequest::from_json(b"[1, 2]"), Err(ValidationError::MalformedBody));
        assert_eq!(GradeRequest::from_json(b""), Err(ValidationError::MalformedBody));
    }

    #[test]
    fn unparsed_result_serializes_with_error_and_raw() {
        let value = serde_json::to_value(GradeResult::unparsed("nope")).unwrap();
        assert_eq!(value, json!({ "error": "Failed to parse AI response", "raw": "nope" }));
    }
}
