#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Port the server listens on when `PORT` is unset or unparsable.
pub const DEFAULT_PORT: u16 = 5000;

/// OpenAI-compatible endpoint for Gemini models.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Model used for grading unless `GRADER_MODEL` says otherwise.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Location of the OpenAPI document served under `/api-docs`.
pub const DEFAULT_OPENAPI_PATH: &str = "openapi.json";

/// Title used by the API index route and the fallback API description.
pub const API_TITLE: &str = "Essay Grader API";

/// Path the Swagger UI is mounted on.
pub const DOCS_PATH: &str = "/api-docs";

/// Plain-text body of the health check.
pub const HEALTHY_MESSAGE: &str = "Server is healthy";

/// Returned with a 400 when a grading request is missing a field.
pub const MISSING_FIELDS_MESSAGE: &str = "question, rubric, and answer are required";

/// Returned with a 500 when the text-generation service could not be reached.
pub const GRADING_FAILED_MESSAGE: &str = "Something went wrong while grading";

/// Embedded in the body when the model's reply is not a usable grade report.
pub const UNPARSED_RESPONSE_MESSAGE: &str = "Failed to parse AI response";
