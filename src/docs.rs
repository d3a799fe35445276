use std::path::{Path, PathBuf};

use utoipa::{
    PartialSchema, ToSchema,
    openapi::{Components, ComponentsBuilder, InfoBuilder, OpenApi, OpenApiBuilder},
};

use crate::{
    constants::API_TITLE,
    types::{GradeReport, GradeRequest, RubricBreakdownItem},
};

/// Swagger UI page; it fetches the document from `/api-docs/openapi.json`.
pub const SWAGGER_UI_HTML: &str = include_str!("assets/swagger_ui.html");

/// Failure loading the OpenAPI document from disk.
#[derive(thiserror::Error, Debug)]
pub enum SpecLoadError {
    /// The file could not be read.
    #[error("could not read API documentation from {}", .path.display())]
    Read {
        /// File that was requested.
        path:   PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not an OpenAPI 3.1 JSON document.
    #[error("{} is not a valid OpenAPI 3.1 JSON document", .path.display())]
    Parse {
        /// File that was requested.
        path:   PathBuf,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Reads and parses the OpenAPI document at `path`.
pub fn load_spec(path: &Path) -> Result<OpenApi, SpecLoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SpecLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&contents).map_err(|source| SpecLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Schemas derived from the request and report types.
pub fn schema_components() -> Components {
    ComponentsBuilder::new()
        .schema(GradeRequest::name(), GradeRequest::schema())
        .schema(GradeReport::name(), GradeReport::schema())
        .schema(RubricBreakdownItem::name(), RubricBreakdownItem::schema())
        .build()
}

/// The minimal document served when the real one cannot be loaded.
///
/// It has no paths, but still carries the derived schemas.
pub fn default_spec() -> OpenApi {
    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title(API_TITLE)
                .version(env!("CARGO_PKG_VERSION"))
                .build(),
        )
        .components(Some(schema_components()))
        .build()
}

/// Loads the document at `path`, falling back to [`default_spec`].
///
/// Never fails: a missing or broken file only costs the docs page its
/// content, so it is logged as a warning.
pub fn resolve_spec(path: &Path) -> OpenApi {
    match load_spec(path) {
        Ok(spec) => {
            tracing::info!("Loaded API documentation from {}", path.display());
            spec
        }
        Err(e) => {
            tracing::warn!(error = ?e, "{e}; serving a minimal API description instead");
            default_spec()
        }
    }
}
