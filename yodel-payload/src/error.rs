use thiserror::Error;

/// Failure serialising one protocol's entry of the push envelope.
///
/// These never abort a render: the failing entry is logged and left empty.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("JSON serialisation failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Characters XML 1.0 can't carry, even escaped
    #[error("Character {0:?} can't be represented in XML")]
    InvalidXml(char),
}
