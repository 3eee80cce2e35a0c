use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("Unsupported content <{element}> in {part} at {path}")]
    UnsupportedContent {
        part: String,
        element: String,
        path: String,
    },

    #[error("Malformed input in {part} at {path}: {message}")]
    MalformedInput {
        part: String,
        path: String,
        message: String,
    },

    #[error("Cannot project {span} in {container}: {message}")]
    Projection {
        span: String,
        container: String,
        message: String,
    },

    #[error("Invalid settings: {message}")]
    InvalidSettings { message: String },

    #[error("Invalid OOXML package: {message}")]
    InvalidPackage { message: String },

    #[error("Missing required part '{part_path}' in {document_type} document")]
    MissingPart {
        part_path: String,
        document_type: String,
    },

    #[error("XML parsing error at {location}: {message}")]
    XmlParse { message: String, location: String },

    #[error("XML serialization error: {0}")]
    XmlWrite(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl CompareError {
    pub(crate) fn unsupported(part: &str, element: impl Into<String>, path: impl Into<String>) -> Self {
        Self::UnsupportedContent {
            part: part.to_string(),
            element: element.into(),
            path: path.into(),
        }
    }

    pub(crate) fn malformed(part: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            part: part.to_string(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn projection(
        span: impl Into<String>,
        container: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Projection {
            span: span.into(),
            container: container.into(),
            message: message.into(),
        }
    }

    /// True for the three comparer-level failures; false for boundary errors.
    pub fn is_content_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedContent { .. } | Self::MalformedInput { .. } | Self::Projection { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CompareError>;
