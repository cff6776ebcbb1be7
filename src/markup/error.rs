use thiserror::Error;

/// Parse-time errors for voice markup (spec §4.3: "unknown attribute on any
/// verb is a hard error; unrecognized verb is a hard error").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("malformed xml: {0}")]
    Malformed(String),

    #[error("unknown verb <{0}>")]
    UnknownVerb(String),

    #[error("unknown attribute `{attr}` on <{verb}>")]
    UnknownAttribute { verb: String, attr: String },

    #[error("invalid value `{value}` for attribute `{attr}` on <{verb}>")]
    InvalidAttributeValue {
        verb: String,
        attr: String,
        value: String,
    },

    #[error("<{child}> is not allowed inside <{parent}>")]
    NestedVerbNotAllowed { parent: String, child: String },

    #[error("<{0}> requires text content")]
    MissingContent(String),

    #[error("document root must be <Response>, found <{0}>")]
    WrongRoot(String),

    #[error("xml writer error: {0}")]
    Writer(String),
}

impl From<xml::writer::Error> for MarkupError {
    fn from(e: xml::writer::Error) -> Self {
        MarkupError::Writer(e.to_string())
    }
}

pub type MarkupResult<T> = Result<T, MarkupError>;
