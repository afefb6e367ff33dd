use thiserror::Error;

/// Errors from talking to a remote analysis server
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("Upload to {0} returned no Location header")]
    MissingLocation(String),

    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("Not authenticated with {0}")]
    NotAuthenticated(String),

    #[error("Module {module} is missing required parameter {param}")]
    MissingParameter { module: String, param: String },

    #[error("Workflow {workflow} has no input labelled {label}")]
    UnknownInput { workflow: String, label: String },

    #[error("Can't read input file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't render annotation table: {0}")]
    Annotation(String),

    #[error("Submission stopped after starting {started}: {cause}")]
    PartialSubmission { started: String, cause: Box<ClientError> },

    #[error("Malformed job number: {0}")]
    JobNumber(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
