/// Parse and validate analysis request messages
pub mod message;
/// Find request messages on disk
pub mod read;
/// Render experiment metadata as an annotation table
pub mod metadata;
/// Bundled JSON schema for request messages
pub mod schema;
