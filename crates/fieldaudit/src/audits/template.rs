use super::domain::TemplateSnapshot;

/// Lookup abstraction over the template store so sessions can be created
/// without binding to a concrete catalog backend.
pub trait TemplateDirectory: Send + Sync {
    /// Resolve a template into the immutable snapshot a new session copies.
    fn snapshot(&self, template_id: &str) -> Result<Option<TemplateSnapshot>, TemplateError>;
}

/// Error enumeration for template lookups.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template store unavailable: {0}")]
    Unavailable(String),
}
