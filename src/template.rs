use std::collections::HashMap;

use crate::errors::Result;

/// Text templating applied to the raw bytes before yaml parsing. The template
/// language itself lives outside this crate; the pipeline only needs the
/// bytes-to-bytes seam.
pub trait TemplateEngine: Send + Sync {
    fn apply(&self, contents: &[u8], variables: &HashMap<String, String>) -> Result<Vec<u8>>;
}

/// Passthrough engine used when no template language is wired in.
pub struct NoopTemplate;

impl TemplateEngine for NoopTemplate {
    fn apply(&self, contents: &[u8], _variables: &HashMap<String, String>) -> Result<Vec<u8>> {
        Ok(contents.to_vec())
    }
}
