use crate::config_annotator::{Annotator, CommentAnnotator};
use crate::config_descriptor::DescriptorTable;
use crate::config_resolver::{ResolveError, resolve_with};
use crate::config_types::ConfigDocument;

/// A document after one resolution pass, with read-only views of the result.
#[derive(Debug, Clone)]
pub struct ResolvedConfig<A = CommentAnnotator> {
    document: ConfigDocument,
    annotator: A,
}

impl<A: Annotator> ResolvedConfig<A> {
    pub fn new(table: &DescriptorTable, document: ConfigDocument, mut annotator: A) -> Result<Self, ResolveError> {
        let document = resolve_with(table, document, &mut annotator)?;
        Ok(Self { document, annotator })
    }

    pub fn as_object(&self) -> &ConfigDocument {
        &self.document
    }

    pub fn into_document(self) -> ConfigDocument {
        self.document
    }

    /// Pretty JSON, or JSON with comments explaining each filled default.
    pub fn to_text(&self, annotate: bool) -> serde_json::Result<String> {
        let rendered = self.document.to_json_pretty()?;
        if annotate {
            Ok(self.annotator.annotate(&rendered))
        } else {
            Ok(rendered)
        }
    }
}
