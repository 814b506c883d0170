//! Documents the dispatcher operates on.

use qbridge_proto::Source;

/// The program text a command runs against, plus any sources it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub text: String,
    /// Additional sources compiled alongside the document.
    pub related: Vec<Source>,
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            related: Vec::new(),
        }
    }

    pub fn with_related(mut self, related: Vec<Source>) -> Self {
        self.related = related;
        self
    }

    /// All sources, the document itself first.
    pub fn sources(&self) -> Vec<Source> {
        std::iter::once(Source::new(&self.name, &self.text))
            .chain(self.related.iter().cloned())
            .collect()
    }

    /// File name without directories or extension, used in titles.
    pub fn stem(&self) -> &str {
        let base = self
            .name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.name);
        match base.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => base,
        }
    }
}

/// Resolves the document a command should act on.
pub trait DocumentProvider: Send + Sync {
    /// The active document, if there is one.
    fn active_document(&self) -> Option<Document>;
}

impl DocumentProvider for Option<Document> {
    fn active_document(&self) -> Option<Document> {
        self.clone()
    }
}

impl DocumentProvider for Document {
    fn active_document(&self) -> Option<Document> {
        Some(self.clone())
    }
}
