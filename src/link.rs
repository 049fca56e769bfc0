use serde::Serialize;
use url::Url;

use crate::page::PageId;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub file: String,
}

impl Document {
    pub fn url(&self, base_path: &str) -> String {
        format!("{}documents/{}/{}", base_path, self.id.0, self.file)
    }
}

/// Whatever can turn page and document references into URLs.
pub trait LinkTargets {
    fn page_url(&self, page: PageId) -> Option<String>;
    fn document_url(&self, document: DocumentId) -> Option<String>;
}

/// A link to an internal page, a document, or an external URL.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct Link {
    pub page: Option<PageId>,
    pub document: Option<DocumentId>,
    pub external: Option<Url>,
}

impl Link {
    pub fn external(url: Url) -> Self {
        Link {
            external: Some(url),
            ..Default::default()
        }
    }

    pub fn page(page: PageId) -> Self {
        Link {
            page: Some(page),
            ..Default::default()
        }
    }

    pub fn document(document: DocumentId) -> Self {
        Link {
            document: Some(document),
            ..Default::default()
        }
    }

    /// Internal page first, then document, then the external URL.
    pub fn resolve(&self, targets: &impl LinkTargets) -> Option<String> {
        self.page
            .and_then(|page| targets.page_url(page))
            .filter(|url| !url.is_empty())
            .or_else(|| {
                self.document
                    .and_then(|document| targets.document_url(document))
                    .filter(|url| !url.is_empty())
            })
            .or_else(|| self.external.as_ref().map(Url::to_string))
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RelatedLink {
    pub title: String,
    pub sort_order: i64,
    pub link: Link,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Attachment {
    pub title: String,
    pub sort_order: i64,
    pub link: Link,
}

/// A related link or attachment with its link already resolved, for templates.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ResolvedLink {
    pub title: String,
    pub url: Option<String>,
}

impl RelatedLink {
    pub fn resolved(&self, targets: &impl LinkTargets) -> ResolvedLink {
        ResolvedLink {
            title: self.title.clone(),
            url: self.link.resolve(targets),
        }
    }
}

impl Attachment {
    pub fn resolved(&self, targets: &impl LinkTargets) -> ResolvedLink {
        ResolvedLink {
            title: self.title.clone(),
            url: self.link.resolve(targets),
        }
    }
}
