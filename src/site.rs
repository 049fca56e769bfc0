use tracing::warn;

use crate::link::{DocumentId, LinkTargets};
use crate::page::{Page, PageId};
use crate::tree::PageTree;

/// A page tree served from one root page under a base path.
#[derive(Debug)]
pub struct Site {
    pub tree: PageTree,
    pub root: Option<PageId>,
    base_path: String,
}

impl Site {
    pub fn new(tree: PageTree, root: Option<PageId>, base_path: &str) -> Self {
        let trimmed = base_path.trim_matches('/');
        let base_path = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        };

        Site {
            tree,
            root,
            base_path,
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn root_page(&self) -> Option<&Page> {
        self.root.and_then(|root| self.tree.get(root))
    }

    /// URL of a page, or `None` when the page is not served by this site.
    pub fn url(&self, page: &Page) -> Option<String> {
        let root = self.root_page()?;
        if root.id == page.id {
            return Some(self.base_path.clone());
        }
        if !self.tree.is_descendant_of(page, root) {
            return None;
        }

        let mut url = self.base_path.clone();
        for ancestor in self.tree.ancestors(page) {
            if ancestor.depth > root.depth {
                url.push_str(&ancestor.slug);
                url.push('/');
            }
        }
        url.push_str(&page.slug);
        url.push('/');
        Some(url)
    }

    pub fn url_of(&self, id: PageId) -> Option<String> {
        self.tree.get(id).and_then(|page| self.url(page))
    }
}

impl LinkTargets for Site {
    fn page_url(&self, page: PageId) -> Option<String> {
        let url = self.url_of(page);
        if url.is_none() {
            warn!(%page, "link target page has no url");
        }
        url
    }

    fn document_url(&self, document: DocumentId) -> Option<String> {
        let url = self
            .tree
            .document(document)
            .map(|document| document.url(&self.base_path));
        if url.is_none() {
            warn!(document = document.0, "link target document is missing");
        }
        url
    }
}
