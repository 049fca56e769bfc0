//! Materialized-path page tree.
//!
//! Every page's `path` is the concatenation of fixed-width base-36 steps, one
//! per level, so a child's path is its parent's path plus one step and the
//! lexicographic order of paths is the pre-order of the tree. Ancestor and
//! descendant queries are prefix operations over a sorted map of paths.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use time::Date;

use crate::link::{Document, DocumentId};
use crate::page::{NewPage, Page, PageId, PageType};

pub const STEP_LEN: usize = 4;
const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("page {0} does not exist")]
    MissingPage(PageId),
    #[error("page id {0} is used twice")]
    DuplicateId(PageId),
    #[error("invalid tree path {0:?}")]
    InvalidPath(String),
    #[error("tree path {0:?} is used twice")]
    DuplicatePath(String),
    #[error("page at {0:?} has no parent")]
    Orphan(String),
    #[error("depth {depth} does not match path {path:?}")]
    DepthMismatch { path: String, depth: usize },
    #[error("no room for another child under {0:?}")]
    Overflow(String),
}

fn encode_step(mut n: u32) -> Option<String> {
    let max = (ALPHABET.len() as u32).pow(STEP_LEN as u32);
    if n >= max {
        return None;
    }
    let mut step = [b'0'; STEP_LEN];
    for slot in step.iter_mut().rev() {
        *slot = ALPHABET[(n % ALPHABET.len() as u32) as usize];
        n /= ALPHABET.len() as u32;
    }
    Some(step.iter().map(|&b| b as char).collect())
}

fn decode_step(step: &str) -> Option<u32> {
    if step.len() != STEP_LEN {
        return None;
    }
    step.bytes().try_fold(0u32, |acc, b| {
        let digit = ALPHABET.iter().position(|&a| a == b)?;
        Some(acc * ALPHABET.len() as u32 + digit as u32)
    })
}

fn valid_path(path: &str) -> bool {
    !path.is_empty()
        && path.len() % STEP_LEN == 0
        && path.bytes().all(|b| ALPHABET.contains(&b))
}

#[derive(Debug, Default)]
pub struct PageTree {
    pages: HashMap<PageId, Page>,
    by_path: BTreeMap<String, PageId>,
    documents: HashMap<DocumentId, Document>,
    next_id: i64,
}

impl PageTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Insert a page that already carries its id and tree position. Parents
    /// must be inserted before their children.
    pub fn insert(&mut self, page: Page) -> Result<(), TreeError> {
        if !valid_path(&page.path) {
            return Err(TreeError::InvalidPath(page.path));
        }
        if page.depth != page.path.len() / STEP_LEN {
            return Err(TreeError::DepthMismatch {
                path: page.path,
                depth: page.depth,
            });
        }
        if self.pages.contains_key(&page.id) {
            return Err(TreeError::DuplicateId(page.id));
        }
        if self.by_path.contains_key(&page.path) {
            return Err(TreeError::DuplicatePath(page.path));
        }
        if page.depth > 1 && !self.by_path.contains_key(parent_path(&page.path)) {
            return Err(TreeError::Orphan(page.path));
        }

        self.next_id = self.next_id.max(page.id.0 + 1);
        self.by_path.insert(page.path.clone(), page.id);
        self.pages.insert(page.id, page);
        Ok(())
    }

    pub fn add_root(&mut self, new: NewPage) -> Result<PageId, TreeError> {
        let last = self.roots().last().map(|page| page.path.clone());
        let path = next_path("", last.as_deref())?;
        self.place(new, path)
    }

    pub fn add_child(&mut self, parent: PageId, new: NewPage) -> Result<PageId, TreeError> {
        let parent = self.get(parent).ok_or(TreeError::MissingPage(parent))?;
        let last = self.children(parent).last().map(|page| page.path.clone());
        let path = next_path(&parent.path, last.as_deref())?;
        self.place(new, path)
    }

    fn place(&mut self, new: NewPage, path: String) -> Result<PageId, TreeError> {
        let id = PageId(self.next_id.max(1));
        let mut related_links = new.related_links;
        related_links.sort_by_key(|link| link.sort_order);
        let mut attachments = new.attachments;
        attachments.sort_by_key(|attachment| attachment.sort_order);

        self.insert(Page {
            id,
            depth: path.len() / STEP_LEN,
            path,
            title: new.title,
            slug: new.slug,
            live: new.live,
            show_in_menus: new.show_in_menus,
            owner: new.owner,
            kind: new.kind,
            related_links,
            attachments,
        })?;
        Ok(id)
    }

    pub fn add_document(&mut self, document: Document) {
        self.documents.insert(document.id, document);
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn get(&self, id: PageId) -> Option<&Page> {
        self.pages.get(&id)
    }

    pub fn by_path(&self, path: &str) -> Option<&Page> {
        self.by_path.get(path).and_then(|id| self.pages.get(id))
    }

    /// All pages in tree order.
    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.by_path.values().filter_map(|id| self.pages.get(id))
    }

    pub fn roots(&self) -> Vec<&Page> {
        self.iter().filter(|page| page.depth == 1).collect()
    }

    pub fn parent(&self, page: &Page) -> Option<&Page> {
        if page.depth <= 1 {
            return None;
        }
        self.by_path(parent_path(&page.path))
    }

    /// Strict ancestors, root first.
    pub fn ancestors(&self, page: &Page) -> Vec<&Page> {
        (1..page.depth)
            .filter_map(|depth| self.by_path(&page.path[..depth * STEP_LEN]))
            .collect()
    }

    /// Strict descendants in tree order.
    pub fn descendants<'a>(&'a self, page: &'a Page) -> impl Iterator<Item = &'a Page> + 'a {
        self.by_path
            .range::<str, _>((Bound::Excluded(page.path.as_str()), Bound::Unbounded))
            .take_while(move |(path, _)| path.starts_with(&page.path))
            .filter_map(|(_, id)| self.pages.get(id))
    }

    pub fn children<'a>(&'a self, page: &'a Page) -> Vec<&'a Page> {
        self.descendants(page)
            .filter(|child| child.depth == page.depth + 1)
            .collect()
    }

    /// Pages sharing the parent of `page`, including `page` itself.
    pub fn siblings<'a>(&'a self, page: &'a Page) -> Vec<&'a Page> {
        match self.parent(page) {
            Some(parent) => self.children(parent),
            None => self.roots(),
        }
    }

    pub fn is_leaf(&self, page: &Page) -> bool {
        self.descendants(page).next().is_none()
    }

    pub fn is_descendant_of(&self, page: &Page, ancestor: &Page) -> bool {
        page.depth > ancestor.depth && page.path.starts_with(&ancestor.path)
    }

    pub fn first_with_slug(&self, slug: &str) -> Option<&Page> {
        self.iter().find(|page| page.slug == slug)
    }

    /// Live rich text pages anywhere below an index page.
    pub fn index_children<'a>(&'a self, index: &'a Page) -> Vec<&'a Page> {
        self.descendants(index)
            .filter(|page| page.live && page.page_type().has_content())
            .collect()
    }

    /// Nearest ancestor that is an index page. When no ancestor is one, the
    /// first index page of the whole tree stands in.
    pub fn index_page(&self, page: &Page) -> Option<&Page> {
        self.nearest_ancestor(page, |ty| ty.is_index())
    }

    /// Nearest blog index above a post, with the same fallback as
    /// [`PageTree::index_page`].
    pub fn blog_index(&self, page: &Page) -> Option<&Page> {
        self.nearest_ancestor(page, |ty| ty == PageType::BlogIndex)
    }

    fn nearest_ancestor(&self, page: &Page, wanted: impl Fn(PageType) -> bool) -> Option<&Page> {
        self.ancestors(page)
            .into_iter()
            .rev()
            .find(|ancestor| wanted(ancestor.page_type()))
            .or_else(|| self.iter().find(|candidate| wanted(candidate.page_type())))
    }

    /// Live blog posts below `index`, newest first.
    pub fn posts<'a>(&'a self, index: &'a Page) -> Vec<&'a Page> {
        let mut posts: Vec<_> = self
            .descendants(index)
            .filter(|page| page.live && page.is_blog_post())
            .collect();
        sort_newest_first(&mut posts);
        posts
    }

    /// First day of every month that has a post, newest first.
    pub fn active_months(&self, index: &Page) -> Vec<Date> {
        let mut months: Vec<Date> = self
            .posts(index)
            .iter()
            .filter_map(|post| post.date())
            .filter_map(|date| date.replace_day(1).ok())
            .collect();
        months.dedup();
        months
    }

    /// Live blog posts anywhere in the tree, newest first.
    pub fn all_posts(&self) -> Vec<&Page> {
        let mut posts: Vec<_> = self
            .iter()
            .filter(|page| page.live && page.is_blog_post())
            .collect();
        sort_newest_first(&mut posts);
        posts
    }
}

pub fn sort_newest_first(posts: &mut [&Page]) {
    posts.sort_by(|a, b| b.date().cmp(&a.date()));
}

fn parent_path(path: &str) -> &str {
    &path[..path.len().saturating_sub(STEP_LEN)]
}

fn next_path(parent: &str, last_sibling: Option<&str>) -> Result<String, TreeError> {
    let next = match last_sibling {
        Some(last) => decode_step(&last[last.len() - STEP_LEN..])
            .ok_or_else(|| TreeError::InvalidPath(last.to_string()))?
            + 1,
        None => 1,
    };
    let step = encode_step(next).ok_or_else(|| TreeError::Overflow(parent.to_string()))?;
    Ok(format!("{}{}", parent, step))
}

#[cfg(test)]
pub(crate) mod tests {
    use indexmap::IndexSet;
    use time::macros::date;

    use super::*;
    use crate::page::{Html, PageKind};

    pub(crate) fn rich(title: &str) -> NewPage {
        NewPage::new(
            title,
            PageKind::RichText {
                content: Html(format!("<p>{}</p>", title)),
            },
        )
    }

    pub(crate) fn index(title: &str) -> NewPage {
        NewPage::new(
            title,
            PageKind::Index {
                introduction: Html::default(),
            },
        )
    }

    pub(crate) fn blog_index(title: &str) -> NewPage {
        NewPage::new(
            title,
            PageKind::BlogIndex {
                introduction: Html::default(),
            },
        )
    }

    pub(crate) fn post(title: &str, date: Date, tags: &[&str]) -> NewPage {
        NewPage::new(
            title,
            PageKind::BlogPost {
                content: Html::default(),
                date,
                tags: tags.iter().map(|tag| tag.to_string()).collect::<IndexSet<_>>(),
            },
        )
    }

    #[test]
    fn steps_encode_base36() {
        assert_eq!(encode_step(1).as_deref(), Some("0001"));
        assert_eq!(encode_step(36).as_deref(), Some("0010"));
        assert_eq!(decode_step("000Z"), Some(35));
        assert_eq!(decode_step("00a1"), None);
        assert_eq!(encode_step(36u32.pow(4)), None);
    }

    #[test]
    fn child_paths_extend_parent() {
        let mut tree = PageTree::new();
        let root = tree.add_root(rich("Root")).unwrap();
        let a = tree.add_child(root, rich("A")).unwrap();
        let b = tree.add_child(root, rich("B")).unwrap();
        let a1 = tree.add_child(a, rich("A1")).unwrap();

        assert_eq!(tree.get(root).unwrap().path, "0001");
        assert_eq!(tree.get(a).unwrap().path, "00010001");
        assert_eq!(tree.get(b).unwrap().path, "00010002");
        assert_eq!(tree.get(a1).unwrap().path, "000100010001");
        assert_eq!(tree.get(a1).unwrap().depth, 3);

        let order: Vec<_> = tree.iter().map(|page| page.title.as_str()).collect();
        assert_eq!(order, ["Root", "A", "A1", "B"]);
    }

    #[test]
    fn ancestors_children_siblings() {
        let mut tree = PageTree::new();
        let root = tree.add_root(rich("Root")).unwrap();
        let a = tree.add_child(root, rich("A")).unwrap();
        let b = tree.add_child(root, rich("B")).unwrap();
        let a1 = tree.add_child(a, rich("A1")).unwrap();

        let a1 = tree.get(a1).unwrap();
        let ancestors: Vec<_> = tree.ancestors(a1).iter().map(|p| p.id).collect();
        assert_eq!(ancestors, [root, a]);

        let root_page = tree.get(root).unwrap();
        let children: Vec<_> = tree.children(root_page).iter().map(|p| p.id).collect();
        assert_eq!(children, [a, b]);
        assert_eq!(tree.descendants(root_page).count(), 3);

        let siblings: Vec<_> = tree
            .siblings(tree.get(b).unwrap())
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(siblings, [a, b]);
        assert!(tree.is_leaf(a1));
        assert!(tree.is_descendant_of(a1, root_page));
        assert!(!tree.is_descendant_of(root_page, root_page));
    }

    #[test]
    fn insert_rejects_orphans_and_bad_paths() {
        let mut tree = PageTree::new();
        let root = tree.add_root(rich("Root")).unwrap();
        let mut page = tree.get(root).unwrap().clone();

        page.id = PageId(50);
        page.path = "00020001".to_string();
        page.depth = 2;
        assert!(matches!(tree.insert(page.clone()), Err(TreeError::Orphan(_))));

        page.path = "0001x".to_string();
        assert!(matches!(
            tree.insert(page.clone()),
            Err(TreeError::InvalidPath(_))
        ));

        page.path = "00010009".to_string();
        page.depth = 3;
        assert!(matches!(
            tree.insert(page),
            Err(TreeError::DepthMismatch { .. })
        ));
    }

    #[test]
    fn index_page_is_nearest_index_ancestor() {
        let mut tree = PageTree::new();
        let root = tree.add_root(rich("Root")).unwrap();
        let outer = tree.add_child(root, index("Outer")).unwrap();
        let inner = tree.add_child(outer, index("Inner")).unwrap();
        let l1 = tree.add_child(inner, rich("L1")).unwrap();
        let l2 = tree.add_child(l1, rich("L2")).unwrap();
        let l3 = tree.add_child(l2, rich("L3")).unwrap();

        let found = tree.index_page(tree.get(l3).unwrap()).unwrap();
        assert_eq!(found.id, inner);
    }

    #[test]
    fn index_page_falls_back_to_first_index() {
        let mut tree = PageTree::new();
        let root = tree.add_root(rich("Root")).unwrap();
        let lonely = tree.add_child(root, rich("Lonely")).unwrap();
        let first = tree.add_child(root, index("First")).unwrap();
        tree.add_child(root, index("Second")).unwrap();

        let found = tree.index_page(tree.get(lonely).unwrap()).unwrap();
        assert_eq!(found.id, first);
    }

    #[test]
    fn index_page_without_any_index_is_none() {
        let mut tree = PageTree::new();
        let root = tree.add_root(rich("Root")).unwrap();
        let page = tree.add_child(root, rich("Page")).unwrap();

        assert!(tree.index_page(tree.get(page).unwrap()).is_none());
    }

    #[test]
    fn index_children_are_live_rich_text_descendants() {
        let mut tree = PageTree::new();
        let index_id = tree.add_root(index("Index")).unwrap();
        let child = tree.add_child(index_id, rich("Child")).unwrap();
        tree.add_child(index_id, rich("Draft").draft()).unwrap();
        let sub_index = tree.add_child(index_id, index("Sub")).unwrap();
        let grandchild = tree.add_child(sub_index, rich("Grandchild")).unwrap();

        let children: Vec<_> = tree
            .index_children(tree.get(index_id).unwrap())
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(children, [child, grandchild]);
    }

    #[test]
    fn posts_and_active_months() {
        let mut tree = PageTree::new();
        let blog = tree.add_root(blog_index("Blog")).unwrap();
        let old = tree
            .add_child(blog, post("Old", date!(2019 - 12 - 24), &[]))
            .unwrap();
        let new = tree
            .add_child(blog, post("New", date!(2020 - 03 - 15), &[]))
            .unwrap();
        let mid = tree
            .add_child(blog, post("Mid", date!(2020 - 03 - 01), &[]))
            .unwrap();
        tree.add_child(blog, post("Hidden", date!(2021 - 01 - 01), &[]).draft())
            .unwrap();

        let blog = tree.get(blog).unwrap();
        let posts: Vec<_> = tree.posts(blog).iter().map(|p| p.id).collect();
        assert_eq!(posts, [new, mid, old]);
        assert_eq!(
            tree.active_months(blog),
            [date!(2020 - 03 - 01), date!(2019 - 12 - 01)]
        );
        assert_eq!(tree.blog_index(tree.get(old).unwrap()).unwrap().id, blog.id);
    }
}
