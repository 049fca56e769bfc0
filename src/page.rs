use indexmap::IndexSet;
use serde::Serialize;
use time::Date;

use crate::link::{Attachment, RelatedLink};

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Html(pub String);

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct PageId(pub i64);

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The specific kind of a page together with the fields that kind adds.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageKind {
    Index {
        introduction: Html,
    },
    RichText {
        content: Html,
    },
    Home {
        content: Html,
    },
    BlogIndex {
        introduction: Html,
    },
    BlogPost {
        content: Html,
        date: Date,
        tags: IndexSet<String>,
    },
}

/// Field-less tag of a [`PageKind`], used for route tables and capability checks.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Index,
    RichText,
    Home,
    BlogIndex,
    BlogPost,
}

impl PageType {
    pub const ALL: [PageType; 5] = [
        PageType::Index,
        PageType::RichText,
        PageType::Home,
        PageType::BlogIndex,
        PageType::BlogPost,
    ];

    /// Index pages exist to list the pages below them.
    pub fn is_index(self) -> bool {
        matches!(self, PageType::Index | PageType::BlogIndex)
    }

    /// Pages with a rich text body.
    pub fn has_content(self) -> bool {
        matches!(
            self,
            PageType::RichText | PageType::Home | PageType::BlogPost
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageType::Index => "index_page",
            PageType::RichText => "rich_text_page",
            PageType::Home => "home_page",
            PageType::BlogIndex => "blog_index_page",
            PageType::BlogPost => "blog_post",
        }
    }

    pub fn from_db(name: &str) -> Option<PageType> {
        PageType::ALL.into_iter().find(|ty| ty.as_str() == name)
    }

    pub fn template(self) -> String {
        format!("{}.html", self.as_str())
    }
}

impl PageKind {
    pub fn page_type(&self) -> PageType {
        match self {
            PageKind::Index { .. } => PageType::Index,
            PageKind::RichText { .. } => PageType::RichText,
            PageKind::Home { .. } => PageType::Home,
            PageKind::BlogIndex { .. } => PageType::BlogIndex,
            PageKind::BlogPost { .. } => PageType::BlogPost,
        }
    }

    pub fn content(&self) -> Option<&Html> {
        match self {
            PageKind::RichText { content }
            | PageKind::Home { content }
            | PageKind::BlogPost { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn introduction(&self) -> Option<&Html> {
        match self {
            PageKind::Index { introduction } | PageKind::BlogIndex { introduction } => {
                Some(introduction)
            }
            _ => None,
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct Page {
    pub id: PageId,
    pub path: String,
    pub depth: usize,
    pub title: String,
    pub slug: String,
    pub live: bool,
    pub show_in_menus: bool,
    pub owner: Option<String>,
    #[serde(flatten)]
    pub kind: PageKind,
    pub related_links: Vec<RelatedLink>,
    pub attachments: Vec<Attachment>,
}

impl Page {
    pub fn page_type(&self) -> PageType {
        self.kind.page_type()
    }

    pub fn is_index(&self) -> bool {
        self.page_type().is_index()
    }

    pub fn date(&self) -> Option<Date> {
        match &self.kind {
            PageKind::BlogPost { date, .. } => Some(*date),
            _ => None,
        }
    }

    pub fn tags(&self) -> Option<&IndexSet<String>> {
        match &self.kind {
            PageKind::BlogPost { tags, .. } => Some(tags),
            _ => None,
        }
    }

    pub fn is_blog_post(&self) -> bool {
        self.page_type() == PageType::BlogPost
    }
}

/// Fields of a page before it has a position in the tree.
#[derive(Clone, Debug)]
pub struct NewPage {
    pub title: String,
    pub slug: String,
    pub live: bool,
    pub show_in_menus: bool,
    pub owner: Option<String>,
    pub kind: PageKind,
    pub related_links: Vec<RelatedLink>,
    pub attachments: Vec<Attachment>,
}

impl NewPage {
    pub fn new(title: &str, kind: PageKind) -> Self {
        NewPage {
            title: title.to_string(),
            slug: slug::slugify(title),
            live: true,
            show_in_menus: false,
            owner: None,
            kind,
            related_links: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn slug(mut self, slug: &str) -> Self {
        self.slug = slug.to_string();
        self
    }

    pub fn draft(mut self) -> Self {
        self.live = false;
        self
    }

    pub fn in_menus(mut self) -> Self {
        self.show_in_menus = true;
        self
    }

    pub fn owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn related_link(mut self, link: RelatedLink) -> Self {
        self.related_links.push(link);
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Today's date, used when a blog post has no stored date.
pub fn today() -> Date {
    time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
        .date()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_type_names_round_trip() {
        for ty in PageType::ALL {
            assert_eq!(PageType::from_db(ty.as_str()), Some(ty));
        }
        assert_eq!(PageType::from_db("standard_page"), None);
    }

    #[test]
    fn index_capability() {
        assert!(PageType::Index.is_index());
        assert!(PageType::BlogIndex.is_index());
        assert!(!PageType::BlogPost.is_index());
        assert!(PageType::BlogPost.has_content());
        assert!(!PageType::BlogIndex.has_content());
    }

    #[test]
    fn new_page_slugifies_title() {
        let page = NewPage::new(
            "Hello World",
            PageKind::RichText {
                content: Html::default(),
            },
        );
        assert_eq!(page.slug, "hello-world");
        assert!(page.live);
    }
}
