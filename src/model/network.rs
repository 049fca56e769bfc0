use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::archive::FilterContext;
use crate::link::ResolvedLink;
use crate::page::Page;
use crate::paginate::Paginated;
use crate::site::Site;

/// Query string of a page request. Every value is kept as the raw string,
/// bad `page` values are handled by pagination.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct ListingQuery {
    pub page: Option<String>,
    pub tag: Option<String>,
    pub author: Option<String>,
    #[serde(flatten)]
    pub rest: IndexMap<String, String>,
}

impl ListingQuery {
    /// Every parameter in request order, the known ones first.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        [
            ("page", self.page.as_deref()),
            ("tag", self.tag.as_deref()),
            ("author", self.author.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .chain(self.rest.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .collect()
    }
}

/// A page as handed to templates: the stored fields plus its URL and
/// resolved links.
#[derive(Serialize, Debug)]
pub struct PageContext<'page> {
    #[serde(flatten)]
    pub page: &'page Page,
    pub url: Option<String>,
    pub links: Vec<ResolvedLink>,
    pub attachment_links: Vec<ResolvedLink>,
}

impl<'page> PageContext<'page> {
    pub fn new(site: &Site, page: &'page Page) -> Self {
        PageContext {
            page,
            url: site.url(page),
            links: page
                .related_links
                .iter()
                .map(|link| link.resolved(site))
                .collect(),
            attachment_links: page
                .attachments
                .iter()
                .map(|attachment| attachment.resolved(site))
                .collect(),
        }
    }
}

/// Everything a page template gets to see.
#[derive(Serialize, Debug)]
pub struct TemplateContext<'page> {
    pub page: PageContext<'page>,
    pub site_root: Option<PageContext<'page>>,
    pub canonical_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Paginated<PageContext<'page>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posts: Option<Paginated<PageContext<'page>>>,
    #[serde(flatten)]
    pub filter: Option<FilterContext>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub active_months: Vec<time::Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_page: Option<PageContext<'page>>,
    pub request_query: Vec<(String, String)>,
}
