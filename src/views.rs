//! Serving pages: resolve the request path, gather the listing the page type
//! needs, and render its template.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use tera::Tera;
use tracing::debug;
use url::Url;

use crate::archive::{filter_posts, ArchiveFilter};
use crate::compat::MyQuery;
use crate::config::SiteConfig;
use crate::model::network::{ListingQuery, PageContext, TemplateContext};
use crate::model::ApiError;
use crate::page::{Page, PageType};
use crate::paginate::paginate;
use crate::routing::{route, split_archive, Resolved, RouteTables, View};
use crate::site::Site;

#[derive(Clone)]
pub struct AppState {
    pub site: Arc<Site>,
    pub tables: Arc<RouteTables>,
    pub tera: Arc<Tera>,
    pub config: Arc<SiteConfig>,
    pub proto_host: Url,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_root))
        .route("/*path", get(serve_path))
        .with_state(state)
}

async fn serve_root(
    State(state): State<AppState>,
    MyQuery(query): MyQuery<ListingQuery>,
) -> Result<axum::response::Html<String>, ApiError> {
    render_request(&state, "/", &query).map(axum::response::Html)
}

async fn serve_path(
    State(state): State<AppState>,
    Path(path): Path<String>,
    MyQuery(query): MyQuery<ListingQuery>,
) -> Result<axum::response::Html<String>, ApiError> {
    render_request(&state, &format!("/{}", path), &query).map(axum::response::Html)
}

/// Render the page at an absolute request path.
pub fn render_request(
    state: &AppState,
    request_path: &str,
    query: &ListingQuery,
) -> Result<String, ApiError> {
    let base_path = state.site.base_path();
    let relative = format!("{}/", request_path.trim_end_matches('/'));
    let relative = relative
        .strip_prefix(base_path)
        .ok_or_else(|| ApiError::not_found(request_path))?;

    let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();

    if let Some((prefix, kind, args)) = split_archive(&segments) {
        if let Some(index) = blog_index_at(&state.site, prefix) {
            debug!(page = %index.id, kind, "legacy archive request");
            let filter = ArchiveFilter::parse(kind, args)?;
            return render_blog_index(state, index, Some(filter), query);
        }
    }

    let resolved = route(&state.site, &state.tables, &segments)?;
    render_resolved(state, resolved, query)
}

/// Live blog index reached by following `segments` slug by slug.
fn blog_index_at<'a>(site: &'a Site, segments: &[&str]) -> Option<&'a Page> {
    let mut page = site.root_page()?;
    for segment in segments {
        page = site
            .tree
            .children(page)
            .into_iter()
            .find(|child| child.slug == *segment)?;
    }
    (page.live && page.page_type() == PageType::BlogIndex).then_some(page)
}

fn param<'p>(resolved: &'p Resolved<'_>, name: &str) -> Result<&'p str, ApiError> {
    resolved
        .params
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| ApiError::not_found(format!("missing route parameter {}", name)))
}

pub fn render_resolved(
    state: &AppState,
    resolved: Resolved<'_>,
    query: &ListingQuery,
) -> Result<String, ApiError> {
    let page = resolved.page;

    match (page.page_type(), resolved.view) {
        (PageType::BlogIndex, View::Serve) => {
            let filter = match (&query.tag, &query.author) {
                (Some(tag), _) => Some(ArchiveFilter::Tag(tag.clone())),
                (None, Some(author)) => Some(ArchiveFilter::Author(author.clone())),
                (None, None) => None,
            };
            render_blog_index(state, page, filter, query)
        }

        (PageType::BlogIndex, View::ByAuthor) => {
            let filter = ArchiveFilter::parse("author", &[param(&resolved, "author")?])?;
            render_blog_index(state, page, Some(filter), query)
        }

        (PageType::BlogIndex, View::ByTag) => {
            let filter = ArchiveFilter::parse("tag", &[param(&resolved, "tag")?])?;
            render_blog_index(state, page, Some(filter), query)
        }

        (PageType::BlogIndex, View::ByDate) => {
            let filter = ArchiveFilter::date(
                param(&resolved, "year")?,
                resolved.params.get("month").map(String::as_str),
                resolved.params.get("day").map(String::as_str),
            )?;
            render_blog_index(state, page, Some(filter), query)
        }

        (PageType::Index, View::Serve) => {
            let site = &state.site;
            let children = site.tree.index_children(page);
            let pages = paginate(children, state.config.items_per_page, query.page.as_deref())
                .map(|child| PageContext::new(site, child));

            let mut context = base_context(state, page, query);
            context.pages = Some(pages);
            render(state, page, &context)
        }

        (PageType::RichText | PageType::Home | PageType::BlogPost, View::Serve) => {
            let mut context = base_context(state, page, query);
            let index = if page.is_blog_post() {
                state.site.tree.blog_index(page)
            } else {
                state.site.tree.index_page(page)
            };
            context.index_page = index.map(|index| PageContext::new(&state.site, index));
            render(state, page, &context)
        }

        (ty, view) => Err(ApiError::not_found(format!(
            "{} pages have no {:?} view",
            ty.as_str(),
            view
        ))),
    }
}

fn render_blog_index(
    state: &AppState,
    page: &Page,
    filter: Option<ArchiveFilter>,
    query: &ListingQuery,
) -> Result<String, ApiError> {
    let site = &state.site;
    let mut posts = site.tree.posts(page);
    if let Some(filter) = &filter {
        posts = filter_posts(posts, filter);
    }

    let posts = paginate(posts, state.config.items_per_page, query.page.as_deref())
        .map(|post| PageContext::new(site, post));

    let mut context = base_context(state, page, query);
    context.posts = Some(posts);
    context.filter = filter.as_ref().map(ArchiveFilter::context);
    context.active_months = site.tree.active_months(page);
    render(state, page, &context)
}

fn base_context<'a>(state: &'a AppState, page: &'a Page, query: &ListingQuery) -> TemplateContext<'a> {
    let site = &state.site;
    let canonical_url = site
        .url(page)
        .and_then(|url| state.proto_host.join(&url).ok())
        .map(String::from);

    TemplateContext {
        page: PageContext::new(site, page),
        site_root: site.root_page().map(|root| PageContext::new(site, root)),
        canonical_url,
        pages: None,
        posts: None,
        filter: None,
        active_months: Vec::new(),
        index_page: None,
        request_query: query
            .pairs()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    }
}

/// `pages/<url path>.html` when it exists, otherwise the page type's template.
pub fn template_name(state: &AppState, page: &Page) -> String {
    if let Some(url) = state.site.url(page) {
        let relative = url
            .strip_prefix(state.site.base_path())
            .unwrap_or(&url)
            .trim_end_matches('/');
        let name = if relative.is_empty() {
            "pages/index.html".to_string()
        } else {
            format!("pages/{}.html", relative)
        };
        if state.tera.get_template_names().any(|known| known == name) {
            return name;
        }
    }
    page.page_type().template()
}

fn render(state: &AppState, page: &Page, context: &TemplateContext<'_>) -> Result<String, ApiError> {
    let name = template_name(state, page);
    debug!(page = %page.id, template = %name, "rendering");
    let context = tera::Context::from_serialize(context)?;
    Ok(state.tera.render(&name, &context)?)
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::tree::tests::{blog_index, index, post, rich};
    use crate::tree::PageTree;

    const LISTING: &str = "{{ page.title }}|{% if filter_type %}{{ filter_type }}={{ filter_label }}|{% endif %}\
        {{ posts.number }}/{{ posts.num_pages }}|\
        {% for post in posts.items %}{{ post.title }},{% endfor %}";

    fn state() -> AppState {
        state_at("/")
    }

    fn state_at(base_path: &str) -> AppState {
        let mut tree = PageTree::new();
        let home = tree.add_root(rich("Home")).unwrap();
        let blog = tree.add_child(home, blog_index("Blog")).unwrap();
        for day in 1..=25u8 {
            let date = date!(2020 - 01 - 01).replace_day(day).unwrap();
            let tags: &[&str] = if day % 5 == 0 { &["five"] } else { &[] };
            let owner = if day <= 3 { "alice" } else { "bob" };
            tree.add_child(blog, post(&format!("P{}", day), date, tags).owner(owner))
                .unwrap();
        }
        tree.add_child(blog, post("March", date!(2020 - 03 - 10), &[]))
            .unwrap();
        let docs = tree.add_child(home, index("Docs")).unwrap();
        tree.add_child(docs, rich("Guide")).unwrap();

        let site = Arc::new(Site::new(tree, Some(home), base_path));
        let tables = Arc::new(RouteTables::standard().unwrap());
        let config = SiteConfig::default();

        let mut tera = Tera::default();
        crate::templatetags::register(&mut tera, site.clone(), tables.clone(), &config);
        tera.add_raw_templates(vec![
            ("blog_index_page.html", LISTING),
            (
                "index_page.html",
                "{{ page.title }}|{% for child in pages.items %}{{ child.title }},{% endfor %}",
            ),
            (
                "rich_text_page.html",
                "{{ page.title }}|{% if index_page %}{{ index_page.title }}{% endif %}",
            ),
            ("blog_post.html", "post {{ page.title }} in {{ index_page.title }}"),
            ("pages/index.html", "home override"),
        ])
        .unwrap();

        AppState {
            site,
            tables,
            tera: Arc::new(tera),
            config: Arc::new(config),
            proto_host: Url::parse("https://example.com").unwrap(),
        }
    }

    fn get(state: &AppState, path: &str, query: &str) -> Result<String, ApiError> {
        let query: ListingQuery = serde_urlencoded::from_str(query).unwrap();
        render_request(state, path, &query)
    }

    #[test]
    fn blog_index_paginates_posts() {
        let state = state();
        let first = get(&state, "/blog/", "").unwrap();
        assert!(first.starts_with("Blog|1/3|March,P25,P24,"), "{}", first);

        let last = get(&state, "/blog/", "page=99").unwrap();
        assert_eq!(last, "Blog|3/3|P6,P5,P4,P3,P2,P1,");

        let junk = get(&state, "/blog/", "page=abc").unwrap();
        assert_eq!(junk, first);
    }

    #[test]
    fn date_archives_accept_month_names() {
        let state = state();
        let by_name = get(&state, "/blog/date/2020/march/", "").unwrap();
        let by_number = get(&state, "/blog/date/2020/3/", "").unwrap();
        assert_eq!(by_name, "Blog|date=March 2020|1/1|March,");
        assert_eq!(by_name, by_number);

        let err = get(&state, "/blog/date/2020/13/", "").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn tag_and_author_archives() {
        let state = state();
        assert_eq!(
            get(&state, "/blog/tag/five/", "").unwrap(),
            "Blog|tag=Five|1/1|P25,P20,P15,P10,P5,"
        );
        assert_eq!(
            get(&state, "/blog/author/alice/", "").unwrap(),
            "Blog|author=Alice|1/1|P3,P2,P1,"
        );
        assert_eq!(
            get(&state, "/blog/", "tag=five").unwrap(),
            "Blog|tag=Five|1/1|P25,P20,P15,P10,P5,"
        );
    }

    #[test]
    fn legacy_archive_paths() {
        let state = state();
        assert_eq!(
            get(&state, "/blog/archives/date/2020/3/", "").unwrap(),
            "Blog|date=March 2020|1/1|March,"
        );
        assert!(get(&state, "/blog/archives/category/x/", "")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn pages_render_their_type_template() {
        let state = state();
        assert_eq!(get(&state, "/docs/", "").unwrap(), "Docs|Guide,");
        assert_eq!(get(&state, "/docs/guide/", "").unwrap(), "Guide|Docs");
        assert_eq!(get(&state, "/blog/p1/", "").unwrap(), "post P1 in Blog");
        assert_eq!(get(&state, "/", "").unwrap(), "home override");
    }

    #[test]
    fn unknown_suffix_serves_deepest_live_page() {
        let state = state();
        assert_eq!(get(&state, "/docs/missing/", "").unwrap(), "Docs|Guide,");
        assert_eq!(get(&state, "/blog/p1/garbage/", "").unwrap(), "post P1 in Blog");
        assert_eq!(get(&state, "/nowhere/", "").unwrap(), "home override");
    }

    #[test]
    fn paths_outside_base_path_are_not_found() {
        let state = state_at("/cms/");
        assert!(get(&state, "/elsewhere/", "").unwrap_err().is_not_found());
        assert_eq!(get(&state, "/cms/docs/", "").unwrap(), "Docs|Guide,");
    }

    #[test]
    fn unmatched_blog_suffix_serves_blog() {
        let state = state();
        let page = get(&state, "/blog/not/a/route/", "").unwrap();
        assert!(page.starts_with("Blog|1/3|"), "{}", page);
    }
}
