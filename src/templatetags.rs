//! Read-only projections of the page tree for templates: menus, breadcrumbs,
//! latest posts and URL helpers. [`register`] exposes them to Tera.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tera::{Tera, Value};

use crate::archive::unslugify;
use crate::config::SiteConfig;
use crate::model::network::PageContext;
use crate::page::{Page, PageId};
use crate::routing::RouteTables;
use crate::site::Site;

/// Live children of `root` that are shown in menus, in tree order.
pub fn main_menu<'a>(site: &'a Site, root: &'a Page) -> Vec<&'a Page> {
    site.tree
        .children(root)
        .into_iter()
        .filter(|page| page.live && page.show_in_menus)
        .collect()
}

/// Menu pages below `current`, or beside it when it has none.
pub fn local_menu<'a>(site: &'a Site, current: &'a Page) -> Vec<&'a Page> {
    let children = main_menu(site, current);
    if !children.is_empty() {
        return children;
    }

    site.tree
        .siblings(current)
        .into_iter()
        .filter(|page| page.live && page.show_in_menus)
        .collect()
}

/// Live pages from just below `root` down to `current`, inclusive.
pub fn breadcrumbs<'a>(site: &'a Site, root: &'a Page, current: &'a Page) -> Vec<&'a Page> {
    site.tree
        .ancestors(current)
        .into_iter()
        .chain(std::iter::once(current))
        .filter(|page| page.live && site.tree.is_descendant_of(page, root))
        .collect()
}

/// Levels below the site root that still need children to get a local menu.
const SHALLOW_LEVELS: usize = 2;

/// Pages other than the site root get a local menu when they have children,
/// and always once they are more than [`SHALLOW_LEVELS`] below the root.
pub fn has_local_menu(site: &Site, current: &Page) -> bool {
    if site.root == Some(current.id) {
        return false;
    }
    let root_depth = site.root_page().map_or(1, |root| root.depth);
    let below_root = current.depth.saturating_sub(root_depth);
    below_root > SHALLOW_LEVELS || !site.tree.is_leaf(current)
}

pub fn is_current_or_ancestor(site: &Site, page: &Page, current: &Page) -> bool {
    page.id == current.id || site.tree.is_descendant_of(current, page)
}

fn posts_under<'a>(site: &'a Site, parent: Option<&'a Page>) -> Vec<&'a Page> {
    match parent {
        Some(parent) => site.tree.posts(parent),
        None => site.tree.all_posts(),
    }
}

/// Newest live post below `parent`, or in the whole tree.
pub fn latest_blog_post<'a>(site: &'a Site, parent: Option<&'a Page>) -> Option<&'a Page> {
    posts_under(site, parent).into_iter().next()
}

pub fn latest_n_blog_posts<'a>(site: &'a Site, parent: Option<&'a Page>, n: usize) -> Vec<&'a Page> {
    let mut posts = posts_under(site, parent);
    posts.truncate(n);
    posts
}

/// Newest live post tagged `featured`.
pub fn featured_blog_post<'a>(site: &'a Site, parent: Option<&'a Page>) -> Option<&'a Page> {
    posts_under(site, parent).into_iter().find(|post| {
        post.tags()
            .is_some_and(|tags| tags.iter().any(|tag| tag.eq_ignore_ascii_case("featured")))
    })
}

/// URL of the first page with `slug`.
pub fn slugurl(site: &Site, slug: &str) -> Option<String> {
    site.tree.first_with_slug(slug).and_then(|page| site.url(page))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveTarget<'a> {
    Author(&'a str),
    Tag(&'a str),
    Date {
        year: i32,
        month: Option<u8>,
        day: Option<u8>,
    },
}

/// URL of an archive listing below `page`. Author and tag names are slugified.
pub fn archiveurl(
    site: &Site,
    tables: &RouteTables,
    page: &Page,
    target: Option<ArchiveTarget<'_>>,
) -> Option<String> {
    let url = site.url(page)?;
    let Some(target) = target else {
        return Some(url);
    };

    let mut params = IndexMap::new();
    let name = match target {
        ArchiveTarget::Author(author) => {
            params.insert("author".to_string(), slug::slugify(author));
            "by_author"
        }
        ArchiveTarget::Tag(tag) => {
            params.insert("tag".to_string(), slug::slugify(tag));
            "by_tag"
        }
        ArchiveTarget::Date { year, month, day } => {
            params.insert("year".to_string(), year.to_string());
            if let Some(month) = month {
                params.insert("month".to_string(), month.to_string());
            }
            if let (Some(_), Some(day)) = (month, day) {
                params.insert("day".to_string(), day.to_string());
            }
            "by_date"
        }
    };

    let below = tables.get(page.page_type())?.reverse(name, &params)?;
    Some(format!("{}{}", url, below))
}

/// Query string fragment of every parameter except `exclude`, each one
/// prefixed with `&`.
pub fn request_parameters(query: &[(String, String)], exclude: Option<&str>) -> String {
    query
        .iter()
        .filter(|(key, _)| Some(key.as_str()) != exclude)
        .filter_map(|pair| serde_urlencoded::to_string([pair]).ok())
        .map(|encoded| format!("&{}", encoded))
        .collect()
}

type Args = HashMap<String, Value>;

fn page_arg<'a>(site: &'a Site, args: &Args, name: &str) -> tera::Result<Option<&'a Page>> {
    let id = match args.get(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(object)) => object.get("id").and_then(Value::as_i64),
        Some(value) => value.as_i64(),
    };
    let id = id.ok_or_else(|| {
        tera::Error::msg(format!("`{}` must be a page or a page id", name))
    })?;

    site.tree
        .get(PageId(id))
        .map(Some)
        .ok_or_else(|| tera::Error::msg(format!("no page with id {}", id)))
}

fn required_page<'a>(site: &'a Site, args: &Args, name: &str) -> tera::Result<&'a Page> {
    page_arg(site, args, name)?
        .ok_or_else(|| tera::Error::msg(format!("missing page argument `{}`", name)))
}

fn pages_value(site: &Site, pages: Vec<&Page>) -> tera::Result<Value> {
    let pages: Vec<_> = pages
        .into_iter()
        .map(|page| PageContext::new(site, page))
        .collect();
    Ok(tera::to_value(pages)?)
}

fn page_value(site: &Site, page: Option<&Page>) -> tera::Result<Value> {
    Ok(tera::to_value(page.map(|page| PageContext::new(site, page)))?)
}

fn str_arg<'a>(args: &'a Args, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

fn int_arg(args: &Args, name: &str) -> Option<i64> {
    args.get(name).and_then(|value| match value {
        Value::String(s) => s.parse().ok(),
        value => value.as_i64(),
    })
}

fn archive_target(args: &Args) -> tera::Result<Option<ArchiveTarget<'_>>> {
    if let Some(author) = str_arg(args, "author") {
        return Ok(Some(ArchiveTarget::Author(author)));
    }
    if let Some(tag) = str_arg(args, "tag") {
        return Ok(Some(ArchiveTarget::Tag(tag)));
    }
    let Some(year) = int_arg(args, "year") else {
        return Ok(None);
    };

    let narrow = |value: i64| {
        u8::try_from(value).map_err(|_| tera::Error::msg(format!("bad archive date part {}", value)))
    };
    Ok(Some(ArchiveTarget::Date {
        year: i32::try_from(year)
            .map_err(|_| tera::Error::msg(format!("bad archive year {}", year)))?,
        month: int_arg(args, "month").map(narrow).transpose()?,
        day: int_arg(args, "day").map(narrow).transpose()?,
    }))
}

fn query_arg(args: &Args) -> Vec<(String, String)> {
    args.get("query")
        .and_then(|query| serde_json::from_value::<Vec<(String, String)>>(query.clone()).ok())
        .unwrap_or_default()
}

/// Make the helpers of this module callable from templates.
pub fn register(tera: &mut Tera, site: Arc<Site>, tables: Arc<RouteTables>, config: &SiteConfig) {
    let s = site.clone();
    tera.register_function("main_menu", move |args: &Args| {
        let root = match page_arg(&s, args, "root")? {
            Some(root) => root,
            None => match s.root_page() {
                Some(root) => root,
                None => return pages_value(&s, Vec::new()),
            },
        };
        pages_value(&s, main_menu(&s, root))
    });

    let s = site.clone();
    tera.register_function("local_menu", move |args: &Args| {
        match page_arg(&s, args, "current_page")? {
            Some(current) => pages_value(&s, local_menu(&s, current)),
            None => pages_value(&s, Vec::new()),
        }
    });

    let s = site.clone();
    tera.register_function("breadcrumbs", move |args: &Args| {
        let current = required_page(&s, args, "current_page")?;
        let root = match page_arg(&s, args, "root")? {
            Some(root) => root,
            None => match s.root_page() {
                Some(root) => root,
                None => return pages_value(&s, Vec::new()),
            },
        };
        pages_value(&s, breadcrumbs(&s, root, current))
    });

    let s = site.clone();
    tera.register_function("has_local_menu", move |args: &Args| {
        let current = required_page(&s, args, "current_page")?;
        Ok(Value::Bool(has_local_menu(&s, current)))
    });

    let s = site.clone();
    tera.register_function("is_current_or_ancestor", move |args: &Args| {
        let page = required_page(&s, args, "page")?;
        let current = required_page(&s, args, "current_page")?;
        Ok(Value::Bool(is_current_or_ancestor(&s, page, current)))
    });

    let s = site.clone();
    tera.register_function("latest_blog_post", move |args: &Args| {
        let parent = page_arg(&s, args, "parent")?;
        page_value(&s, latest_blog_post(&s, parent))
    });

    let s = site.clone();
    tera.register_function("latest_n_blog_posts", move |args: &Args| {
        let parent = page_arg(&s, args, "parent")?;
        let n = int_arg(args, "n").unwrap_or(5).max(0) as usize;
        pages_value(&s, latest_n_blog_posts(&s, parent, n))
    });

    let s = site.clone();
    tera.register_function("featured_blog_post", move |args: &Args| {
        let parent = page_arg(&s, args, "parent")?;
        page_value(&s, featured_blog_post(&s, parent))
    });

    let s = site.clone();
    tera.register_function("slugurl", move |args: &Args| {
        let slug = str_arg(args, "slug")
            .ok_or_else(|| tera::Error::msg("missing argument `slug`"))?;
        Ok(tera::to_value(slugurl(&s, slug))?)
    });

    let s = site.clone();
    tera.register_function("archiveurl", move |args: &Args| {
        let page = required_page(&s, args, "page")?;
        let target = archive_target(args)?;
        Ok(tera::to_value(archiveurl(&s, &tables, page, target))?)
    });

    tera.register_function("get_request_parameters", |args: &Args| {
        let query = query_arg(args);
        Ok(Value::String(request_parameters(
            &query,
            str_arg(args, "exclude"),
        )))
    });

    let allow_comments = config.allow_comments;
    tera.register_function("are_comments_allowed", move |_: &Args| {
        Ok(Value::Bool(allow_comments))
    });

    let disqus_shortname = config.disqus_shortname.clone();
    tera.register_function("get_disqus_shortname", move |_: &Args| {
        Ok(tera::to_value(&disqus_shortname)?)
    });

    tera.register_filter("unslugify", |value: &Value, _: &Args| {
        let slug = value
            .as_str()
            .ok_or_else(|| tera::Error::msg("unslugify expects a string"))?;
        Ok(Value::String(unslugify(slug)))
    });
}
