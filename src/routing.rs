//! Two-level routing.
//!
//! The tree router walks slugs down from the site root. Every page it passes
//! may own a small table of sub-routes relative to its own URL; the first
//! pattern that matches the rest of the path wins and names the view that
//! serves it.

use std::collections::HashMap;

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use crate::model::ApiError;
use crate::page::{Page, PageType};
use crate::site::Site;

/// Views a page can be served through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Serve,
    ByAuthor,
    ByTag,
    ByDate,
}

#[derive(Debug)]
pub struct SubRoute<V> {
    template: String,
    regex: Regex,
    pub view: V,
    pub name: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch<V> {
    pub view: V,
    pub name: &'static str,
    pub params: IndexMap<String, String>,
}

/// Compile `tag/<tag>/` style patterns into anchored regexes. A placeholder is
/// `<name>` (one path segment) or `<name:regex>`.
fn compile(template: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::from("^");
    let mut rest = template;

    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        pattern.push_str(&regex::escape(&rest[..start]));

        let placeholder = &rest[start + 1..start + len];
        let (name, re) = placeholder.split_once(':').unwrap_or((placeholder, "[^/]+"));
        pattern.push_str(&format!("(?P<{}>{})", name, re));

        rest = &rest[start + len + 1..];
    }

    pattern.push_str(&regex::escape(rest));
    pattern.push('$');
    Regex::new(&pattern)
}

impl<V: Copy> SubRoute<V> {
    pub fn new(template: &str, view: V, name: &'static str) -> Result<Self, regex::Error> {
        Ok(SubRoute {
            template: template.to_string(),
            regex: compile(template)?,
            view,
            name,
        })
    }

    pub fn matches(&self, remainder: &str) -> Option<RouteMatch<V>> {
        let captures = self.regex.captures(remainder)?;
        let params = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|value| (name.to_string(), value.as_str().to_string()))
            })
            .collect();

        Some(RouteMatch {
            view: self.view,
            name: self.name,
            params,
        })
    }

    pub fn placeholders(&self) -> usize {
        self.regex.captures_len() - 1
    }

    /// Fill the placeholders of this route, if every one has a value.
    pub fn reverse(&self, params: &IndexMap<String, String>) -> Option<String> {
        let mut url = String::new();
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find('<') {
            let len = rest[start..].find('>')?;
            url.push_str(&rest[..start]);

            let placeholder = &rest[start + 1..start + len];
            let name = placeholder.split(':').next().unwrap_or(placeholder);
            url.push_str(params.get(name)?);

            rest = &rest[start + len + 1..];
        }

        url.push_str(rest);
        self.regex.is_match(&url).then_some(url)
    }
}

/// Sub-routes of one page type, tried in order.
#[derive(Debug)]
pub struct RouteTable<V> {
    routes: Vec<SubRoute<V>>,
}

impl<V: Copy> Default for RouteTable<V> {
    fn default() -> Self {
        RouteTable { routes: Vec::new() }
    }
}

impl<V: Copy> RouteTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        template: &str,
        view: V,
        name: &'static str,
    ) -> Result<Self, regex::Error> {
        self.routes.push(SubRoute::new(template, view, name)?);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn resolve(&self, remainder: &str) -> Option<RouteMatch<V>> {
        self.routes.iter().find_map(|route| route.matches(remainder))
    }

    /// Path below the page for the route called `name` that uses exactly `params`.
    pub fn reverse(&self, name: &str, params: &IndexMap<String, String>) -> Option<String> {
        self.routes
            .iter()
            .filter(|route| route.name == name && route.placeholders() == params.len())
            .find_map(|route| route.reverse(params))
    }
}

/// Join the unconsumed path segments the way sub-route patterns expect them.
pub fn remainder(segments: &[&str]) -> String {
    if segments.is_empty() {
        String::new()
    } else {
        format!("{}/", segments.join("/"))
    }
}

/// Route tables for every page type, built once at start-up.
#[derive(Debug)]
pub struct RouteTables {
    tables: HashMap<PageType, RouteTable<View>>,
}

impl RouteTables {
    pub fn standard() -> Result<Self, regex::Error> {
        let mut tables = HashMap::new();
        for ty in PageType::ALL {
            let table = match ty {
                PageType::BlogIndex => RouteTable::new()
                    .route("", View::Serve, "main")?
                    .route(r"author/<author:[\w -]+>/", View::ByAuthor, "by_author")?
                    .route(r"tag/<tag:[\w -]+>/", View::ByTag, "by_tag")?
                    .route(r"date/<year:\d{4}>/", View::ByDate, "by_date")?
                    .route(r"date/<year:\d{4}>/<month:\w+>/", View::ByDate, "by_date")?
                    .route(
                        r"date/<year:\d{4}>/<month:\w+>/<day:\d{1,2}>/",
                        View::ByDate,
                        "by_date",
                    )?,
                _ => RouteTable::new().route("", View::Serve, "main")?,
            };
            tables.insert(ty, table);
        }
        Ok(RouteTables { tables })
    }

    pub fn get(&self, ty: PageType) -> Option<&RouteTable<View>> {
        self.tables.get(&ty)
    }
}

#[derive(Debug, Clone)]
pub struct Resolved<'a> {
    pub page: &'a Page,
    pub view: View,
    pub name: &'static str,
    pub params: IndexMap<String, String>,
}

/// Resolve a request path, split into segments, to a page and one of its views.
pub fn route<'a>(
    site: &'a Site,
    tables: &RouteTables,
    segments: &[&str],
) -> Result<Resolved<'a>, ApiError> {
    let root = site
        .root_page()
        .ok_or_else(|| ApiError::not_found("site has no root page"))?;
    route_page(site, tables, root, segments)
}

fn route_page<'a>(
    site: &'a Site,
    tables: &RouteTables,
    page: &'a Page,
    segments: &[&str],
) -> Result<Resolved<'a>, ApiError> {
    let table = tables.get(page.page_type());

    if page.live {
        if let Some(found) = table.and_then(|table| table.resolve(&remainder(segments))) {
            debug!(page = %page.id, route = found.name, "matched sub-route");
            return Ok(Resolved {
                page,
                view: found.view,
                name: found.name,
                params: found.params,
            });
        }
    }

    if let Some((first, rest)) = segments.split_first() {
        let child = site
            .tree
            .children(page)
            .into_iter()
            .find(|child| child.slug == *first);
        if let Some(child) = child {
            match route_page(site, tables, child, rest) {
                Err(err) if err.is_not_found() => {
                    debug!(page = %child.id, "child did not match, trying parent");
                }
                other => return other,
            }
        }
    }

    if page.live {
        debug!(page = %page.id, rest = %remainder(segments), "serving default view");
        return Ok(Resolved {
            page,
            view: View::Serve,
            name: "main",
            params: IndexMap::new(),
        });
    }

    Err(ApiError::not_found(format!(
        "{}{}",
        site.url(page).unwrap_or_default(),
        remainder(segments)
    )))
}

/// Split a legacy `<index path>/archives/<kind>/<args...>` path.
pub fn split_archive<'p, 's>(
    segments: &'s [&'p str],
) -> Option<(&'s [&'p str], &'p str, &'s [&'p str])> {
    let divider = segments
        .iter()
        .position(|segment| *segment == "archives" || *segment == "archive")?;
    let (kind, args) = segments[divider + 1..].split_first()?;
    Some((&segments[..divider], *kind, args))
}
