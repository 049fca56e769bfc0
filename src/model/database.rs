use std::collections::HashMap;
use std::path::Path;

use futures_util::TryStreamExt;
use indexmap::IndexSet;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use time::Date;
use tracing::{info, warn};
use url::Url;

use crate::link::{Attachment, Document, DocumentId, Link, RelatedLink};
use crate::model::ApiError;
use crate::page::{Html, Page, PageId, PageKind, PageType};
use crate::site::Site;
use crate::tree::PageTree;

const SCHEMA: &str = include_str!("../../schema.sql");

#[derive(sqlx::FromRow, Debug)]
pub struct DbPage {
    pub id: i64,
    pub path: String,
    pub depth: i64,
    pub title: String,
    pub slug: String,
    pub live: bool,
    pub show_in_menus: bool,
    pub owner: Option<String>,
    pub page_type: String,
    pub introduction: Option<String>,
    pub content: Option<String>,
    pub date: Option<Date>,
}

#[derive(sqlx::FromRow, Debug)]
pub struct DbLink {
    pub page_id: i64,
    pub sort_order: i64,
    pub title: String,
    pub link_page: Option<i64>,
    pub link_document: Option<i64>,
    pub link_external: Option<String>,
}

#[derive(sqlx::FromRow, Debug)]
pub struct DbTag {
    pub page_id: i64,
    pub name: String,
}

#[derive(sqlx::FromRow, Debug)]
pub struct DbDocument {
    pub id: i64,
    pub title: String,
    pub file: String,
}

impl DbLink {
    fn link(&self) -> Link {
        let external = self
            .link_external
            .as_deref()
            .filter(|external| !external.is_empty())
            .and_then(|external| match Url::parse(external) {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!(page = self.page_id, external, %err, "ignoring invalid external link");
                    None
                }
            });

        Link {
            page: self.link_page.map(PageId),
            document: self.link_document.map(DocumentId),
            external,
        }
    }
}

#[derive(Default)]
struct PageExtras {
    tags: HashMap<i64, IndexSet<String>>,
    related_links: HashMap<i64, Vec<RelatedLink>>,
    attachments: HashMap<i64, Vec<Attachment>>,
}

impl DbPage {
    fn saturate(self, extras: &mut PageExtras) -> Result<Page, ApiError> {
        let page_type = PageType::from_db(&self.page_type).ok_or_else(|| {
            ApiError::Database(format!(
                "page {} has unknown type {:?}",
                self.id, self.page_type
            ))
        })?;

        let introduction = Html(self.introduction.unwrap_or_default());
        let content = Html(self.content.unwrap_or_default());
        let tags = extras.tags.remove(&self.id).unwrap_or_default();
        if !tags.is_empty() && page_type != PageType::BlogPost {
            warn!(page = self.id, "ignoring tags on a page that is not a blog post");
        }

        let kind = match page_type {
            PageType::Index => PageKind::Index { introduction },
            PageType::BlogIndex => PageKind::BlogIndex { introduction },
            PageType::RichText => PageKind::RichText { content },
            PageType::Home => PageKind::Home { content },
            PageType::BlogPost => PageKind::BlogPost {
                content,
                date: self.date.unwrap_or_else(crate::page::today),
                tags,
            },
        };

        let depth = usize::try_from(self.depth)
            .map_err(|_| ApiError::Database(format!("page {} has negative depth", self.id)))?;

        Ok(Page {
            id: PageId(self.id),
            path: self.path,
            depth,
            title: self.title,
            slug: self.slug,
            live: self.live,
            show_in_menus: self.show_in_menus,
            owner: self.owner,
            kind,
            related_links: extras.related_links.remove(&self.id).unwrap_or_default(),
            attachments: extras.attachments.remove(&self.id).unwrap_or_default(),
        })
    }
}

pub async fn connect(sqlite_file: &Path) -> Result<SqlitePool, ApiError> {
    let options = SqliteConnectOptions::new()
        .filename(sqlite_file)
        .create_if_missing(true)
        .foreign_keys(true);
    Ok(SqlitePoolOptions::new().connect_with(options).await?)
}

pub async fn apply_schema(pool: &SqlitePool) -> Result<(), ApiError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

async fn load_links(pool: &SqlitePool, table: &str) -> Result<Vec<DbLink>, ApiError> {
    let query = format!(
        "select page_id, sort_order, title, link_page, link_document, link_external \
         from {} order by page_id, sort_order, id",
        table
    );
    let mut rows = sqlx::query_as::<_, DbLink>(&query).fetch(pool);
    let mut links = Vec::new();
    while let Some(row) = rows.try_next().await? {
        links.push(row);
    }
    Ok(links)
}

/// Read every page, tag, link, attachment and document into a tree.
pub async fn load_tree(pool: &SqlitePool) -> Result<PageTree, ApiError> {
    let mut tree = PageTree::new();
    let mut extras = PageExtras::default();

    let mut documents = sqlx::query_as::<_, DbDocument>("select id, title, file from document")
        .fetch(pool);
    while let Some(row) = documents.try_next().await? {
        tree.add_document(Document {
            id: DocumentId(row.id),
            title: row.title,
            file: row.file,
        });
    }
    drop(documents);

    let mut tags = sqlx::query_as::<_, DbTag>("select page_id, name from blog_post_tag order by name")
        .fetch(pool);
    while let Some(row) = tags.try_next().await? {
        extras.tags.entry(row.page_id).or_default().insert(row.name);
    }
    drop(tags);

    for row in load_links(pool, "related_link").await? {
        let link = row.link();
        extras.related_links.entry(row.page_id).or_default().push(RelatedLink {
            title: row.title,
            sort_order: row.sort_order,
            link,
        });
    }

    for row in load_links(pool, "attachment").await? {
        let link = row.link();
        extras.attachments.entry(row.page_id).or_default().push(Attachment {
            title: row.title,
            sort_order: row.sort_order,
            link,
        });
    }

    let mut pages = sqlx::query_as::<_, DbPage>(
        "select id, path, depth, title, slug, live, show_in_menus, owner, page_type, \
         introduction, content, date from page order by path",
    )
    .fetch(pool);
    while let Some(row) = pages.try_next().await? {
        let page = row.saturate(&mut extras)?;
        tree.insert(page)?;
    }

    for page_id in extras
        .tags
        .keys()
        .chain(extras.related_links.keys())
        .chain(extras.attachments.keys())
    {
        warn!(page = page_id, "tags or links belong to a missing page");
    }

    info!(pages = tree.len(), "loaded page tree");
    Ok(tree)
}

/// Load the tree and pick the site root: the page with `root_slug`, or the
/// first top-level page.
pub async fn load_site(
    pool: &SqlitePool,
    root_slug: Option<&str>,
    base_path: &str,
) -> Result<Site, ApiError> {
    let tree = load_tree(pool).await?;

    let root = match root_slug {
        Some(slug) => Some(
            tree.first_with_slug(slug)
                .ok_or_else(|| ApiError::Database(format!("no page has root slug {:?}", slug)))?
                .id,
        ),
        None => tree.roots().first().map(|page| page.id),
    };

    if root.is_none() {
        warn!("page tree is empty, every request will be not found");
    }

    Ok(Site::new(tree, root, base_path))
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        apply_schema(&pool).await.unwrap();
        pool
    }

    async fn seed(pool: &SqlitePool) {
        sqlx::raw_sql(
            "insert into document (id, title, file) values (1, 'Annual report', 'report.pdf');
             insert into page (id, path, depth, title, slug, live, show_in_menus, page_type, content)
                 values (1, '0001', 1, 'Home', 'home', 1, 0, 'home_page', '<p>Welcome</p>');
             insert into page (id, path, depth, title, slug, live, show_in_menus, page_type, introduction)
                 values (2, '00010001', 2, 'Blog', 'blog', 1, 1, 'blog_index_page', '<p>News</p>');
             insert into page (id, path, depth, title, slug, live, show_in_menus, owner, page_type, content, date)
                 values (3, '000100010001', 3, 'Hello', 'hello', 1, 0, 'alice', 'blog_post', '<p>Hi</p>', '2020-03-05');
             insert into page (id, path, depth, title, slug, live, show_in_menus, page_type, content)
                 values (4, '00010002', 2, 'About', 'about', 1, 1, 'rich_text_page', '<p>About us</p>');
             insert into blog_post_tag (page_id, name) values (3, 'rust'), (3, 'news');
             insert into related_link (page_id, sort_order, title, link_external)
                 values (4, 2, 'The Duck', 'http://www.duckduckgo.com/');
             insert into related_link (page_id, sort_order, title, link_page, link_external)
                 values (4, 1, 'Our blog', 2, 'http://example.com/');
             insert into attachment (page_id, sort_order, title, link_document)
                 values (4, 0, 'Report', 1);",
        )
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn loads_kinds_tags_and_links() {
        let pool = memory_pool().await;
        seed(&pool).await;

        let site = load_site(&pool, None, "/").await.unwrap();
        assert_eq!(site.tree.len(), 4);
        assert_eq!(site.root, Some(PageId(1)));

        let post = site.tree.get(PageId(3)).unwrap();
        assert_eq!(post.date(), Some(date!(2020 - 03 - 05)));
        let tags: Vec<_> = post.tags().unwrap().iter().cloned().collect();
        assert_eq!(tags, ["news", "rust"]);
        assert_eq!(site.url(post).as_deref(), Some("/blog/hello/"));

        let about = site.tree.get(PageId(4)).unwrap();
        let links: Vec<_> = about
            .related_links
            .iter()
            .map(|link| link.resolved(&site))
            .collect();
        assert_eq!(links[0].title, "Our blog");
        assert_eq!(links[0].url.as_deref(), Some("/blog/"));
        assert_eq!(links[1].url.as_deref(), Some("http://www.duckduckgo.com/"));
        assert_eq!(
            about.attachments[0].resolved(&site).url.as_deref(),
            Some("/documents/1/report.pdf")
        );
    }

    #[tokio::test]
    async fn root_slug_selects_site_root() {
        let pool = memory_pool().await;
        seed(&pool).await;

        let site = load_site(&pool, Some("blog"), "/").await.unwrap();
        assert_eq!(site.root, Some(PageId(2)));
        assert!(load_site(&pool, Some("missing"), "/").await.is_err());
    }

    #[tokio::test]
    async fn unknown_page_type_is_an_error() {
        let pool = memory_pool().await;
        sqlx::raw_sql(
            "insert into page (id, path, depth, title, slug, page_type)
                 values (1, '0001', 1, 'Odd', 'odd', 'standard_page');",
        )
        .execute(&pool)
        .await
        .unwrap();

        assert!(matches!(
            load_tree(&pool).await,
            Err(ApiError::Database(_))
        ));
    }
}
