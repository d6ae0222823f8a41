use askama::Template;
use axum::extract::{Query, State};
use serde::Deserialize;

use crate::db::models::PostWithAuthor;
use crate::db::pagination::{Page, PageLink};
use crate::db::posts;
use crate::error::AppResult;
use crate::extractors::PageContext;
use crate::routes::{Html, Layout};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub posts: Page<PostWithAuthor>,
    pub links: Vec<PageLink>,
}

#[derive(Template)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub layout: Layout,
}

/// `?page=N`. Anything missing or unparsable means the first page.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(1)
    }
}

pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<HomeTemplate>> {
    let posts = posts::list_posts(&state.db, query.number())?;
    let links = posts.links();
    Ok(Html(HomeTemplate {
        layout: ctx.untitled(),
        posts,
        links,
    }))
}

pub async fn about(ctx: PageContext) -> Html<AboutTemplate> {
    Html(AboutTemplate {
        layout: ctx.layout("About"),
    })
}
