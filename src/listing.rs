//! Post lists: filtered queries, the merged "my posts" timeline, and paging.

use futures::future::join_all;
use std::collections::HashSet;

use crate::api::PostSource;
use crate::models::Post;
use crate::session::Identity;

pub const DEFAULT_PAGE_SIZE: usize = 16;

/// Page buttons shown at once.
const PAGE_WINDOW: usize = 5;

/// Filters the server applies to `GET /posts`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub category: Option<String>,
    pub user: Option<String>,
    pub query: Option<String>,
}

impl ListFilter {
    pub fn by_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ..Default::default()
        }
    }

    pub fn by_category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Default::default()
        }
    }

    /// Query string pairs, empty values left out.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        [
            ("cat", &self.category),
            ("user", &self.user),
            ("q", &self.query),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v.to_string()))
        })
        .collect()
    }
}

/// Newest first. Stable, so posts with equal timestamps keep server order.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by_key(|post| std::cmp::Reverse(post.created_at_or_min()));
}

/// Drop later copies of any post id already seen.
pub fn dedup_first_seen(posts: impl IntoIterator<Item = Post>) -> Vec<Post> {
    let mut seen = HashSet::new();
    posts
        .into_iter()
        .filter(|post| seen.insert(post.id.clone()))
        .collect()
}

/// The server filters; the client only fixes the order, which the server
/// doesn't keep stable across filter combinations.
pub fn filter_and_sort(mut raw: Vec<Post>, _filter: &ListFilter) -> Vec<Post> {
    sort_newest_first(&mut raw);
    raw
}

/// Fetch one filtered list. Failures are logged and show as an empty list.
pub async fn fetch_filtered<S: PostSource + ?Sized>(source: &S, filter: &ListFilter) -> Vec<Post> {
    match source.list_posts(filter).await {
        Ok(posts) => filter_and_sort(posts, filter),
        Err(e) => {
            tracing::warn!("Failed to fetch posts for {:?}: {}", filter, e);
            Vec::new()
        }
    }
}

/// Usernames a user's posts may be filed under: original first, then the
/// current one if it differs.
pub fn identity_usernames(identity: &Identity) -> Vec<String> {
    identity.usernames()
}

/// One timeline for several authors. Posts written before a rename live
/// under the old username, so both are queried at once and merged by post id.
pub async fn fetch_merged<S: PostSource + ?Sized>(source: &S, usernames: &[String]) -> Vec<Post> {
    let mut distinct: Vec<&String> = Vec::with_capacity(usernames.len());
    for name in usernames {
        if !name.is_empty() && !distinct.contains(&name) {
            distinct.push(name);
        }
    }
    if distinct.is_empty() {
        return Vec::new();
    }

    let filters: Vec<ListFilter> = distinct
        .iter()
        .map(|name| ListFilter::by_user(name.as_str()))
        .collect();
    let results = join_all(filters.iter().map(|filter| source.list_posts(filter))).await;

    let mut flattened = Vec::new();
    for (filter, result) in filters.iter().zip(results) {
        match result {
            Ok(posts) => flattened.extend(posts),
            Err(e) => tracing::warn!("Failed to fetch posts for {:?}: {}", filter.user, e),
        }
    }

    let mut merged = dedup_first_seen(flattened);
    sort_newest_first(&mut merged);
    merged
}

/// Items on 1-based `page`. Page 0 counts as page 1; pages past the end are
/// empty.
pub fn paginate<T>(items: &[T], page_size: usize, page: usize) -> &[T] {
    if page_size == 0 {
        return &[];
    }
    let page = page.max(1);
    let start = (page - 1).saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

pub fn page_count(total_items: usize, page_size: usize) -> usize {
    if page_size == 0 {
        0
    } else {
        total_items.div_ceil(page_size)
    }
}

/// What the page control shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageControls {
    pub current: usize,
    pub total_pages: usize,
    pub prev_enabled: bool,
    pub next_enabled: bool,
    /// Shortcut to page 1 when the window doesn't include it.
    pub first: Option<usize>,
    pub leading_ellipsis: bool,
    pub pages: Vec<usize>,
    pub trailing_ellipsis: bool,
    /// Shortcut to the last page when the window doesn't include it.
    pub last: Option<usize>,
}

/// Up to five page buttons centered on `current`, with first/last shortcuts
/// and ellipses for the gaps.
pub fn page_controls(current: usize, total_pages: usize) -> PageControls {
    if total_pages == 0 {
        return PageControls {
            current: 1,
            total_pages: 0,
            prev_enabled: false,
            next_enabled: false,
            first: None,
            leading_ellipsis: false,
            pages: Vec::new(),
            trailing_ellipsis: false,
            last: None,
        };
    }

    let current = current.clamp(1, total_pages);
    let half = PAGE_WINDOW / 2;
    let mut start = current.saturating_sub(half).max(1);
    let end = (start + PAGE_WINDOW - 1).min(total_pages);
    start = start.min((end + 1).saturating_sub(PAGE_WINDOW).max(1));

    PageControls {
        current,
        total_pages,
        prev_enabled: current > 1,
        next_enabled: current < total_pages,
        first: (start > 1).then_some(1),
        leading_ellipsis: start > 2,
        pages: (start..=end).collect(),
        trailing_ellipsis: end + 1 < total_pages,
        last: (end < total_pages).then_some(total_pages),
    }
}

/// Filter and page state of one list view. Changing any filter goes back to
/// page 1.
#[derive(Debug, Clone)]
pub struct ListView {
    filter: ListFilter,
    page: usize,
    page_size: usize,
}

impl ListView {
    pub fn new(page_size: usize) -> Self {
        Self {
            filter: ListFilter::default(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_filter(&mut self, filter: ListFilter) {
        if filter != self.filter {
            self.filter = filter;
            self.page = 1;
        }
    }

    pub fn set_category(&mut self, category: Option<String>) {
        let filter = ListFilter {
            category,
            ..self.filter.clone()
        };
        self.set_filter(filter);
    }

    pub fn set_user(&mut self, user: Option<String>) {
        let filter = ListFilter {
            user,
            ..self.filter.clone()
        };
        self.set_filter(filter);
    }

    pub fn set_query(&mut self, query: Option<String>) {
        let filter = ListFilter {
            query,
            ..self.filter.clone()
        };
        self.set_filter(filter);
    }

    /// Move to `page`, clamped to the pages `total_items` fill.
    pub fn go_to(&mut self, page: usize, total_items: usize) {
        let pages = page_count(total_items, self.page_size).max(1);
        self.page = page.clamp(1, pages);
    }

    pub fn visible<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        paginate(items, self.page_size, self.page)
    }

    pub fn controls(&self, total_items: usize) -> PageControls {
        page_controls(self.page, page_count(total_items, self.page_size))
    }
}

/// The post with the most likes; ties go to the newest.
pub fn most_liked(posts: &[Post]) -> Option<&Post> {
    posts
        .iter()
        .max_by_key(|post| (post.like_count, post.created_at_or_min()))
}
