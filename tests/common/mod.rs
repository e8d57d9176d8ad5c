//! In-process blog API for integration tests.
//!
//! Mirrors the server behaviors the client depends on: tokens carry the
//! username they were issued for (and keep carrying it after a rename),
//! `PUT` and `DELETE /users/:id` only accept the token's own account,
//! unknown tokens get a 401, and duplicate categories get a 409.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use blogsync::config::Config;
use blogsync::state::ClientState;

#[derive(Debug, Clone)]
pub struct MockUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub bio: String,
    pub is_admin: bool,
}

impl MockUser {
    /// Older endpoints send the admin flag in lowercase.
    fn to_json(&self) -> Value {
        // Some endpoints send the id twice.
        json!({
            "id": self.id,
            "userid": self.id,
            "username": self.username,
            "email": self.email,
            "bio": self.bio,
            "isadmin": self.is_admin,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockPost {
    pub postid: i64,
    pub title: String,
    pub desc: String,
    pub username: String,
    pub categories: Vec<String>,
    pub created_at: String,
    pub like_count: u64,
    pub liked_by: Vec<String>,
    pub comment_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockCategory {
    pub categoryid: i64,
    pub name: String,
    pub post_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockComment {
    pub commentid: i64,
    pub postid: i64,
    pub username: String,
    pub text: String,
    pub created_at: String,
}

/// How the next `POST /categories` should fail, as if another client had
/// created the same name a moment earlier.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRace {
    pub status: StatusCode,
    pub create_anyway: bool,
}

#[derive(Default)]
pub struct MockState {
    pub users: Mutex<Vec<MockUser>>,
    pub tokens: Mutex<HashMap<String, String>>,
    pub posts: Mutex<Vec<MockPost>>,
    pub categories: Mutex<Vec<MockCategory>>,
    pub comments: Mutex<Vec<MockComment>>,
    pub post_queries: Mutex<Vec<HashMap<String, String>>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_likes: AtomicBool,
    pub category_race: Mutex<Option<CategoryRace>>,
    next_id: AtomicI64,
}

impl MockState {
    fn hit(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 100
    }

    pub fn add_post(&self, postid: i64, username: &str, category: &str, created_at: &str) {
        self.posts.lock().unwrap().push(MockPost {
            postid,
            title: format!("Post {postid}"),
            desc: format!("Body of post {postid}"),
            username: username.to_string(),
            categories: vec![category.to_string()],
            created_at: created_at.to_string(),
            like_count: 0,
            liked_by: Vec::new(),
            comment_count: 0,
        });
    }

    pub fn post(&self, postid: i64) -> Option<MockPost> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.postid == postid)
            .cloned()
    }
}

pub struct MockApi {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockApi {
    /// Seeded with alice (admin) and bob, three posts and three categories.
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        seed(&state);

        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/users/check-username", get(check_username))
            .route("/users/{id}", put(update_user).delete(delete_user))
            .route("/posts", get(list_posts).post(create_post))
            .route("/posts/{id}", get(get_post).delete(delete_post))
            .route("/posts/{id}/like", post(like_post))
            .route("/categories", get(list_categories).post(create_category))
            .route("/comments", post(create_comment))
            .route("/comments/post/{id}", get(list_comments))
            .route("/comments/{id}", delete(delete_comment))
            .route("/upload", post(upload))
            .with_state(state.clone());
        let app = Router::new().nest("/api", api);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/api"),
            state,
        }
    }

    pub fn config(&self, data_dir: &Path) -> Config {
        let mut config = Config::default();
        config.api.base_url = self.base_url.clone();
        config.search.debounce_ms = 20;
        config.data_dir = data_dir.to_path_buf();
        config
    }

    /// A fresh client process pointed at this server and `data_dir`.
    pub fn client(&self, data_dir: &Path) -> ClientState {
        ClientState::new(self.config(data_dir)).unwrap()
    }
}

fn seed(state: &MockState) {
    *state.users.lock().unwrap() = vec![
        MockUser {
            id: "u1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "secret".into(),
            bio: "Writes about Rust".into(),
            is_admin: true,
        },
        MockUser {
            id: "u2".into(),
            username: "bob".into(),
            email: "bob@example.com".into(),
            password: "hunter2".into(),
            bio: String::new(),
            is_admin: false,
        },
    ];

    state.add_post(1, "alice", "rust", "2024-01-01T10:00:00Z");
    state.add_post(2, "bob", "music", "2024-02-01T10:00:00Z");
    state.add_post(3, "alice", "rust", "2024-01-15T10:00:00Z");
    {
        let mut posts = state.posts.lock().unwrap();
        posts[0].title = "Async Rust".into();
        posts[0].liked_by = vec!["bob".into()];
        posts[0].like_count = 1;
        posts[1].title = "Jazz night".into();
        posts[2].title = "Tokio tips".into();
    }

    *state.categories.lock().unwrap() = vec![
        MockCategory {
            categoryid: 1,
            name: "rust".into(),
            post_count: 2,
        },
        MockCategory {
            categoryid: 2,
            name: "music".into(),
            post_count: 1,
        },
        MockCategory {
            categoryid: 3,
            name: "drafts".into(),
            post_count: 0,
        },
    ];
}

type Shared = Arc<MockState>;

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!(message))).into_response()
}

/// Username the bearer token was issued for.
fn authenticate(state: &MockState, headers: &HeaderMap) -> Result<String, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "You are not authenticated!"))?;
    state
        .tokens
        .lock()
        .unwrap()
        .get(token)
        .cloned()
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Token is not valid!"))
}

fn text(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_string)
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    state.hit("POST /auth/login");
    let username = text(&body, "username").unwrap_or_default();
    let password = text(&body, "password").unwrap_or_default();

    let user = state
        .users
        .lock()
        .unwrap()
        .iter()
        .find(|u| u.username == username && u.password == password)
        .cloned();
    let Some(user) = user else {
        return error(StatusCode::BAD_REQUEST, "Wrong username or password!");
    };

    let token = format!("token-{}-{}", user.username, state.next_id());
    state
        .tokens
        .lock()
        .unwrap()
        .insert(token.clone(), user.username.clone());
    Json(json!({ "token": token, "user": user.to_json() })).into_response()
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    state.hit("POST /auth/register");
    let username = text(&body, "username").unwrap_or_default();
    if body.get("createdAt").is_none() || body.get("profilePic").is_none() {
        return error(StatusCode::BAD_REQUEST, "Missing fields");
    }

    let mut users = state.users.lock().unwrap();
    if users.iter().any(|u| u.username == username) {
        return error(StatusCode::CONFLICT, "User already exists!");
    }
    users.push(MockUser {
        id: format!("u{}", state.next_id()),
        username,
        email: text(&body, "email").unwrap_or_default(),
        password: text(&body, "password").unwrap_or_default(),
        bio: String::new(),
        is_admin: false,
    });
    Json(json!("User has been created.")).into_response()
}

async fn check_username(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.hit("GET /users/check-username");
    let username = params.get("username").cloned().unwrap_or_default();
    let exclude = params.get("excludeUserId").cloned().unwrap_or_default();
    let taken = state
        .users
        .lock()
        .unwrap()
        .iter()
        .any(|u| u.username == username && u.id != exclude);
    Json(json!(taken)).into_response()
}

async fn update_user(
    State(state): State<Shared>,
    UrlPath(id): UrlPath<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit(format!("PUT /users/{id}"));
    let token_user = match authenticate(&state, &headers) {
        Ok(name) => name,
        Err(response) => return response,
    };

    let mut users = state.users.lock().unwrap();
    let Some(user) = users.iter_mut().find(|u| u.id == id) else {
        return error(StatusCode::NOT_FOUND, "User not found!");
    };
    if user.username != token_user {
        return error(StatusCode::FORBIDDEN, "You can update only your account!");
    }

    if let Some(username) = text(&body, "username") {
        user.username = username;
    }
    if let Some(email) = text(&body, "email") {
        user.email = email;
    }
    if let Some(password) = text(&body, "password") {
        user.password = password;
    }
    if let Some(bio) = text(&body, "bio") {
        user.bio = bio;
    }
    Json(user.to_json()).into_response()
}

async fn delete_user(
    State(state): State<Shared>,
    UrlPath(id): UrlPath<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit(format!("DELETE /users/{id}"));
    let token_user = match authenticate(&state, &headers) {
        Ok(name) => name,
        Err(response) => return response,
    };

    let mut users = state.users.lock().unwrap();
    let Some(index) = users.iter().position(|u| u.id == id) else {
        return error(StatusCode::NOT_FOUND, "User not found!");
    };
    if users[index].username != token_user
        || text(&body, "username").as_deref() != Some(token_user.as_str())
    {
        return error(StatusCode::FORBIDDEN, "You can delete only your account!");
    }
    users.remove(index);
    state
        .tokens
        .lock()
        .unwrap()
        .retain(|_, username| *username != token_user);
    Json(json!("User has been deleted.")).into_response()
}

async fn list_posts(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.hit("GET /posts");
    state.post_queries.lock().unwrap().push(params.clone());

    let posts: Vec<MockPost> = state
        .posts
        .lock()
        .unwrap()
        .iter()
        .filter(|p| params.get("user").map_or(true, |user| p.username == *user))
        .filter(|p| params.get("cat").map_or(true, |cat| p.categories.contains(cat)))
        .filter(|p| {
            params
                .get("q")
                .map_or(true, |q| p.title.to_lowercase().contains(&q.to_lowercase()))
        })
        .cloned()
        .collect();
    Json(posts).into_response()
}

async fn get_post(State(state): State<Shared>, UrlPath(id): UrlPath<i64>) -> Response {
    state.hit(format!("GET /posts/{id}"));
    match state.post(id) {
        Some(post) => Json(post).into_response(),
        None => error(StatusCode::NOT_FOUND, "Post not found!"),
    }
}

async fn create_post(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit("POST /posts");
    let username = match authenticate(&state, &headers) {
        Ok(name) => name,
        Err(response) => return response,
    };

    let post = MockPost {
        postid: state.next_id(),
        title: text(&body, "title").unwrap_or_default(),
        desc: text(&body, "desc").unwrap_or_default(),
        username,
        categories: body
            .get("categories")
            .and_then(Value::as_array)
            .map(|cats| {
                cats.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        created_at: "2024-06-01T10:00:00Z".into(),
        like_count: 0,
        liked_by: Vec::new(),
        comment_count: 0,
    };
    state.posts.lock().unwrap().push(post.clone());
    Json(post).into_response()
}

async fn delete_post(
    State(state): State<Shared>,
    UrlPath(id): UrlPath<i64>,
    headers: HeaderMap,
) -> Response {
    state.hit(format!("DELETE /posts/{id}"));
    let username = match authenticate(&state, &headers) {
        Ok(name) => name,
        Err(response) => return response,
    };

    let mut posts = state.posts.lock().unwrap();
    let Some(index) = posts.iter().position(|p| p.postid == id) else {
        return error(StatusCode::NOT_FOUND, "Post not found!");
    };
    if posts[index].username != username {
        return error(StatusCode::FORBIDDEN, "You can delete only your post!");
    }
    posts.remove(index);
    Json(json!("Post has been deleted.")).into_response()
}

async fn like_post(
    State(state): State<Shared>,
    UrlPath(id): UrlPath<i64>,
    headers: HeaderMap,
) -> Response {
    state.hit(format!("POST /posts/{id}/like"));
    let username = match authenticate(&state, &headers) {
        Ok(name) => name,
        Err(response) => return response,
    };
    if state.fail_likes.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong");
    }

    let mut posts = state.posts.lock().unwrap();
    let Some(post) = posts.iter_mut().find(|p| p.postid == id) else {
        return error(StatusCode::NOT_FOUND, "Post not found!");
    };
    match post.liked_by.iter().position(|name| *name == username) {
        Some(index) => {
            post.liked_by.remove(index);
        }
        None => post.liked_by.push(username),
    }
    post.like_count = post.liked_by.len() as u64;
    Json(json!({ "likeCount": post.like_count, "likedBy": post.liked_by })).into_response()
}

async fn list_categories(State(state): State<Shared>) -> Response {
    state.hit("GET /categories");
    Json(state.categories.lock().unwrap().clone()).into_response()
}

async fn create_category(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit("POST /categories");
    if let Err(response) = authenticate(&state, &headers) {
        return response;
    }
    let name = text(&body, "name").unwrap_or_default();

    if let Some(race) = state.category_race.lock().unwrap().take() {
        if race.create_anyway {
            insert_category(&state, &name);
        }
        return error(race.status, "duplicate key value violates unique constraint");
    }

    let exists = state
        .categories
        .lock()
        .unwrap()
        .iter()
        .any(|c| c.name.eq_ignore_ascii_case(&name));
    if exists {
        return error(StatusCode::CONFLICT, "Category already exists");
    }
    insert_category(&state, &name);
    Json(json!("Category has been created.")).into_response()
}

fn insert_category(state: &MockState, name: &str) {
    let categoryid = state.next_id();
    state.categories.lock().unwrap().push(MockCategory {
        categoryid,
        name: name.to_string(),
        post_count: 0,
    });
}

async fn list_comments(State(state): State<Shared>, UrlPath(id): UrlPath<i64>) -> Response {
    state.hit(format!("GET /comments/post/{id}"));
    let comments: Vec<MockComment> = state
        .comments
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.postid == id)
        .cloned()
        .collect();
    Json(comments).into_response()
}

async fn create_comment(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit("POST /comments");
    let username = match authenticate(&state, &headers) {
        Ok(name) => name,
        Err(response) => return response,
    };
    let Some(postid) = text(&body, "postid").and_then(|id| id.parse::<i64>().ok()) else {
        return error(StatusCode::BAD_REQUEST, "postid is required");
    };

    {
        let mut posts = state.posts.lock().unwrap();
        let Some(post) = posts.iter_mut().find(|p| p.postid == postid) else {
            return error(StatusCode::NOT_FOUND, "Post not found!");
        };
        post.comment_count += 1;
    }
    let comment = MockComment {
        commentid: state.next_id(),
        postid,
        username,
        text: text(&body, "text").unwrap_or_default(),
        created_at: "2024-06-02T10:00:00Z".into(),
    };
    state.comments.lock().unwrap().push(comment.clone());
    Json(comment).into_response()
}

async fn delete_comment(
    State(state): State<Shared>,
    UrlPath(id): UrlPath<i64>,
    headers: HeaderMap,
) -> Response {
    state.hit(format!("DELETE /comments/{id}"));
    let username = match authenticate(&state, &headers) {
        Ok(name) => name,
        Err(response) => return response,
    };

    let mut comments = state.comments.lock().unwrap();
    let Some(index) = comments.iter().position(|c| c.commentid == id) else {
        return error(StatusCode::NOT_FOUND, "Comment not found!");
    };
    if comments[index].username != username {
        return error(StatusCode::FORBIDDEN, "You can delete only your comment!");
    }
    let comment = comments.remove(index);

    if let Some(post) = state
        .posts
        .lock()
        .unwrap()
        .iter_mut()
        .find(|p| p.postid == comment.postid)
    {
        post.comment_count = post.comment_count.saturating_sub(1);
    }
    Json(json!("Comment has been deleted.")).into_response()
}

async fn upload(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.hit("POST /upload");
    if let Err(response) = authenticate(&state, &headers) {
        return response;
    }
    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));
    if !is_multipart {
        return error(StatusCode::BAD_REQUEST, "Expected a file");
    }
    Json(json!({ "url": format!("/images/{}.png", state.next_id()) })).into_response()
}
