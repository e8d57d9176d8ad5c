//! Typed calls for every endpoint of the blog API.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Method;

use crate::error::{BlogError, BlogResult};
use crate::gateway::Gateway;
use crate::listing::ListFilter;
use crate::models::{
    AccountDeletion, AuthResponse, Category, Comment, Id, LikeResponse, LoginRequest, NewCategory, NewComment,
    Post, PostDraft, RegisterRequest, ServerUser, UploadResponse, UserChanges,
};

/// Anything that can answer a filtered post listing.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn list_posts(&self, filter: &ListFilter) -> BlogResult<Vec<Post>>;
}

/// The like toggle endpoint.
#[async_trait]
pub trait LikeApi: Send + Sync {
    async fn toggle_like(&self, post_id: &Id) -> BlogResult<LikeResponse>;
}

#[async_trait]
impl PostSource for Gateway {
    async fn list_posts(&self, filter: &ListFilter) -> BlogResult<Vec<Post>> {
        let builder = self
            .request(Method::GET, "/posts")
            .query(&filter.query_pairs());
        self.send_json(builder).await
    }
}

#[async_trait]
impl LikeApi for Gateway {
    async fn toggle_like(&self, post_id: &Id) -> BlogResult<LikeResponse> {
        let builder = self.request(Method::POST, &format!("/posts/{post_id}/like"));
        self.send_json(builder).await
    }
}

impl Gateway {
    pub async fn login(&self, username: &str, password: &str) -> BlogResult<AuthResponse> {
        let builder = self
            .request(Method::POST, "/auth/login")
            .json(&LoginRequest { username, password });
        self.send_json(builder).await
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> BlogResult<()> {
        let builder = self.request(Method::POST, "/auth/register").json(&RegisterRequest {
            username,
            email,
            password,
            profile_pic: "",
            created_at: chrono::Utc::now(),
        });
        self.send(builder).await?;
        Ok(())
    }

    pub async fn update_user(&self, user_id: &Id, changes: &UserChanges) -> BlogResult<ServerUser> {
        let builder = self
            .request(Method::PUT, &format!("/users/{user_id}"))
            .json(changes);
        self.send_json(builder).await
    }

    pub async fn delete_user(&self, user_id: &Id, username: &str) -> BlogResult<()> {
        self.require_session("delete your account")?;
        let builder = self
            .request(Method::DELETE, &format!("/users/{user_id}"))
            .json(&AccountDeletion { username });
        self.send(builder).await?;
        Ok(())
    }

    /// `true` when some other user already has `username`.
    pub async fn username_taken(&self, username: &str, exclude_user_id: &Id) -> BlogResult<bool> {
        let builder = self
            .request(Method::GET, "/users/check-username")
            .query(&[("username", username), ("excludeUserId", exclude_user_id.as_str())]);
        self.send_json(builder).await
    }

    pub async fn get_post(&self, post_id: &Id) -> BlogResult<Post> {
        let builder = self.request(Method::GET, &format!("/posts/{post_id}"));
        self.send_json(builder).await
    }

    pub async fn create_post(&self, draft: &PostDraft) -> BlogResult<Post> {
        self.require_session("write posts")?;
        let builder = self.request(Method::POST, "/posts").json(draft);
        self.send_json(builder).await
    }

    pub async fn update_post(&self, post_id: &Id, draft: &PostDraft) -> BlogResult<Post> {
        self.require_session("edit posts")?;
        let builder = self
            .request(Method::PUT, &format!("/posts/{post_id}"))
            .json(draft);
        self.send_json(builder).await
    }

    pub async fn delete_post(&self, post_id: &Id) -> BlogResult<()> {
        self.require_session("delete posts")?;
        let builder = self.request(Method::DELETE, &format!("/posts/{post_id}"));
        self.send(builder).await?;
        Ok(())
    }

    pub async fn list_categories(&self) -> BlogResult<Vec<Category>> {
        let builder = self.request(Method::GET, "/categories");
        self.send_json(builder).await
    }

    /// Raw category creation. `categories::create_category` adds validation
    /// and duplicate detection on top.
    pub async fn post_category(&self, name: &str) -> BlogResult<()> {
        let builder = self
            .request(Method::POST, "/categories")
            .json(&NewCategory { name });
        self.send(builder).await?;
        Ok(())
    }

    pub async fn list_comments(&self, post_id: &Id) -> BlogResult<Vec<Comment>> {
        let builder = self.request(Method::GET, &format!("/comments/post/{post_id}"));
        self.send_json(builder).await
    }

    pub async fn create_comment(&self, post_id: &Id, text: &str) -> BlogResult<()> {
        self.require_session("comment")?;
        let text = text.trim();
        if text.is_empty() {
            return Err(crate::error::ValidationError::Empty.into());
        }
        let builder = self.request(Method::POST, "/comments").json(&NewComment {
            postid: post_id,
            text,
        });
        self.send(builder).await?;
        Ok(())
    }

    pub async fn delete_comment(&self, comment_id: &Id) -> BlogResult<()> {
        self.require_session("delete comments")?;
        let builder = self.request(Method::DELETE, &format!("/comments/{comment_id}"));
        self.send(builder).await?;
        Ok(())
    }

    /// Upload a file and return the URL the server stored it under.
    pub async fn upload(&self, file_name: &str, data: Bytes) -> BlogResult<String> {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = Part::bytes(data.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime.as_ref())?;
        let form = Form::new()
            .text("name", file_name.to_string())
            .part("file", part);

        let builder = self.request(Method::POST, "/upload").multipart(form);
        let response: UploadResponse = self.send_json(builder).await?;
        Ok(response.url)
    }

    fn require_session(&self, action: &str) -> BlogResult<()> {
        if self.session().is_signed_in() {
            Ok(())
        } else {
            Err(BlogError::Permission(format!("Please login to {action}")))
        }
    }
}
