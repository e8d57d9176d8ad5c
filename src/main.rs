use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use blogsync::categories::{self, SIDEBAR_CATEGORIES};
use blogsync::config::{Cli, Command, Config};
use blogsync::error::BlogError;
use blogsync::likes::LikeView;
use blogsync::listing::{self, ListFilter};
use blogsync::models::{Id, Post, PostDraft};
use blogsync::ownership::{can_delete_comment, display_username, is_owned_by};
use blogsync::session::{Identity, ProfileChanges};
use blogsync::state::ClientState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::debug!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    tracing::debug!("API: {}", config.api.base_url);

    let state = ClientState::new(config)?;
    let command = cli.command.unwrap_or(Command::Posts {
        cat: None,
        user: None,
        query: None,
        page: 1,
    });

    run(&state, command).await
}

async fn run(state: &ClientState, command: Command) -> anyhow::Result<()> {
    let me = state.session.current();

    match command {
        Command::Login { username, password } => {
            let identity = state
                .session
                .login(&username, &password)
                .await
                .map_err(user_error)?;
            println!("Signed in as {}", identity.current_username);
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let identity = state
                .session
                .register(&username, &email, &password)
                .await
                .map_err(user_error)?;
            println!("Registered and signed in as {}", identity.current_username);
        }
        Command::Logout => {
            state.session.logout()?;
            println!("Signed out");
        }
        Command::DeleteAccount { yes } => {
            if !yes {
                anyhow::bail!("This removes your account for good; pass --yes to confirm");
            }
            state.session.delete_account().await.map_err(user_error)?;
            println!("Account deleted");
        }
        Command::Whoami => match me {
            Some(identity) => print_identity(&identity),
            None => println!("Not signed in"),
        },
        Command::Posts {
            cat,
            user,
            query,
            page,
        } => {
            let filter = ListFilter {
                category: cat,
                user,
                query,
            };
            let posts = listing::fetch_filtered(&state.gateway, &filter).await;
            print_page(state, &posts, page, me.as_ref());
        }
        Command::Mine { page } => {
            let identity = me.ok_or_else(|| anyhow::anyhow!("Please login to see your posts"))?;
            let usernames = listing::identity_usernames(&identity);
            let posts = listing::fetch_merged(&state.gateway, &usernames).await;
            print_page(state, &posts, page, Some(&identity));
        }
        Command::Search { query, cat } => {
            let dispatcher = state.search();
            let mut results = dispatcher.subscribe();
            dispatcher.set_category(cat);
            dispatcher.on_input(query);
            results.changed().await?;
            let posts = results.borrow().posts.clone();
            if posts.is_empty() {
                println!("No matches");
            }
            for post in &posts {
                print_post_line(post, me.as_ref());
            }
        }
        Command::Show { post_id } => {
            let post_id = Id::new(post_id);
            let post = state.gateway.get_post(&post_id).await.map_err(user_error)?;
            print_post_line(&post, me.as_ref());
            if !post.desc.is_empty() {
                println!("\n{}\n", post.desc);
            }
            let comments = state
                .gateway
                .list_comments(&post_id)
                .await
                .map_err(user_error)?;
            for comment in &comments {
                let marker = if can_delete_comment(me.as_ref(), comment) {
                    " [yours]"
                } else {
                    ""
                };
                println!(
                    "  #{} {}: {}{}",
                    comment.id,
                    display_username(me.as_ref(), &comment.username),
                    comment.text,
                    marker
                );
            }
        }
        Command::Write {
            title,
            desc,
            categories,
            photo,
        } => {
            let photo = match photo {
                Some(path) => Some(upload(state, &path).await?),
                None => None,
            };
            let draft = PostDraft {
                title,
                desc,
                categories: categories.into_iter().collect(),
                photo,
            };
            let post = state.gateway.create_post(&draft).await.map_err(user_error)?;
            println!("Published post {}", post.id);
        }
        Command::Delete { post_id } => {
            let post_id = Id::new(post_id);
            let post = state.gateway.get_post(&post_id).await.map_err(user_error)?;
            if !is_owned_by(me.as_ref(), &post.owner_username) {
                anyhow::bail!("You can only delete your own posts");
            }
            state
                .gateway
                .delete_post(&post_id)
                .await
                .map_err(user_error)?;
            println!("Deleted post {}", post_id);
        }
        Command::Like { post_id } => {
            let post = state
                .gateway
                .get_post(&Id::new(post_id))
                .await
                .map_err(user_error)?;
            let view = LikeView::new(&post, me.as_ref());
            let liked = state
                .likes
                .toggle_like(&view, me.as_ref())
                .await
                .map_err(user_error)?;
            println!(
                "{} ({} likes)",
                if liked.is_liked { "Liked" } else { "Unliked" },
                liked.like_count
            );
        }
        Command::Categories { top } => {
            let all = state.gateway.list_categories().await.map_err(user_error)?;
            let shown = match top {
                Some(n) => categories::top_categories(&all, n),
                None => all,
            };
            for category in &shown {
                let risk = if categories::is_at_risk(category) {
                    " (empty, will be removed)"
                } else {
                    ""
                };
                println!("{:>4}  {}{}", category.post_count, category.name, risk);
            }
        }
        Command::AddCategory { name } => {
            let all = categories::create_category(&state.gateway, &name)
                .await
                .map_err(user_error)?;
            println!("Created {}", name.trim());
            for category in categories::top_categories(&all, SIDEBAR_CATEGORIES) {
                println!("{:>4}  {}", category.post_count, category.name);
            }
        }
        Command::Comment { post_id, text } => {
            let post_id = Id::new(post_id);
            state
                .gateway
                .create_comment(&post_id, &text)
                .await
                .map_err(user_error)?;
            let post = state.gateway.get_post(&post_id).await.map_err(user_error)?;
            println!("Commented ({} comments)", post.comment_count);
        }
        Command::Uncomment { comment_id } => {
            state
                .gateway
                .delete_comment(&Id::new(comment_id))
                .await
                .map_err(user_error)?;
            println!("Comment deleted");
        }
        Command::Profile {
            username,
            email,
            password,
            bio,
            profile_pic,
        } => {
            let update = state
                .session
                .update_profile(ProfileChanges {
                    username,
                    email,
                    password,
                    profile_pic,
                    bio,
                })
                .await
                .map_err(user_error)?;
            print_identity(&update.identity);
            if update.username_changed {
                println!("Log out and back in so the server recognizes your new username.");
            }
        }
        Command::Upload { path } => {
            let url = upload(state, &path).await?;
            println!("{}", url);
        }
    }

    Ok(())
}

async fn upload(state: &ClientState, path: &Path) -> anyhow::Result<String> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");
    state
        .gateway
        .upload(file_name, Bytes::from(data))
        .await
        .map_err(user_error)
}

fn user_error(err: BlogError) -> anyhow::Error {
    match err {
        BlogError::StaleToken => {
            anyhow::anyhow!("{}. Run `blogsync logout` and `blogsync login` again.", err)
        }
        other => anyhow::anyhow!(other.user_message()),
    }
}

fn print_identity(identity: &Identity) {
    println!("{} <{}>", identity.current_username, identity.email);
    if identity.has_renamed() {
        println!("  formerly {}", identity.original_username);
    }
    if identity.is_admin {
        println!("  admin");
    }
    if !identity.bio.is_empty() {
        println!("  {}", identity.bio);
    }
}

fn print_page(state: &ClientState, posts: &[Post], page: usize, me: Option<&Identity>) {
    let mut view = state.list_view();
    view.go_to(page, posts.len());
    for post in view.visible(posts) {
        print_post_line(post, me);
    }

    let controls = view.controls(posts.len());
    if controls.total_pages > 1 {
        let mut buttons = Vec::new();
        if let Some(first) = controls.first {
            buttons.push(first.to_string());
        }
        if controls.leading_ellipsis {
            buttons.push("...".to_string());
        }
        for page in &controls.pages {
            if *page == controls.current {
                buttons.push(format!("[{page}]"));
            } else {
                buttons.push(page.to_string());
            }
        }
        if controls.trailing_ellipsis {
            buttons.push("...".to_string());
        }
        if let Some(last) = controls.last {
            buttons.push(last.to_string());
        }
        println!("\nPage {}", buttons.join(" "));
    }
}

fn print_post_line(post: &Post, me: Option<&Identity>) {
    let date = post
        .created_at
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let liked = me.is_some_and(|me| {
        post.liked_by
            .iter()
            .any(|name| is_owned_by(Some(me), name))
    });
    println!(
        "{:>6}  {:10}  {}  by {}  {}{} likes, {} comments",
        post.id,
        date,
        post.title,
        display_username(me, &post.owner_username),
        if liked { "♥ " } else { "" },
        post.like_count,
        post.comment_count
    );
}
