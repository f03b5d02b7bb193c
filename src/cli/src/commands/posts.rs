//! Stored posts command.

use anyhow::Result;
use clap::Args;
use postwatch_core::{api::handlers::PostsResponse, db::StoredPost};
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct PostsArgs {
    /// Maximum number of posts to show
    #[arg(short, long, default_value_t = 10)]
    limit: i64,
}

/// Table row for a post.
#[derive(Tabled, Serialize)]
struct PostRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

impl From<&StoredPost> for PostRow {
    fn from(post: &StoredPost) -> Self {
        Self {
            id: post.id,
            title: output::truncate(&post.title, 40),
            url: post.url.clone(),
            image: post
                .local_image_path
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            last_seen: post.last_seen.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

pub async fn execute(args: PostsArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response: PostsResponse = client.get(&format!("/posts?limit={}", args.limit)).await?;

    match format {
        OutputFormat::Table => {
            let rows: Vec<PostRow> = response.posts.iter().map(PostRow::from).collect();
            output::print_list(&rows, format)?;
        }
        _ => output::print_item(&response.posts, format)?,
    }

    Ok(())
}
