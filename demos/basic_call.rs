//! Basic example: register routes and call them by name.
//!
//! This example shows how to:
//! - Create a dispatcher with default headers
//! - Register GET and POST routes with default options
//! - Override options per call
//! - Access the response body and metadata
//!
//! Run with: `cargo run --example basic_call`

use routeline::{CallOptions, Dispatcher, Error, RequestOptions, RouteDefinition, RouteMethod};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("routeline=debug,basic_call=info")
        .init();

    let dispatcher = Dispatcher::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .default_header("Accept", "application/json")?
        .log_to_tracing()
        .build()?;

    dispatcher
        .register(RouteDefinition::new("get_post", RouteMethod::Get, "/posts/1"))
        .register(
            RouteDefinition::new("list_posts", RouteMethod::Get, "/posts")
                .with_options(RequestOptions::new().with_query_param("userId", 1)),
        )
        .register(
            RouteDefinition::new("create_post", RouteMethod::Post, "/posts")
                .with_log_name("posts api"),
        );

    println!("Registered routes: {:?}", dispatcher.route_names());
    println!();

    println!("=== GET Route ===");
    let response = dispatcher.call("get_post", CallOptions::new()).await?;
    let post: Post = response.json()?;

    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!("Request latency: {:?}", response.latency);
    println!("Status code: {}", response.status);
    println!();

    println!("=== GET Route with Query Override ===");
    let posts: Vec<Post> = dispatcher
        .call("list_posts", CallOptions::new().with_query_param("userId", 2))
        .await?
        .json()?;
    println!("User 2 has {} posts", posts.len());
    println!();

    println!("=== POST Route ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };

    let response = dispatcher
        .call("create_post", CallOptions::new().with_json(&new_post)?)
        .await?;
    let created: Post = response.json()?;

    println!("Created post ID: {}", created.id);
    println!("Title: {}", created.title);
    println!();

    println!("=== Accessing Response Metadata ===");
    println!("Raw response length: {} bytes", response.body.len());
    println!("Content-Type: {:?}", response.header("content-type"));
    println!("Was retried: {}", response.was_retried());

    Ok(())
}
