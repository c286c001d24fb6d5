//! Demo server exercising the router, groups, CORS and the timeout guard.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use clap::Parser;
use serde_json::json;

use switchyard::config::{load_config, AppConfig};
use switchyard::observability::init_logging;
use switchyard::routing::{Middleware, Next, ResourceController};
use switchyard::{Context, Router};

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Demo HTTP service built on the switchyard router", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the route table and exit.
    #[arg(long)]
    routes: bool,
}

struct Users;

impl ResourceController for Users {
    async fn index(&self, ctx: Context) -> Response {
        let page = ctx.request().query_int_or("page", 1);
        ctx.response().success().json(&json!({"page": page, "users": []}))
    }

    async fn show(&self, ctx: Context) -> Response {
        let id = ctx.request().route_int64("id");
        ctx.response().success().json(&json!({"id": id}))
    }

    async fn store(&self, ctx: Context) -> Response {
        let name = ctx.request().input("name");
        ctx.response().json(StatusCode::CREATED, &json!({"name": name}))
    }

    async fn update(&self, ctx: Context) -> Response {
        let request = ctx.request();
        ctx.response()
            .success()
            .json(&json!({"id": request.route("id"), "name": request.input("name")}))
    }

    async fn destroy(&self, ctx: Context) -> Response {
        ctx.response().no_content()
    }
}

async fn request_logger(ctx: Context, next: Next) -> Response {
    let method = ctx.request().method().clone();
    let path = ctx.request().path().to_string();
    let response = next.run(ctx).await;
    tracing::info!(method = %method, path = %path, status = response.status().as_u16(), "Handled");
    response
}

fn build(config: AppConfig) -> Router {
    let mut router = Router::new(config);
    let logger: Arc<dyn Middleware> = Arc::new(request_logger);
    router.global_middleware(vec![logger]);

    router.get("/", |ctx: Context| async move { ctx.response().success().string("switchyard") }).name("home");

    router.get("/timeout", |_ctx: Context| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        "finished"
    });

    router.get("/panic", |_ctx: Context| async {
        if true {
            panic!("demo panic");
        }
        StatusCode::OK
    });

    router.prefix("api").group(|api| {
        api.post("/echo", |ctx: Context| async move {
            let all = ctx.request().all();
            ctx.response().success().json(&all)
        })
        .name("api.echo");
        api.resource("/users", Users).name("api.users");
    });

    router.fallback(|ctx: Context| async move {
        ctx.response()
            .json(StatusCode::NOT_FOUND, &json!({"error": "Not Found", "path": ctx.request().path()}))
            .into_response()
    });

    router
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    init_logging(&config);

    let router = build(config);

    if cli.routes {
        for route in router.routes() {
            println!("{:<10} {:<24} {:<16} {}", route.method.as_str(), route.path, route.name, route.handler);
        }
        return Ok(());
    }

    tracing::info!(
        address = %router.config().http.address(),
        request_timeout_secs = router.config().http.request_timeout_secs,
        "Configuration loaded"
    );

    router.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
