use std::sync::Arc;

use skiff::config::Config;
use skiff::dispatch::{HandlerGroup, Registry, RouteEntry};
use skiff::http::request::Method;
use skiff::http::response::Response;
use skiff::server;

fn registry() -> Registry {
    Registry::new()
        .group(
            HandlerGroup::new("/").get("/health", |_, _| Ok(Response::json("{\"status\":\"ok\"}"))),
        )
        .group(
            HandlerGroup::new("/hello")
                .route(
                    RouteEntry::new(Method::GET, "", |_, args| {
                        let name = args.get("name").unwrap_or("world");
                        Ok(Response::text(format!("Hello, {}!\n", name)))
                    })
                    .bind(&["name"]),
                )
                // Reachable only with `dispatch.method_policy: all_verbs`.
                .post("/echo", |req, _| {
                    Ok(Response::json(req.json().unwrap_or("{}").to_string()))
                }),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.logging.max_level())
        .init();

    let registry = Arc::new(registry());

    tokio::select! {
        res = server::listener::run(&cfg, registry) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
