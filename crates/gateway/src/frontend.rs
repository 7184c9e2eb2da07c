//! The chat page, compiled into the binary.
//!
//! Every asset under `frontend/` is listed in [`ASSETS`] and served as-is
//! with its content type. The page talks only to the `/v1` API.

use axum::{
    Router,
    http::{StatusCode, header},
    routing::get,
};

/// A static file served by the gateway.
struct Asset {
    route: &'static str,
    content_type: &'static str,
    body: &'static str,
}

const ASSETS: &[Asset] = &[
    Asset {
        route: "/",
        content_type: "text/html; charset=utf-8",
        body: include_str!("../../../frontend/index.html"),
    },
    Asset {
        route: "/static/style.css",
        content_type: "text/css; charset=utf-8",
        body: include_str!("../../../frontend/style.css"),
    },
    Asset {
        route: "/static/app.js",
        content_type: "application/javascript; charset=utf-8",
        body: include_str!("../../../frontend/app.js"),
    },
];

/// Routes for every embedded asset.
pub fn frontend_router() -> Router {
    ASSETS.iter().fold(Router::new(), |router, asset| {
        let (content_type, body) = (asset.content_type, asset.body);
        router.route(
            asset.route,
            get(move || async move {
                (
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE, content_type),
                        (header::CACHE_CONTROL, "no-cache"),
                    ],
                    body,
                )
            }),
        )
    })
}
