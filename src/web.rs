use crate::{
    app::{AppContext, AppError, SearchHit},
    corpus::CourseRecord,
    crawler::CrawlSummary,
    semantic::SearchError,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => log::error!("failed to install signal handler: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/courses_data", get(courses_data))
        .route("/scrape", get(scrape))
        .route("/search", get(search))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(ctx)
}

async fn start_app(ctx: Arc<AppContext>) -> anyhow::Result<()> {
    let addr = ctx.config().listen_addr();
    let indexed = ctx.index().len();
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr} ({indexed} courses indexed)");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(ctx: AppContext) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(Arc::new(ctx)).await })
}

#[derive(Debug)]
struct HttpError(AppError);

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            AppError::Search(SearchError::EmptyQuery) => axum::http::StatusCode::BAD_REQUEST,
            AppError::CrawlInProgress => axum::http::StatusCode::CONFLICT,
            _ => {
                log::error!("{self:?}");
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn courses_data(State(ctx): State<Arc<AppContext>>) -> Json<Vec<CourseRecord>> {
    let courses = tokio::task::block_in_place(move || ctx.courses());
    Json(courses.records().to_vec())
}

async fn scrape(State(ctx): State<Arc<AppContext>>) -> Result<Json<CrawlSummary>, HttpError> {
    tokio::task::block_in_place(move || ctx.crawl().map(Json).map_err(Into::into))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub keyword: String,
}

async fn search(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, HttpError> {
    log::debug!("search: {params:?}");

    if params.keyword.is_empty() {
        return Err(AppError::from(SearchError::EmptyQuery).into());
    }

    tokio::task::block_in_place(move || {
        ctx.search(&params.keyword)
            .map(Json)
            .map_err(Into::into)
    })
}
