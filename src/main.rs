mod analyzer;
mod config;
mod engine;
mod error;
mod extraction;
mod guide;
mod models;
mod selection;
mod session_manager;
mod upload;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use analyzer::{ColorAnalyzer, Swatch};
use config::Settings;
use engine::{ColorProfile, HexColor};
use error::{AppError, DecodeError, RejectionError};
use extraction::{OpenAiExtractor, TextExtractor};
use guide::StyleGuide;
use models::{
    ClickRequest, GenerateResponse, NoticeEvent, SessionCreated, SessionSnapshot, TextResponse,
};
use session_manager::{Session, SessionManager};
use upload::LogoUpload;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;
const GC_INTERVAL_SECS: u64 = 60;

#[derive(Clone)]
struct AppState {
    sessions: Arc<RwLock<SessionManager>>,
    analyzer: Arc<ColorAnalyzer>,
    extractor: Arc<dyn TextExtractor>,
    settings: Arc<Settings>,
}

impl AppState {
    fn new(settings: Settings, extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(SessionManager::new(settings.session_ttl))),
            analyzer: Arc::new(ColorAnalyzer::new()),
            extractor,
            settings: Arc::new(settings),
        }
    }

    async fn session(&self, id: &str) -> Result<Arc<Session>, AppError> {
        let session = self
            .sessions
            .read()
            .await
            .get_session(id)
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))?;
        session.touch();
        Ok(session)
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let settings = Settings::from_env();
    if settings.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set, text extraction will fail");
    }
    let port = settings.port;
    let extractor = Arc::new(OpenAiExtractor::new(&settings));
    let state = AppState::new(settings, extractor);

    // Start garbage collection task
    let gc_sessions = state.sessions.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(GC_INTERVAL_SECS)).await;
            let mut sessions = gc_sessions.write().await;
            let removed = sessions.garbage_collect();
            if removed > 0 {
                info!("Collected {} idle sessions, {} remain", removed, sessions.len());
            }
        }
    });

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    info!("Server shut down gracefully");
}

fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.settings.max_upload_bytes + MULTIPART_OVERHEAD);

    // Routes defined after a layer are affected by that layer
    // Color profiles never change, everything else is per-session
    Router::new()
        .route("/api/colors/{hex}", get(color_profile))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=31536000, immutable"),
        ))
        .route("/api/logo/text", post(extract_text).layer(upload_limit.clone()))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/events", get(session_events))
        .route("/api/sessions/{id}/logo", post(upload_logo).layer(upload_limit))
        .route("/api/sessions/{id}/selection", post(select_color))
        .route("/api/sessions/{id}/guide", get(get_guide))
        .route("/api/sessions/{id}/generate", post(generate))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .route("/liveness_check", get(health_check))
        .route("/readiness_check", get(health_check))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([header::CONTENT_TYPE]),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Log the failure and pass it on to the session's subscribers as a notice.
async fn notify<T>(session: &Session, result: Result<T, AppError>) -> Result<T, AppError> {
    if let Err(err) = &result {
        warn!("Session {}: {}", session.id(), err);
        session
            .publish_notice(NoticeEvent::error(err.user_message()))
            .await;
    }
    result
}

async fn health_check() -> &'static str {
    "OK"
}

async fn color_profile(Path(hex): Path<String>) -> Result<Json<ColorProfile>, AppError> {
    let color: HexColor = hex.parse()?;
    Ok(Json(ColorProfile::derive(color)))
}

async fn extract_text(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TextResponse>, AppError> {
    let logo = upload::read_logo(&mut multipart, state.settings.max_upload_bytes)
        .await
        .inspect_err(|e| warn!("{}", e))?;

    let text = state
        .extractor
        .extract(&logo)
        .await
        .inspect_err(|e| warn!("Text extraction for {} failed: {}", logo.file_name, e))?;

    Ok(Json(TextResponse::success(text)))
}

async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.sessions.write().await.create_session();
    let id = session.id().to_string();

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/sessions/{}", id)) {
        headers.insert(header::LOCATION, location);
    }

    (StatusCode::CREATED, headers, Json(SessionCreated { id }))
}

async fn get_session(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = state.session(&id).await?;
    Ok(Json(session.snapshot().await))
}

async fn session_events(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let session = state.session(&id).await?;

    if session.subscriber_count() >= state.settings.max_subscribers_per_session {
        warn!("Stream {} rejected: max subscribers reached", id);
        return Ok(StatusCode::TOO_MANY_REQUESTS.into_response());
    }

    info!("New subscriber to session: {}", id);

    // Subscribe and send stats update
    let stream = session.subscribe().await;
    let stats = session.get_stats().await;
    session.publish_stats(stats).await;

    let sse_stream = stream.map(|event| -> Result<axum::response::sse::Event, Infallible> {
        Ok(axum::response::sse::Event::default()
            .event(&event.event_type)
            .data(event.data))
    });

    let sse_response = Sse::new(sse_stream)
        .keep_alive(
            axum::response::sse::KeepAlive::new().interval(std::time::Duration::from_secs(15)),
        )
        .into_response();

    // Add headers to prevent proxy/CDN caching or buffering
    let (mut parts, body) = sse_response.into_parts();
    parts
        .headers
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    parts
        .headers
        .insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    Ok(Response::from_parts(parts, body))
}

async fn upload_logo(
    Path(id): Path<String>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<Swatch>>, AppError> {
    let session = state.session(&id).await?;
    let result = analyze_upload(&state, &session, &mut multipart).await;
    notify(&session, result).await.map(Json)
}

async fn analyze_upload(
    state: &AppState,
    session: &Session,
    multipart: &mut Multipart,
) -> Result<Vec<Swatch>, AppError> {
    let logo = upload::read_logo(multipart, state.settings.max_upload_bytes).await?;
    let ticket = session.begin_upload();
    info!(
        "Session {}: analyzing {} ({} bytes)",
        session.id(),
        logo.file_name,
        logo.bytes.len()
    );

    let analyzer = state.analyzer.clone();
    let bytes = logo.bytes.clone();
    let kind = logo.kind;
    let swatches = tokio::task::spawn_blocking(move || analyzer.analyze(&bytes, kind))
        .await
        .map_err(|_| DecodeError::Interrupted)??;

    let name = logo.file_name.clone();
    if !session.complete_upload(ticket, logo, swatches.clone()).await {
        return Err(RejectionError::Superseded { name }.into());
    }
    Ok(swatches)
}

async fn select_color(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(click): Json<ClickRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = state.session(&id).await?;
    let result = async {
        let color: HexColor = click.hex.parse()?;
        session.select(color).await?;
        Ok::<(), AppError>(())
    }
    .await;
    notify(&session, result).await?;

    Ok(Json(session.snapshot().await))
}

async fn get_guide(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StyleGuide>, AppError> {
    let session = state.session(&id).await?;
    let selection = session.selection().await;
    let brand = session.brand_text().await;

    let result = StyleGuide::compose(&selection, brand.as_deref()).map_err(AppError::from);
    notify(&session, result).await.map(Json)
}

async fn generate(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GenerateResponse>, AppError> {
    let session = state.session(&id).await?;
    let result = generate_guide(&state, &session).await;
    notify(&session, result).await.map(Json)
}

async fn generate_guide(state: &AppState, session: &Session) -> Result<GenerateResponse, AppError> {
    let logo: LogoUpload = session.logo().await.ok_or(RejectionError::NoLogo)?;
    let selection = session.selection().await;
    if !selection.is_complete() {
        return Err(RejectionError::IncompleteSelection.into());
    }

    let text = state.extractor.extract(&logo).await?;
    info!("Session {}: recognized {:?}", session.id(), text);
    session.set_brand_text(text.clone()).await;
    session
        .publish_notice(NoticeEvent::info(format!("Recognized \"{}\"", text)))
        .await;

    let guide = StyleGuide::compose(&selection, Some(&text))?;
    Ok(GenerateResponse { text, guide })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use image::{ImageFormat, Rgba, RgbaImage};
    use serde_json::Value;
    use std::io::Cursor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "logo-guide-test-boundary";

    struct FixedExtractor(Option<&'static str>);

    #[async_trait]
    impl TextExtractor for FixedExtractor {
        async fn extract(&self, _logo: &LogoUpload) -> Result<String, ServiceError> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| ServiceError::Payload("no output".to_string()))
        }
    }

    fn test_state(text: Option<&'static str>) -> AppState {
        let settings = Settings {
            max_upload_bytes: 64 * 1024,
            ..Settings::default()
        };
        AppState::new(settings, Arc::new(FixedExtractor(text)))
    }

    /// Red on the left 60%, blue on the right 40%.
    fn logo_png() -> Vec<u8> {
        let image = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 6 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn multipart(file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        multipart_to("/api/logo/text", file_name, content_type, data)
    }

    fn multipart_to(uri: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"logo\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_post(uri: &str, json: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn new_session(app: &Router) -> String {
        let request = Request::post("/api/sessions").body(Body::empty()).unwrap();
        let (status, json) = send(app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = router(test_state(None));
        let response = app.oneshot(get("/liveness_check")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_color_profile_route() {
        let app = router(test_state(None));
        let response = app.clone().oneshot(get("/api/colors/ff0000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CACHE_CONTROL]
            .to_str()
            .unwrap()
            .contains("immutable"));

        let (_, json) = send(&app, get("/api/colors/ff0000")).await;
        assert_eq!(json["rgb"], "(255, 0, 0)");
        assert_eq!(json["hsl"], "(0, 100%, 50%)");
        assert_eq!(json["foreground"], "#fff");
        assert_eq!(json["shades"]["500"], "#ff0000");

        let (status, json) = send(&app, get("/api/colors/nothex")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("nothex"));
    }

    #[tokio::test]
    async fn test_extract_text_endpoint() {
        let app = router(test_state(Some("ACME")));
        let (status, json) = send(&app, multipart("acme.png", "image/png", &logo_png())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Success.");
        assert_eq!(json["data"], "ACME");
    }

    #[tokio::test]
    async fn test_extract_text_service_failure() {
        let app = router(test_state(None));
        let (status, json) = send(&app, multipart("acme.png", "image/png", &logo_png())).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_extract_text_rejects_unsupported_file() {
        let app = router(test_state(Some("ACME")));
        let (status, json) = send(&app, multipart("anim.gif", "image/gif", b"GIF89a")).await;

        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(
            json["error"],
            "File anim.gif was rejected: unsupported type image/gif"
        );
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let app = router(test_state(None));
        let (status, _) = send(&app, get("/api/sessions/no-such-session")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_full_session_flow() {
        let app = router(test_state(Some("ACME")));
        let id = new_session(&app).await;

        // Upload: red covers more of the logo than blue
        let uri = format!("/api/sessions/{id}/logo");
        let (status, swatches) =
            send(&app, multipart_to(&uri, "acme.png", "image/png", &logo_png())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(swatches[0]["hex"], "#ff0000");
        assert_eq!(swatches[1]["hex"], "#0000ff");

        // No guide before both colors are picked
        let (status, _) = send(&app, get(&format!("/api/sessions/{id}/guide"))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let select = format!("/api/sessions/{id}/selection");
        send(&app, json_post(&select, serde_json::json!({ "hex": "#ff0000" }))).await;
        let (status, snapshot) =
            send(&app, json_post(&select, serde_json::json!({ "hex": "0000FF" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["selection"]["primary"], "#ff0000");
        assert_eq!(snapshot["selection"]["secondary"], "#0000ff");

        // A color outside the palette is refused
        let (status, _) =
            send(&app, json_post(&select, serde_json::json!({ "hex": "#00ff00" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, guide) = send(&app, get(&format!("/api/sessions/{id}/guide"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(guide["pages"][0]["background"], "#ff0000");

        let (status, generated) = send(
            &app,
            Request::post(format!("/api/sessions/{id}/generate"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(generated["text"], "ACME");
        assert_eq!(generated["guide"]["pages"][0]["title"], "ACME");

        let (_, snapshot) = send(&app, get(&format!("/api/sessions/{id}"))).await;
        assert_eq!(snapshot["brandText"], "ACME");
        assert_eq!(snapshot["logo"]["fileName"], "acme.png");
    }

    /// Uploads the red/blue logo and selects both colors.
    async fn session_with_selection(app: &Router) -> (String, Value) {
        let id = new_session(app).await;
        let uri = format!("/api/sessions/{id}/logo");
        let upload = multipart_to(&uri, "acme.png", "image/png", &logo_png());
        let (status, _) = send(app, upload).await;
        assert_eq!(status, StatusCode::OK);

        let select = format!("/api/sessions/{id}/selection");
        send(app, json_post(&select, serde_json::json!({ "hex": "#ff0000" }))).await;
        send(app, json_post(&select, serde_json::json!({ "hex": "#0000ff" }))).await;

        let (_, snapshot) = send(app, get(&format!("/api/sessions/{id}"))).await;
        assert_eq!(snapshot["selection"]["secondary"], "#0000ff");
        (id, snapshot)
    }

    #[tokio::test]
    async fn test_corrupt_upload_keeps_previous_palette() {
        let app = router(test_state(None));
        let (id, before) = session_with_selection(&app).await;
        let uri = format!("/api/sessions/{id}/logo");

        let (status, json) =
            send(&app, multipart_to(&uri, "broken.png", "image/png", b"not a png")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["error"].is_string());

        let (_, snapshot) = send(&app, get(&format!("/api/sessions/{id}"))).await;
        assert_eq!(snapshot["logo"]["fileName"], "acme.png");
        assert_eq!(snapshot["swatches"].as_array().unwrap().len(), 2);
        assert_eq!(snapshot["selection"], before["selection"]);
    }

    #[tokio::test]
    async fn test_transparent_upload_keeps_previous_palette() {
        let app = router(test_state(None));
        let (id, before) = session_with_selection(&app).await;
        let uri = format!("/api/sessions/{id}/logo");

        let blank = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 0]));
        let mut buffer = Cursor::new(Vec::new());
        blank.write_to(&mut buffer, ImageFormat::Png).unwrap();

        let (status, json) = send(
            &app,
            multipart_to(&uri, "blank.png", "image/png", &buffer.into_inner()),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["error"].as_str().unwrap().contains("opaque"));

        let (_, snapshot) = send(&app, get(&format!("/api/sessions/{id}"))).await;
        assert_eq!(snapshot["logo"], before["logo"]);
        assert_eq!(snapshot["swatches"], before["swatches"]);
        assert_eq!(snapshot["selection"], before["selection"]);
    }

    #[tokio::test]
    async fn test_oversized_upload_names_file() {
        let app = router(test_state(None));
        let id = new_session(&app).await;
        let uri = format!("/api/sessions/{id}/logo");
        let big = vec![0u8; 64 * 1024 + 1];

        let (status, json) = send(&app, multipart_to(&uri, "huge.png", "image/png", &big)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(json["error"].as_str().unwrap().contains("huge.png"));
    }

    #[tokio::test]
    async fn test_generate_requires_logo_and_selection() {
        let app = router(test_state(Some("ACME")));
        let id = new_session(&app).await;
        let generate = || {
            Request::post(format!("/api/sessions/{id}/generate"))
                .body(Body::empty())
                .unwrap()
        };

        let (status, json) = send(&app, generate()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "Upload a logo first");

        let uri = format!("/api/sessions/{id}/logo");
        send(&app, multipart_to(&uri, "acme.png", "image/png", &logo_png())).await;
        let (status, json) = send(&app, generate()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "Select a primary and a secondary color first");
    }
}
