use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::auth::{AuthSession, SESSION_COOKIE};
use crate::live_scores::SupervisorHandle;

#[derive(Clone)]
pub struct AppState {
    pub live: SupervisorHandle,
    pub auth: Arc<dyn AuthSession>,
    pub http: reqwest::Client,
    /// Companion function base URL, used for test publishes
    pub function_url: String,
}

/// Build the Axum router for the login/home/live views and their JSON API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/home", get(|| async { Redirect::to("/") }))
        .route("/login", get(login_page).post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/cricket", get(cricket_page))
        .route("/datastream", get(|| async { Redirect::to("/cricket") }))
        .route("/api/matches", get(matches_handler))
        .route("/api/status", get(status_handler))
        .route("/api/reconnect", post(reconnect_handler))
        .route("/api/publish-test", post(publish_test_handler))
        .fallback(|| async { Redirect::to("/") })
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

fn session_id(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE).map(|c| c.value())
}

async fn authenticated(state: &AppState, jar: &CookieJar) -> bool {
    match state.auth.is_authenticated(session_id(jar)).await {
        Ok(ok) => ok,
        Err(e) => {
            error!("Error checking auth status: {}", e);
            false
        }
    }
}

/// GET / – home, or a redirect to /login
async fn home_handler(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if !authenticated(&state, &jar).await {
        return Redirect::to("/login").into_response();
    }
    Html(HOME_HTML).into_response()
}

async fn login_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if authenticated(&state, &jar).await {
        return Redirect::to("/").into_response();
    }
    Html(LOGIN_HTML.replace("{error}", "")).into_response()
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    token: String,
}

/// POST /login – sets the session cookie on success
async fn login_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.auth.sign_in(&form.token).await {
        Ok(Some(id)) => {
            let cookie = Cookie::build((SESSION_COOKIE, id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax);
            (jar.add(cookie), Redirect::to("/")).into_response()
        }
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            Html(LOGIN_HTML.replace("{error}", "Login failed. Please try again.")),
        )
            .into_response(),
        Err(e) => {
            error!("Login error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// POST /logout – always ends on the login page, even if sign-out fails
async fn logout_handler(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let target = match state.auth.sign_out(session_id(&jar), "/login").await {
        Ok(target) => target,
        Err(e) => {
            error!("Sign out error: {}", e);
            "/login".to_string()
        }
    };
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to(&target)).into_response()
}

async fn cricket_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if !authenticated(&state, &jar).await {
        return Redirect::to("/login").into_response();
    }
    Html(CRICKET_HTML).into_response()
}

/// GET /api/matches
async fn matches_handler(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if !authenticated(&state, &jar).await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(state.live.board().snapshot().await).into_response()
}

/// GET /api/status
async fn status_handler(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if !authenticated(&state, &jar).await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(state.live.status()).into_response()
}

/// POST /api/reconnect – close and start over with fresh credentials
async fn reconnect_handler(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if !authenticated(&state, &jar).await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state.live.reconnect().await {
        Ok(()) => Json(state.live.status()).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

/// POST /api/publish-test – ask the companion function for a synthetic update
async fn publish_test_handler(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if !authenticated(&state, &jar).await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let url = format!(
        "{}/publish-cricket-update",
        state.function_url.trim_end_matches('/')
    );
    let result = async {
        let resp = state.http.get(&url).send().await?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await?;
        Ok::<_, reqwest::Error>((status, body))
    }
    .await;

    match result {
        Ok((status, body)) => {
            info!("Test update published: {}", status);
            let code = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            (code, Json(body)).into_response()
        }
        Err(e) => {
            error!("Error publishing test update: {}", e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

const HOME_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Cricket Live</title></head>
<body>
  <h1>Welcome to DataStreams</h1>
  <p>You are successfully logged in!</p>
  <a href="/cricket">View Live Cricket Scores</a>
  <form method="post" action="/logout"><button type="submit">Sign Out</button></form>
</body>
</html>"#;

const LOGIN_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Cricket Live – Sign in</title></head>
<body>
  <h1>Sign in</h1>
  <p style="color:#c00">{error}</p>
  <form method="post" action="/login">
    <input type="password" name="token" placeholder="Access token">
    <button type="submit">Sign In</button>
  </form>
</body>
</html>"#;

/// Live view: polls the read-only JSON endpoints.
const CRICKET_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>Live Cricket Scores</title>
<style>
  body { font-family: system-ui, sans-serif; margin: 2rem; }
  .status-connected { color: #00a060; } .status-connecting { color: #e09000; }
  .status-error { color: #d02040; } .status-disconnected { color: #888; }
  .match { border: 1px solid #ddd; border-radius: 8px; padding: 1rem; margin: .8rem 0; }
  .live { color: #d02040; font-weight: 700; }
</style>
</head>
<body>
<h1>🏏 Live Cricket Scores</h1>
<p>Status: <span id="status">…</span> <span id="note"></span>
  <button onclick="reconnect()">Reconnect</button>
  <button onclick="publishTest()">Publish test update</button></p>
<p id="updated"></p>
<div id="matches"></div>
<script>
const statusClass = s => ({Connected:'status-connected', Connecting:'status-connecting', Error:'status-error'})[s] || 'status-disconnected';
async function load() {
  const [sr, mr] = await Promise.all([fetch('/api/status'), fetch('/api/matches')]);
  if (!sr.ok || !mr.ok) return;
  const s = await sr.json();
  const el = document.getElementById('status');
  el.textContent = s.state; el.className = statusClass(s.state);
  document.getElementById('note').textContent =
    (s.degraded ? 'Failed to initialize real-time connection. Using static data. ' : '') +
    (s.reconnect_pending ? 'Reconnecting…' : '') + (s.last_error && !s.degraded ? s.last_error : '');
  document.getElementById('updated').textContent = s.last_updated
    ? 'Last updated ' + new Date(s.last_updated).toLocaleTimeString() + ' (' + s.messages_received + ' messages)' : '';
  const matches = await mr.json();
  document.getElementById('matches').innerHTML = matches.map(m => `<div class="match">
    <h3>${m.name} ${m.live ? '<span class="live">LIVE</span>' : ''}</h3>
    <div>${m.team1.name}: ${m.team1.score} (${m.team1.overs})</div>
    <div>${m.team2.name}: ${m.team2.score} (${m.team2.overs})</div>
    <div>${m.status}</div>
    <small>${m.venue} · ${m.date} · ${m.format}</small>
    ${m.current_over ? `<p><em>${m.current_over}</em></p>` : ''}
  </div>`).join('');
}
async function reconnect() { await fetch('/api/reconnect', {method:'POST'}); load(); }
async function publishTest() { await fetch('/api/publish-test', {method:'POST'}); }
load();
setInterval(load, 2000);
</script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalSession;
    use crate::error::LiveError;
    use crate::live_scores::{
        Connector, CredentialSource, Reconciler, ScoreBoard, Supervisor, SupervisorConfig,
        Transport, TransportEvent,
    };
    use crate::live_scores::seed::seed_matches;
    use crate::models::ConnectionCredentials;
    use async_trait::async_trait;

    /// Credential source that always refuses, leaving the board on seed data.
    struct Refusing;

    #[async_trait]
    impl CredentialSource for Refusing {
        fn name(&self) -> &str {
            "refusing"
        }
        async fn fetch_credentials(&self, _: &str) -> Result<ConnectionCredentials, LiveError> {
            Err(LiveError::CredentialFetch("offline".into()))
        }
    }

    struct NoTransport;
    struct NeverConnects;

    #[async_trait]
    impl Transport for NoTransport {
        async fn send(&mut self, _: String) -> Result<(), LiveError> {
            Ok(())
        }
        async fn next_event(&mut self) -> TransportEvent {
            TransportEvent::Closed
        }
        async fn close(&mut self) -> Result<(), LiveError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for NeverConnects {
        type Transport = NoTransport;
        async fn connect(&self, _: &ConnectionCredentials) -> Result<NoTransport, LiveError> {
            Err(LiveError::TransportOpen("unused".into()))
        }
    }

    async fn serve(token: Option<&str>) -> (String, reqwest::Client) {
        let supervisor = Supervisor::new(
            Refusing,
            NeverConnects,
            SupervisorConfig::default(),
            Reconciler::default(),
            ScoreBoard::new(seed_matches()),
        );
        let (live, _task) = SupervisorHandle::spawn(supervisor);
        let mut status = live.watch_status();
        status.wait_for(|s| s.degraded).await.unwrap();

        let state = AppState {
            live,
            auth: Arc::new(LocalSession::new(token.map(|t| t.to_string()))),
            http: reqwest::Client::new(),
            function_url: "http://127.0.0.1:9".into(),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        (format!("http://{}", addr), client)
    }

    /// `name=value` of the session cookie set by a login response.
    fn session_cookie(resp: &reqwest::Response) -> String {
        let set = resp.headers()["set-cookie"].to_str().unwrap();
        assert!(set.starts_with(SESSION_COOKIE), "{}", set);
        assert!(set.contains("HttpOnly"), "{}", set);
        set.split(';').next().unwrap().to_string()
    }

    async fn sign_in(client: &reqwest::Client, base: &str, token: &str) -> reqwest::Response {
        client
            .post(format!("{}/login", base))
            .form(&[("token", token)])
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_views_redirect_to_login_when_signed_out() {
        let (base, client) = serve(Some("s3cret")).await;

        let resp = client.get(format!("{}/", base)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()["location"], "/login");

        let resp = client.get(format!("{}/api/matches", base)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_then_read_seed_matches_and_status() {
        let (base, client) = serve(Some("s3cret")).await;

        let resp = sign_in(&client, &base, "wrong").await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get("set-cookie").is_none());

        let resp = sign_in(&client, &base, "s3cret").await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let cookie = session_cookie(&resp);

        let matches: Vec<serde_json::Value> = client
            .get(format!("{}/api/matches", base))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0]["id"], "IND_vs_AUS_ODI_1");

        let status: serde_json::Value = client
            .get(format!("{}/api/status", base))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["state"], "Error");
        assert_eq!(status["degraded"], true);

        let resp = client
            .post(format!("{}/logout", base))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.headers()["location"], "/login");

        // The old cookie no longer opens anything.
        let resp = client
            .get(format!("{}/api/status", base))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_one_sign_in_does_not_open_the_api_to_others() {
        let (base, client) = serve(Some("s3cret")).await;
        let resp = sign_in(&client, &base, "s3cret").await;
        let cookie = session_cookie(&resp);

        let resp = client
            .get(format!("{}/api/matches", base))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let stranger = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        for path in ["/api/matches", "/api/status"] {
            let resp = stranger.get(format!("{}{}", base, path)).send().await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "GET {}", path);
        }
        for path in ["/api/reconnect", "/api/publish-test"] {
            let resp = stranger.post(format!("{}{}", base, path)).send().await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "POST {}", path);
        }

        let resp = stranger
            .get(format!("{}/api/status", base))
            .header("cookie", format!("{}=0123456789abcdef0123456789abcdef", SESSION_COOKIE))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = stranger.get(format!("{}/cricket", base)).send().await.unwrap();
        assert_eq!(resp.headers()["location"], "/login");
    }

    #[tokio::test]
    async fn test_route_aliases_redirect() {
        let (base, client) = serve(None).await;

        let resp = client.get(format!("{}/datastream", base)).send().await.unwrap();
        assert!(resp.status().is_redirection());
        assert_eq!(resp.headers()["location"], "/cricket");

        let resp = client.get(format!("{}/home", base)).send().await.unwrap();
        assert_eq!(resp.headers()["location"], "/");

        let resp = client.get(format!("{}/no/such/page", base)).send().await.unwrap();
        assert!(resp.status().is_redirection());
        assert_eq!(resp.headers()["location"], "/");
    }

    #[tokio::test]
    async fn test_reconnect_endpoint_retries_credentials() {
        let (base, client) = serve(None).await;

        let status: serde_json::Value = client
            .post(format!("{}/api/reconnect", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["state"], "Error");
        assert_eq!(status["degraded"], true);
    }
}
