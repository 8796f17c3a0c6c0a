use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::BackendConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{Credentials, LoginResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuedVia {
    Login,
    Refresh,
}

/// The current bearer session. Only `SessionManager` ever sees the token.
#[derive(Clone)]
struct Session {
    bearer_token: String,
    issued_via: IssuedVia,
    expired: bool,
}

impl Session {
    fn new(bearer_token: String, issued_via: IssuedVia) -> Self {
        Self {
            bearer_token,
            issued_via,
            expired: false,
        }
    }
}

enum SessionState {
    Unauthenticated,
    Authenticated(Session),
    Expired(Session),
}

/// Token-free view of the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    Authenticated(IssuedVia),
    Expired(IssuedVia),
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

/// Owns the bearer session and executes authorized calls.
///
/// A call answered with 401 marks the session expired and triggers one
/// recovery: token refresh first, then a full re-login with the stored
/// credentials. The rejected call is replayed once with the new token.
/// Recovery runs under the state lock, so concurrent callers holding the
/// same stale token share a single refresh.
pub struct SessionManager {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    state: Mutex<SessionState>,
}

impl SessionManager {
    pub fn new(config: &BackendConfig, credentials: Option<Credentials>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            credentials,
            state: Mutex::new(SessionState::Unauthenticated),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    pub async fn status(&self) -> SessionStatus {
        match &*self.state.lock().await {
            SessionState::Unauthenticated => SessionStatus::Unauthenticated,
            SessionState::Authenticated(s) => SessionStatus::Authenticated(s.issued_via),
            SessionState::Expired(s) => SessionStatus::Expired(s.issued_via),
        }
    }

    /// Log in with the stored credentials.
    pub async fn login(&self) -> ClientResult<LoginResponse> {
        let login = self.authenticate().await?;
        *self.state.lock().await =
            SessionState::Authenticated(Session::new(login.token.clone(), IssuedVia::Login));

        match &login.user {
            Some(user) => log::info!("✅ Logged in as {} (role: {})", user.email, user.role),
            None => log::info!("✅ Logged in"),
        }
        Ok(login)
    }

    /// Resume with a token issued by an earlier login.
    pub async fn restore(&self, token: impl Into<String>) {
        *self.state.lock().await = SessionState::Authenticated(Session::new(token.into(), IssuedVia::Login));
        log::info!("🔑 Session restored from saved token");
    }

    pub async fn logout(&self) {
        *self.state.lock().await = SessionState::Unauthenticated;
    }

    /// Execute an authorized request.
    ///
    /// `build` creates the request from the shared HTTP client and is called
    /// again for the replay, so it must not consume one-shot bodies. The
    /// bearer header is attached here. The returned response may still carry
    /// any status; a 401 at this point means recovery did not help.
    pub async fn execute<F>(&self, build: F) -> ClientResult<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let (token, recovered) = self.token_for_call().await?;

        let response = self.send(&build, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        log::warn!("🔒 Request rejected with 401, session expired");
        self.mark_expired(&token).await;
        if recovered {
            return Ok(response);
        }

        let fresh = self.recover(&token).await?;
        log::info!("🔁 Replaying request with renewed session");
        let replay = self.send(&build, &fresh).await?;
        if replay.status() == StatusCode::UNAUTHORIZED {
            log::error!("❌ Replay rejected with 401 after session recovery");
            self.mark_expired(&fresh).await;
        }
        Ok(replay)
    }

    /// Token for a new call. An expired session is recovered up front, and
    /// the flag tells `execute` not to recover again for this call.
    async fn token_for_call(&self) -> ClientResult<(String, bool)> {
        let stale = {
            let state = self.state.lock().await;
            match &*state {
                SessionState::Authenticated(s) => return Ok((s.bearer_token.clone(), false)),
                SessionState::Expired(s) => s.bearer_token.clone(),
                SessionState::Unauthenticated => return Err(ClientError::NotAuthenticated),
            }
        };
        let token = self.recover(&stale).await?;
        Ok((token, true))
    }

    async fn send<F>(&self, build: &F, token: &str) -> ClientResult<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let request = build(&self.http)
            .bearer_auth(token)
            .build()
            .map_err(ClientError::Transport)?;
        log::debug!("📤 {} {}", request.method(), request.url());

        let response = self.http.execute(request).await.map_err(ClientError::Transport)?;
        log::debug!("📥 Response status: {}", response.status());
        Ok(response)
    }

    async fn mark_expired(&self, token: &str) {
        let mut state = self.state.lock().await;
        if let SessionState::Authenticated(s) = &*state {
            if s.bearer_token == token && !s.expired {
                let mut session = s.clone();
                session.expired = true;
                *state = SessionState::Expired(session);
            }
        }
    }

    /// Replace `stale` with a working token: refresh, then re-login.
    /// The lock is held for the whole sequence.
    async fn recover(&self, stale: &str) -> ClientResult<String> {
        let mut state = self.state.lock().await;

        // Refresh with the newest token held, which may be newer than `stale`
        let current = match &*state {
            SessionState::Authenticated(s) if s.bearer_token != stale => {
                log::debug!("🔑 Session already renewed by another call");
                return Ok(s.bearer_token.clone());
            }
            SessionState::Authenticated(s) | SessionState::Expired(s) => s.bearer_token.clone(),
            SessionState::Unauthenticated => {
                return Err(ClientError::AuthExhausted {
                    refresh: "session was already discarded".to_string(),
                    login: "session was already discarded".to_string(),
                });
            }
        };

        log::info!("🔄 Refreshing session token");
        let refresh_failure = match self.refresh(&current).await {
            Ok(token) => {
                log::info!("✅ Session token refreshed");
                *state = SessionState::Authenticated(Session::new(token.clone(), IssuedVia::Refresh));
                return Ok(token);
            }
            Err(e) => {
                log::warn!("⚠️ Token refresh failed: {}", e);
                e.to_string()
            }
        };

        log::info!("🔄 Logging in again with stored credentials");
        let login_failure = match self.authenticate().await {
            Ok(login) => {
                log::info!("✅ Re-login succeeded");
                *state = SessionState::Authenticated(Session::new(login.token.clone(), IssuedVia::Login));
                return Ok(login.token);
            }
            Err(e) => {
                log::warn!("⚠️ Re-login failed: {}", e);
                e.to_string()
            }
        };

        log::error!("❌ Session recovery exhausted, discarding session");
        *state = SessionState::Unauthenticated;
        Err(ClientError::AuthExhausted {
            refresh: refresh_failure,
            login: login_failure,
        })
    }

    async fn refresh(&self, stale: &str) -> ClientResult<String> {
        let response = self
            .http
            .post(self.api_url("/refresh-token"))
            .bearer_auth(stale)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        let refreshed: RefreshResponse = decode(response).await?;
        if refreshed.token.is_empty() {
            return Err(ClientError::Decode {
                reason: "refresh returned an empty token".to_string(),
                body: String::new(),
            });
        }
        Ok(refreshed.token)
    }

    async fn authenticate(&self) -> ClientResult<LoginResponse> {
        let credentials = self.credentials.as_ref().ok_or(ClientError::MissingCredentials)?;

        let response = self
            .http
            .post(self.api_url("/login"))
            .json(credentials)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        decode(response).await
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(ClientError::Transport)?;
    if !status.is_success() {
        return Err(ClientError::from_status(status, body));
    }
    serde_json::from_str(&body).map_err(|e| ClientError::Decode {
        reason: e.to_string(),
        body,
    })
}
