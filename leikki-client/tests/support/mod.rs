//! In-process stand-in for the auth and table endpoints the client talks to.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, SecondsFormat, Utc};
use leikki_shared::api::Project;
use leikki_shared::auth::{AuthSession, AuthUser};
use leikki_shared::jwt::{self, AUTHENTICATED_AUDIENCE, JwtClaims};
use serde_json::{Value, json};

pub const ANON_KEY: &str = "test-anon-key";
pub const JWT_SECRET: &[u8] = b"stub-jwt-secret-for-tests";
const DEFAULT_TTL_SECS: i64 = 3600;

struct StubUser {
    id: String,
    email: String,
    password: String,
}

struct Db {
    users: Vec<StubUser>,
    refresh_tokens: HashMap<String, String>,
    tables: HashMap<String, Vec<Value>>,
    hits: Vec<String>,
    token_ttl: i64,
    auto_confirm: bool,
    rpc_enabled: bool,
    failing_reads: Vec<String>,
    clock: i64,
}

impl Default for Db {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            refresh_tokens: HashMap::new(),
            tables: HashMap::new(),
            hits: Vec::new(),
            token_ttl: DEFAULT_TTL_SECS,
            auto_confirm: true,
            rpc_enabled: true,
            failing_reads: Vec::new(),
            clock: 0,
        }
    }
}

impl Db {
    /// Strictly increasing timestamps so ordering by time is deterministic.
    fn timestamp(&mut self) -> String {
        self.clock += 1;
        (Utc::now() + Duration::milliseconds(self.clock))
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn table(&mut self, name: &str) -> &mut Vec<Value> {
        self.tables.entry(name.to_string()).or_default()
    }

    fn issue_session(&mut self, user_id: &str, email: &str) -> Value {
        let ttl = self.token_ttl;
        let expires_at = Utc::now().timestamp() + ttl;
        let access_token = mint_token(user_id, email, expires_at);
        let refresh_token = uuid::Uuid::new_v4().to_string();
        self.refresh_tokens
            .insert(refresh_token.clone(), user_id.to_string());
        json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": ttl,
            "expires_at": expires_at,
            "refresh_token": refresh_token,
            "user": {"id": user_id, "email": email},
        })
    }
}

fn mint_token(user_id: &str, email: &str, exp: i64) -> String {
    let claims = JwtClaims {
        sub: user_id.to_string(),
        exp,
        aud: Some(AUTHENTICATED_AUDIENCE.to_string()),
        email: Some(email.to_string()),
        role: Some("authenticated".to_string()),
    };
    jwt::encode(&claims, JWT_SECRET).unwrap()
}

type Shared = Arc<Mutex<Db>>;

pub struct TestBackend {
    pub base: String,
    db: Shared,
    handle: tokio::task::JoinHandle<()>,
}

impl TestBackend {
    pub async fn spawn() -> Option<Self> {
        let db: Shared = Arc::new(Mutex::new(Db::default()));
        let (addr, handle) = match start_stub(db.clone()).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                eprintln!("Skipping test due to sandbox restrictions: {e}");
                return None;
            }
            Err(e) => panic!("failed to start stub backend: {e}"),
        };
        Some(Self {
            base: format!("http://{}", addr),
            db,
            handle,
        })
    }

    pub fn project(&self) -> Project {
        Project {
            url: self.base.clone(),
            anon_key: ANON_KEY.to_string(),
        }
    }

    pub fn add_user(&self, email: &str, password: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.db.lock().unwrap().users.push(StubUser {
            id: id.clone(),
            email: email.to_string(),
            password: password.to_string(),
        });
        id
    }

    /// A session as the client would have persisted it, with a live refresh token.
    pub fn stored_session(&self, user_id: &str, email: &str, expires_at: i64) -> AuthSession {
        let refresh_token = uuid::Uuid::new_v4().to_string();
        self.db
            .lock()
            .unwrap()
            .refresh_tokens
            .insert(refresh_token.clone(), user_id.to_string());
        AuthSession {
            access_token: mint_token(user_id, email, expires_at),
            refresh_token,
            expires_at,
            user: AuthUser {
                id: user_id.to_string(),
                email: Some(email.to_string()),
            },
        }
    }

    pub fn set_token_ttl(&self, secs: i64) {
        self.db.lock().unwrap().token_ttl = secs;
    }

    pub fn require_confirmation(&self) {
        self.db.lock().unwrap().auto_confirm = false;
    }

    pub fn drop_pair_procedure(&self) {
        self.db.lock().unwrap().rpc_enabled = false;
    }

    pub fn fail_reads_of(&self, table: &str) {
        self.db.lock().unwrap().failing_reads.push(table.to_string());
    }

    pub fn seed(&self, table: &str, mut row: Value) {
        let mut db = self.db.lock().unwrap();
        let now = db.timestamp();
        if let Some(obj) = row.as_object_mut() {
            obj.entry("id")
                .or_insert_with(|| json!(uuid::Uuid::new_v4().to_string()));
            obj.entry("created_at").or_insert_with(|| json!(now));
        }
        db.table(table).push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.db
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// `METHOD /path?query` of every request served so far.
    pub fn hits(&self) -> Vec<String> {
        self.db.lock().unwrap().hits.clone()
    }

    pub fn clear_hits(&self) {
        self.db.lock().unwrap().hits.clear();
    }

    pub fn hit_count(&self, prefix: &str) -> usize {
        self.hits().iter().filter(|h| h.starts_with(prefix)).count()
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_stub(
    db: Shared,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
    let app = Router::new().fallback(dispatch).with_state(db);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok((addr, handle))
}

fn error(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

enum Caller {
    Anonymous,
    User(String),
}

fn caller(headers: &HeaderMap) -> Result<Caller, Response> {
    let apikey = headers.get("apikey").and_then(|v| v.to_str().ok());
    if apikey != Some(ANON_KEY) {
        return Err(error(
            StatusCode::UNAUTHORIZED,
            json!({"message": "Invalid API key"}),
        ));
    }
    match bearer(headers) {
        Some(ANON_KEY) | None => Ok(Caller::Anonymous),
        Some(token) => jwt::decode_and_verify(token, JWT_SECRET)
            .map(|claims| Caller::User(claims.sub))
            .map_err(|_| {
                error(
                    StatusCode::UNAUTHORIZED,
                    json!({"message": "JWT expired"}),
                )
            }),
    }
}

async fn dispatch(
    State(db): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let mut db = db.lock().unwrap();
    db.hits.push(format!("{method} {target}"));

    let body: Value = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                return error(
                    StatusCode::BAD_REQUEST,
                    json!({"message": format!("bad json: {e}")}),
                );
            }
        }
    };
    let caller = match caller(&headers) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let path = uri.path();
    if let Some(rest) = path.strip_prefix("/auth/v1/") {
        return auth(&mut db, &method, rest, &query, &body, &caller);
    }
    if let Some(function) = path.strip_prefix("/rest/v1/rpc/") {
        return rpc(&mut db, function, &body, &caller);
    }
    if let Some(table) = path.strip_prefix("/rest/v1/") {
        let prefer = headers
            .get("prefer")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        return rest(&mut db, &method, table, &query, prefer, body, &caller);
    }
    error(StatusCode::NOT_FOUND, json!({"message": "no route"}))
}

fn auth(
    db: &mut Db,
    method: &Method,
    path: &str,
    query: &HashMap<String, String>,
    body: &Value,
    caller: &Caller,
) -> Response {
    if method != Method::POST {
        return error(StatusCode::METHOD_NOT_ALLOWED, json!({"msg": "POST only"}));
    }
    let field = |name: &str| body.get(name).and_then(Value::as_str).unwrap_or("");
    match (path, query.get("grant_type").map(String::as_str)) {
        ("token", Some("password")) => {
            let found = db
                .users
                .iter()
                .find(|u| u.email == field("email") && u.password == field("password"))
                .map(|u| (u.id.clone(), u.email.clone()));
            match found {
                Some((id, email)) => Json(db.issue_session(&id, &email)).into_response(),
                None => error(
                    StatusCode::BAD_REQUEST,
                    json!({"error": "invalid_grant", "error_description": "Invalid login credentials"}),
                ),
            }
        }
        ("token", Some("refresh_token")) => {
            let Some(user_id) = db.refresh_tokens.remove(field("refresh_token")) else {
                return error(
                    StatusCode::BAD_REQUEST,
                    json!({"error": "invalid_grant", "error_description": "Invalid Refresh Token"}),
                );
            };
            let email = db
                .users
                .iter()
                .find(|u| u.id == user_id)
                .map(|u| u.email.clone())
                .unwrap_or_default();
            Json(db.issue_session(&user_id, &email)).into_response()
        }
        ("signup", _) => {
            let email = field("email").to_string();
            if db.users.iter().any(|u| u.email == email) {
                return error(
                    StatusCode::BAD_REQUEST,
                    json!({"msg": "User already registered"}),
                );
            }
            let id = uuid::Uuid::new_v4().to_string();
            db.users.push(StubUser {
                id: id.clone(),
                email: email.clone(),
                password: field("password").to_string(),
            });
            if db.auto_confirm {
                Json(db.issue_session(&id, &email)).into_response()
            } else {
                Json(json!({"id": id, "email": email})).into_response()
            }
        }
        ("logout", _) => match caller {
            Caller::User(_) => StatusCode::NO_CONTENT.into_response(),
            Caller::Anonymous => error(
                StatusCode::UNAUTHORIZED,
                json!({"msg": "This endpoint requires a Bearer token"}),
            ),
        },
        _ => error(StatusCode::NOT_FOUND, json!({"msg": "unknown auth route"})),
    }
}

/// Matches PostgREST-style `col=eq.value` and `col=gte.value` filters.
fn matches(row: &Value, filters: &[(&String, &String)]) -> bool {
    filters.iter().all(|(col, expr)| {
        let actual = match row.get(col.as_str()) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => return false,
            Some(other) => other.to_string(),
        };
        if let Some(v) = expr.strip_prefix("eq.") {
            actual == v
        } else if let Some(v) = expr.strip_prefix("gte.") {
            actual.as_str() >= v
        } else {
            false
        }
    })
}

fn sort_rows(rows: &mut [Value], order: &str) {
    let keys: Vec<(String, bool)> = order
        .split(',')
        .filter_map(|part| {
            let (col, dir) = part.rsplit_once('.')?;
            Some((col.to_string(), dir == "desc"))
        })
        .collect();
    rows.sort_by(|a, b| {
        for (col, desc) in &keys {
            let left = a.get(col).map(Value::to_string).unwrap_or_default();
            let right = b.get(col).map(Value::to_string).unwrap_or_default();
            let ord = if *desc {
                right.cmp(&left)
            } else {
                left.cmp(&right)
            };
            if ord.is_ne() {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn rest(
    db: &mut Db,
    method: &Method,
    table: &str,
    query: &HashMap<String, String>,
    prefer: &str,
    body: Value,
    caller: &Caller,
) -> Response {
    let filters: Vec<(&String, &String)> = query
        .iter()
        .filter(|(k, _)| k.as_str() != "select" && k.as_str() != "order")
        .collect();

    if *method == Method::GET {
        if db.failing_reads.iter().any(|t| t == table) {
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"message": format!("reading {table} exploded")}),
            );
        }
        if matches!(caller, Caller::Anonymous) {
            return Json(json!([])).into_response();
        }
        let mut rows: Vec<Value> = db
            .table(table)
            .iter()
            .filter(|r| matches(r, &filters))
            .cloned()
            .collect();
        if let Some(order) = query.get("order") {
            sort_rows(&mut rows, order);
        }
        return Json(Value::Array(rows)).into_response();
    }

    if matches!(caller, Caller::Anonymous) {
        return error(
            StatusCode::UNAUTHORIZED,
            json!({"message": "permission denied for table"}),
        );
    }

    match *method {
        Method::POST => {
            let rows = match body {
                Value::Array(rows) => rows,
                row @ Value::Object(_) => vec![row],
                _ => {
                    return error(StatusCode::BAD_REQUEST, json!({"message": "bad body"}));
                }
            };
            let merge = prefer.contains("merge-duplicates");
            for row in rows {
                let now = db.timestamp();
                upsert_row(db.table(table), row, merge, now);
            }
            StatusCode::CREATED.into_response()
        }
        Method::PATCH => {
            if filters.is_empty() {
                return error(
                    StatusCode::BAD_REQUEST,
                    json!({"message": "UPDATE requires a WHERE clause"}),
                );
            }
            let Value::Object(changes) = body else {
                return error(StatusCode::BAD_REQUEST, json!({"message": "bad body"}));
            };
            for row in db.table(table).iter_mut() {
                if matches(row, &filters)
                    && let Some(obj) = row.as_object_mut()
                {
                    for (k, v) in &changes {
                        obj.insert(k.clone(), v.clone());
                    }
                }
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Method::DELETE => {
            if filters.is_empty() {
                return error(
                    StatusCode::BAD_REQUEST,
                    json!({"message": "DELETE requires a WHERE clause"}),
                );
            }
            let mut removed = Vec::new();
            db.table(table).retain(|row| {
                let hit = matches(row, &filters);
                if hit && let Some(id) = row.get("id").and_then(Value::as_str) {
                    removed.push(id.to_string());
                }
                !hit
            });
            if table == "children" {
                for dependent in ["play_sessions", "pair_assignments"] {
                    db.table(dependent).retain(|row| {
                        let a = row.get("child_a_id").and_then(Value::as_str);
                        let b = row.get("child_b_id").and_then(Value::as_str);
                        !removed
                            .iter()
                            .any(|id| Some(id.as_str()) == a || Some(id.as_str()) == b)
                    });
                }
            }
            StatusCode::NO_CONTENT.into_response()
        }
        _ => error(StatusCode::METHOD_NOT_ALLOWED, json!({"message": "nope"})),
    }
}

fn upsert_row(rows: &mut Vec<Value>, mut row: Value, merge: bool, now: String) {
    let Some(obj) = row.as_object_mut() else {
        return;
    };
    if merge
        && let Some(id) = obj.get("id").and_then(Value::as_str)
        && let Some(existing) = rows
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
            .and_then(Value::as_object_mut)
    {
        for (k, v) in obj.iter() {
            existing.insert(k.clone(), v.clone());
        }
        return;
    }
    obj.entry("id")
        .or_insert_with(|| json!(uuid::Uuid::new_v4().to_string()));
    obj.entry("created_at").or_insert_with(|| json!(now));
    rows.push(row);
}

fn rpc(db: &mut Db, function: &str, body: &Value, caller: &Caller) -> Response {
    if function != "upsert_pair_assignment_and_log" || !db.rpc_enabled {
        return error(
            StatusCode::NOT_FOUND,
            json!({
                "code": "PGRST202",
                "message": format!("Could not find the function public.{function} in the schema cache"),
            }),
        );
    }
    if matches!(caller, Caller::Anonymous) {
        return error(
            StatusCode::UNAUTHORIZED,
            json!({"message": "permission denied for function"}),
        );
    }
    let arg = |name: &str| body.get(name).and_then(Value::as_str).unwrap_or("").to_string();
    let (a, b, game) = (arg("child_a"), arg("child_b"), arg("game"));
    let now = db.timestamp();

    let assignments = db.table("pair_assignments");
    let existing = assignments.iter_mut().find(|r| {
        r.get("child_a_id").and_then(Value::as_str) == Some(a.as_str())
            && r.get("child_b_id").and_then(Value::as_str) == Some(b.as_str())
    });
    match existing.and_then(Value::as_object_mut) {
        Some(row) => {
            row.insert("game_id".into(), json!(game));
            row.insert("updated_at".into(), json!(now));
        }
        None => assignments.push(json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "child_a_id": a,
            "child_b_id": b,
            "game_id": game,
            "created_at": now,
            "updated_at": now,
        })),
    }
    db.table("play_sessions").push(json!({
        "id": uuid::Uuid::new_v4().to_string(),
        "child_a_id": a,
        "child_b_id": b,
        "game_id": game,
        "created_at": now,
    }));
    StatusCode::NO_CONTENT.into_response()
}
