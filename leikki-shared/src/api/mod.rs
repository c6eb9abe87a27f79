use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::domain::{Axis, ChildId, GameId};

pub mod endpoints;
#[cfg(feature = "rest-client")]
pub mod rest;

pub const AUTH_V1_PREFIX: &str = "/auth/v1";
pub const REST_V1_PREFIX: &str = "/rest/v1";

pub const PROFILES: &str = "profiles";
pub const CHILDREN: &str = "children";
pub const GAMES: &str = "games";
pub const PLAY_SESSIONS: &str = "play_sessions";
pub const PAIR_ASSIGNMENTS: &str = "pair_assignments";
pub const UPSERT_PAIR_ASSIGNMENT_FN: &str = "upsert_pair_assignment_and_log";

/// Filter matching every row; the backend refuses unfiltered deletes.
pub const ALL_ROWS_FILTER: &str = "created_at=gte.1970-01-01T00:00:00Z";

/// Where the backend lives and the public key every request carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub url: String,
    pub anon_key: String,
}

// Auth
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordGrantReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshGrantReq {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthSessionResp {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    pub user: AuthUser,
}

/// Sign-up yields a session when the backend auto-confirms, otherwise just the user.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignUpResp {
    Session(AuthSessionResp),
    Pending(AuthUser),
}

// Tables
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileRow {
    #[serde(default)]
    pub pin_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileUpsertReq {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PinUpdateReq {
    pub pin_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChildUpsertReq {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ChildId>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis: Option<Axis>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GameUpsertReq {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<GameId>,
    pub name: String,
    pub emoji: String,
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaySessionInsertReq {
    pub child_a_id: ChildId,
    pub child_b_id: ChildId,
    pub game_id: GameId,
}

/// Arguments of the pair assignment procedure; the pair must already be sorted.
#[derive(Debug, Serialize, Deserialize)]
pub struct PairAssignmentRpcReq {
    pub child_a: ChildId,
    pub child_b: ChildId,
    pub game: GameId,
}
