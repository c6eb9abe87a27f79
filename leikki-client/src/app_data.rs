//! Working set of children, games, history, assignments and PIN.
//!
//! Every mutation writes remotely and then re-reads everything; the snapshot is
//! never patched locally.

use std::collections::HashMap;
use std::sync::Arc;

use leikki_shared::api::{
    self, CHILDREN, ChildUpsertReq, GAMES, GameUpsertReq, PAIR_ASSIGNMENTS, PLAY_SESSIONS,
    PROFILES, PairAssignmentRpcReq, PinUpdateReq, PlaySessionInsertReq, ProfileRow,
    ProfileUpsertReq, UPSERT_PAIR_ASSIGNMENT_FN, rest::RestError,
};
use leikki_shared::domain::{
    Axis, Child, ChildId, DEFAULT_GAME_COLOR, Game, GameId, PairAssignment, PairKey, Pin,
    PlaySession, clamp_glyph, is_hex_rgb,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::AppError;
use crate::session::SessionHolder;

const CHILD_COLUMNS: &str = "id,name,axis";
const GAME_COLUMNS: &str = "id,name,emoji,color";
const SESSION_COLUMNS: &str = "id,child_a_id,child_b_id,game_id,created_at";
const ASSIGNMENT_COLUMNS: &str = "id,child_a_id,child_b_id,game_id,updated_at";

#[derive(Debug, Clone, Default)]
pub struct AppSnapshot {
    pub children: Vec<Child>,
    pub games: Vec<Game>,
    /// Newest first.
    pub sessions: Vec<PlaySession>,
    /// Newest first.
    pub assignments: Vec<PairAssignment>,
    pub pin_code: Option<Pin>,
    pub loading: bool,
}

impl AppSnapshot {
    pub fn child(&self, id: &ChildId) -> Option<&Child> {
        self.children.iter().find(|c| &c.id == id)
    }

    pub fn game(&self, id: &GameId) -> Option<&Game> {
        self.games.iter().find(|g| &g.id == id)
    }

    /// How many history entries exist for the pair, in either order.
    pub fn pair_history_count(&self, a: &ChildId, b: &ChildId) -> usize {
        let key = PairKey::new(a.clone(), b.clone());
        self.sessions.iter().filter(|s| s.pair() == key).count()
    }

    pub fn assignment_index(&self) -> HashMap<PairKey, &PairAssignment> {
        let mut index = HashMap::with_capacity(self.assignments.len());
        for a in &self.assignments {
            index.entry(a.pair()).or_insert(a);
        }
        index
    }
}

/// Child to create or rename; `id: None` creates.
#[derive(Debug, Clone)]
pub struct ChildInput {
    pub id: Option<ChildId>,
    pub name: String,
}

/// Game to create or edit; `id: None` creates.
#[derive(Debug, Clone)]
pub struct GameInput {
    pub id: Option<GameId>,
    pub name: String,
    pub emoji: String,
    pub color: String,
}

pub struct AppDataCache {
    session: SessionHolder,
    state: watch::Sender<Arc<AppSnapshot>>,
}

fn remote(context: &'static str) -> impl FnOnce(RestError) -> AppError {
    move |source| AppError::Remote { context, source }
}

impl AppDataCache {
    pub fn new(session: SessionHolder) -> Self {
        let (state, _) = watch::channel(Arc::new(AppSnapshot::default()));
        Self { session, state }
    }

    pub fn snapshot(&self) -> Arc<AppSnapshot> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AppSnapshot>> {
        self.state.subscribe()
    }

    /// Re-reads the whole working set and replaces the snapshot in one step.
    pub async fn refresh_all(&self) -> Result<(), AppError> {
        self.set_loading(true);
        let Ok(project) = self.session.project() else {
            self.state.send_replace(Arc::new(AppSnapshot::default()));
            return Ok(());
        };
        let result = self.fetch_all(project).await;
        match result {
            Ok(snapshot) => {
                debug!(
                    children = snapshot.children.len(),
                    games = snapshot.games.len(),
                    assignments = snapshot.assignments.len(),
                    "snapshot refreshed"
                );
                self.state.send_replace(Arc::new(snapshot));
                Ok(())
            }
            Err(e) => {
                self.set_loading(false);
                Err(e)
            }
        }
    }

    async fn fetch_all(&self, project: &api::Project) -> Result<AppSnapshot, AppError> {
        let bearer = self.session.bearer().await?;
        let user = self.session.user();

        if let Some(user) = &user {
            let profile = ProfileUpsertReq {
                id: user.id.clone(),
                email: user.email.clone(),
            };
            if let Err(e) = api::rest::upsert(project, &bearer, PROFILES, &profile).await {
                warn!(error=%e, user=%user.id, "profile upsert failed; continuing");
            }
        }

        let profile = async {
            match &user {
                Some(user) => {
                    api::rest::select_one::<ProfileRow>(
                        project, &bearer, PROFILES, "pin_code", &user.id,
                    )
                    .await
                }
                None => Ok(None),
            }
        };
        let (profile, children, games, sessions, assignments) = tokio::try_join!(
            profile,
            api::rest::select::<Child>(
                project,
                &bearer,
                CHILDREN,
                CHILD_COLUMNS,
                Some("axis.asc,name.asc"),
            ),
            api::rest::select::<Game>(project, &bearer, GAMES, GAME_COLUMNS, Some("name.asc")),
            api::rest::select::<PlaySession>(
                project,
                &bearer,
                PLAY_SESSIONS,
                SESSION_COLUMNS,
                Some("created_at.desc"),
            ),
            api::rest::select::<PairAssignment>(
                project,
                &bearer,
                PAIR_ASSIGNMENTS,
                ASSIGNMENT_COLUMNS,
                Some("updated_at.desc"),
            ),
        )
        .map_err(remote("loading data failed"))?;

        let pin_code = profile
            .and_then(|p| p.pin_code)
            .and_then(|raw| match Pin::parse(&raw) {
                Ok(pin) => Some(pin),
                Err(e) => {
                    warn!(error=%e, "ignoring malformed stored PIN");
                    None
                }
            });

        Ok(AppSnapshot {
            children,
            games,
            sessions,
            assignments,
            pin_code,
            loading: false,
        })
    }

    pub async fn upsert_child(&self, input: ChildInput) -> Result<(), AppError> {
        let project = self.session.project()?;
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("child name is empty".into()));
        }
        let req = match input.id {
            Some(id) => ChildUpsertReq {
                id: Some(id),
                name,
                axis: None,
            },
            None => {
                let axis = Axis::balanced(self.snapshot().children.iter());
                ChildUpsertReq {
                    id: None,
                    name,
                    axis: Some(axis),
                }
            }
        };
        let bearer = self.session.bearer().await?;
        api::rest::upsert(project, &bearer, CHILDREN, &req)
            .await
            .map_err(remote("saving child failed"))?;
        info!(name=%req.name, axis=?req.axis, "child saved");
        self.refresh_all().await
    }

    pub async fn delete_child(&self, id: &ChildId) -> Result<(), AppError> {
        let project = self.session.project()?;
        let bearer = self.session.bearer().await?;
        api::rest::delete_by_id(project, &bearer, CHILDREN, &id.0)
            .await
            .map_err(remote("deleting child failed"))?;
        info!(child=%id, "child deleted");
        self.refresh_all().await
    }

    pub async fn upsert_game(&self, input: GameInput) -> Result<(), AppError> {
        let project = self.session.project()?;
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("game name is empty".into()));
        }
        let color = match input.color.trim() {
            "" => DEFAULT_GAME_COLOR.to_string(),
            c if is_hex_rgb(c) => c.to_string(),
            c => return Err(AppError::Validation(format!("color {c} is not #RRGGBB"))),
        };
        let req = GameUpsertReq {
            id: input.id,
            name,
            emoji: clamp_glyph(&input.emoji),
            color,
        };
        let bearer = self.session.bearer().await?;
        api::rest::upsert(project, &bearer, GAMES, &req)
            .await
            .map_err(remote("saving game failed"))?;
        info!(name=%req.name, "game saved");
        self.refresh_all().await
    }

    pub async fn delete_game(&self, id: &GameId) -> Result<(), AppError> {
        let project = self.session.project()?;
        let bearer = self.session.bearer().await?;
        api::rest::delete_by_id(project, &bearer, GAMES, &id.0)
            .await
            .map_err(remote("deleting game failed"))?;
        info!(game=%id, "game deleted");
        self.refresh_all().await
    }

    /// Appends a history entry without touching the pair's assignment.
    pub async fn add_play_session(
        &self,
        a: &ChildId,
        b: &ChildId,
        game: &GameId,
    ) -> Result<(), AppError> {
        let project = self.session.project()?;
        let Some(pair) = PairKey::distinct(a.clone(), b.clone()) else {
            debug!(child=%a, "ignoring self-pair");
            return Ok(());
        };
        let req = PlaySessionInsertReq {
            child_a_id: pair.low().clone(),
            child_b_id: pair.high().clone(),
            game_id: game.clone(),
        };
        let bearer = self.session.bearer().await?;
        api::rest::insert(project, &bearer, PLAY_SESSIONS, &req)
            .await
            .map_err(remote("saving play session failed"))?;
        info!(pair=%pair, game=%game, "play session logged");
        self.refresh_all().await
    }

    /// Places `game` in the pair's cell and logs it; a self-pair is dropped silently.
    pub async fn upsert_pair_assignment(
        &self,
        a: &ChildId,
        b: &ChildId,
        game: &GameId,
    ) -> Result<(), AppError> {
        let project = self.session.project()?;
        let Some(pair) = PairKey::distinct(a.clone(), b.clone()) else {
            debug!(child=%a, "ignoring self-pair");
            return Ok(());
        };
        let req = PairAssignmentRpcReq {
            child_a: pair.low().clone(),
            child_b: pair.high().clone(),
            game: game.clone(),
        };
        let bearer = self.session.bearer().await?;
        api::rest::rpc(project, &bearer, UPSERT_PAIR_ASSIGNMENT_FN, &req)
            .await
            .map_err(|source| AppError::Procedure {
                function: UPSERT_PAIR_ASSIGNMENT_FN,
                source,
            })?;
        info!(pair=%pair, game=%game, "pair assignment saved");
        self.refresh_all().await
    }

    /// Clears history and assignments; children, games and PIN stay.
    pub async fn reset_grid(&self) -> Result<(), AppError> {
        let project = self.session.project()?;
        let bearer = self.session.bearer().await?;
        tokio::try_join!(
            api::rest::delete_all(project, &bearer, PLAY_SESSIONS),
            api::rest::delete_all(project, &bearer, PAIR_ASSIGNMENTS),
        )
        .map_err(remote("resetting grid failed"))?;
        info!("grid reset");
        self.refresh_all().await
    }

    pub async fn reset_all_children(&self) -> Result<(), AppError> {
        let project = self.session.project()?;
        let bearer = self.session.bearer().await?;
        api::rest::delete_all(project, &bearer, CHILDREN)
            .await
            .map_err(remote("removing children failed"))?;
        info!("all children removed");
        self.refresh_all().await
    }

    pub async fn update_pin_code(&self, input: &str) -> Result<(), AppError> {
        let project = self.session.project()?;
        let pin = Pin::parse(input).map_err(|e| AppError::Validation(e.to_string()))?;
        let user = self.session.user().ok_or(AppError::NotSignedIn)?;
        let bearer = self.session.bearer().await?;
        let req = PinUpdateReq {
            pin_code: pin.as_str().to_string(),
        };
        api::rest::update_by_id(project, &bearer, PROFILES, &user.id, &req)
            .await
            .map_err(remote("saving PIN failed"))?;
        info!(user=%user.id, "PIN updated");
        self.refresh_all().await
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|current| {
            if current.loading == loading {
                return false;
            }
            let mut next = (**current).clone();
            next.loading = loading;
            *current = Arc::new(next);
            true
        });
    }
}
