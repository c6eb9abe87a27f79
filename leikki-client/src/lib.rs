use std::future::Future;
use std::io::{self, Write};

use leikki_shared::api::rest::RestError;
use tracing::{info, warn};

pub mod app_data;
pub mod cli;
pub mod config;
pub mod grid;
pub mod pin;
pub mod present;
pub mod session;
pub mod store;

pub use app_data::{AppDataCache, AppSnapshot, ChildInput, GameInput};
pub use cli::{AdminCommand, ChildCommand, Cli, Command, GameCommand};
pub use config::{ClientConfig, load_config, resolve_config_path};
pub use session::{SessionHolder, SessionState, SignUpOutcome};

use grid::GridInteraction;
use pin::AdminGate;
use present::{SAVE_FAILED, WRONG_PIN};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error("{context}: {}", .source.message())]
    Remote {
        context: &'static str,
        #[source]
        source: RestError,
    },
    #[error(
        "calling {function} failed: {}; the backend schema must define the function {function}",
        .source.message()
    )]
    Procedure {
        function: &'static str,
        #[source]
        source: RestError,
    },
    #[error("{0}")]
    Validation(String),
    #[error("not signed in")]
    NotSignedIn,
    #[error("wrong PIN")]
    WrongPin,
    #[error("secure store error: {0}")]
    Store(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn prompt(msg: &str) -> Result<String, AppError> {
    print!("{}", msg);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf)?;
    Ok(buf.trim().to_string())
}

/// Runs a mutation; on failure shows the save alert and re-reads everything
/// so the screen matches the backend again.
pub async fn commit(
    data: &AppDataCache,
    mutation: impl Future<Output = Result<(), AppError>>,
) -> Result<(), AppError> {
    let Err(e) = mutation.await else {
        return Ok(());
    };
    eprintln!("{SAVE_FAILED}: {e}");
    if let Err(refresh) = data.refresh_all().await {
        warn!(error=%refresh, "refresh after failed save also failed");
    }
    Err(e)
}

/// Places `game` in the cell of `row` and `col` (ids or names) the way a cell
/// press does. Returns `false` when the press asked for nothing, as with a
/// child paired with itself.
pub async fn assign(
    data: &AppDataCache,
    row: &str,
    col: &str,
    game: &str,
) -> Result<bool, AppError> {
    let snapshot = data.snapshot();
    let row = present::resolve_child(&snapshot, row)?.id.clone();
    let col = present::resolve_child(&snapshot, col)?.id.clone();
    let game = present::resolve_game(&snapshot, game)?.id.clone();

    let mut interaction = GridInteraction::new();
    interaction.set_selected_game_id(Some(game));
    let Some(placement) = grid::cell_press(interaction.selected_game_id(), &row, &col) else {
        info!(child=%row, "ignoring self-pair");
        return Ok(false);
    };
    commit(
        data,
        data.upsert_pair_assignment(
            &placement.row_child_id,
            &placement.col_child_id,
            &placement.game_id,
        ),
    )
    .await?;
    Ok(true)
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    init_tracing();

    let (cfg_path, cfg) = ClientConfig::find_and_load(cli.config)?;
    info!(path=?cfg_path, configured = cfg.project().is_some(), "loaded config");

    let session = SessionHolder::new(cfg.project(), store::open_default());
    session.init().await?;
    let data = AppDataCache::new(session.clone());

    match cli.command {
        Command::SignIn { email } => {
            session.project()?;
            let email = match email {
                Some(e) => e,
                None => prompt("Email: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            session.sign_in_with_password(&email, &password).await?;
            println!("Signed in as {}", email.trim());
        }
        Command::SignUp { email } => {
            session.project()?;
            let email = match email {
                Some(e) => e,
                None => prompt("Email: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            match session.sign_up_with_password(&email, &password).await? {
                SignUpOutcome::SignedIn => println!("Account created; signed in as {}", email.trim()),
                SignUpOutcome::ConfirmationPending => {
                    println!("Account created; confirm the address sent to {}", email.trim())
                }
            }
        }
        Command::SignOut => {
            session.sign_out().await?;
            println!("Signed out");
        }
        Command::Status => print_status(&session, &data).await?,
        Command::Grid => {
            data.refresh_all().await?;
            print!("{}", present::render_grid(&data.snapshot()));
        }
        Command::Games => {
            data.refresh_all().await?;
            print!("{}", present::render_games(&data.snapshot(), None));
        }
        Command::Children => {
            data.refresh_all().await?;
            print!("{}", present::render_children(&data.snapshot()));
        }
        Command::History { limit } => {
            data.refresh_all().await?;
            print!("{}", present::render_history(&data.snapshot(), limit));
        }
        Command::Assign { row, col, game } => {
            session.project()?;
            data.refresh_all().await?;
            if !assign(&data, &row, &col, &game).await? {
                println!("A child cannot play with themselves; nothing changed");
            }
            print!("{}", present::render_grid(&data.snapshot()));
        }
        Command::Log { a, b, game } => {
            session.project()?;
            data.refresh_all().await?;
            let snapshot = data.snapshot();
            let a = present::resolve_child(&snapshot, &a)?.id.clone();
            let b = present::resolve_child(&snapshot, &b)?.id.clone();
            let game = present::resolve_game(&snapshot, &game)?.id.clone();
            commit(&data, data.add_play_session(&a, &b, &game)).await?;
            print!("{}", present::render_history(&data.snapshot(), 5));
        }
        Command::Admin { pin, action } => {
            session.project()?;
            data.refresh_all().await?;
            let entered = match pin {
                Some(p) => p,
                None => rpassword::prompt_password("PIN: ")?,
            };
            let mut gate = AdminGate::new();
            if let Err(e) = gate.try_unlock(&entered, data.snapshot().pin_code.as_ref()) {
                if matches!(e, AppError::WrongPin) {
                    eprintln!("{WRONG_PIN}");
                }
                return Err(e);
            }
            run_admin(&data, action).await?;
            gate.lock();
        }
    }
    Ok(())
}

async fn print_status(session: &SessionHolder, data: &AppDataCache) -> Result<(), AppError> {
    let state = session.state();
    if state.env_missing {
        println!("{}", config::MISSING_ENV_MESSAGE);
        return Ok(());
    }
    match &state.session {
        Some(s) => println!(
            "Signed in as {} ({})",
            s.user.email.as_deref().unwrap_or("-"),
            s.user.id
        ),
        None => println!("Not signed in"),
    }
    data.refresh_all().await?;
    let snapshot = data.snapshot();
    println!(
        "{} children, {} games, {} play sessions, {} assignments, PIN {}",
        snapshot.children.len(),
        snapshot.games.len(),
        snapshot.sessions.len(),
        snapshot.assignments.len(),
        if snapshot.pin_code.is_some() {
            "set"
        } else {
            "default"
        },
    );
    Ok(())
}

async fn run_admin(data: &AppDataCache, action: AdminCommand) -> Result<(), AppError> {
    let snapshot = data.snapshot();
    match action {
        AdminCommand::Child(ChildCommand::Add { name }) => {
            commit(data, data.upsert_child(ChildInput { id: None, name })).await?;
            print!("{}", present::render_children(&data.snapshot()));
        }
        AdminCommand::Child(ChildCommand::Rename { child, name }) => {
            let id = present::resolve_child(&snapshot, &child)?.id.clone();
            commit(data, data.upsert_child(ChildInput { id: Some(id), name })).await?;
            print!("{}", present::render_children(&data.snapshot()));
        }
        AdminCommand::Child(ChildCommand::Delete { child }) => {
            let id = present::resolve_child(&snapshot, &child)?.id.clone();
            commit(data, data.delete_child(&id)).await?;
            print!("{}", present::render_children(&data.snapshot()));
        }
        AdminCommand::Game(GameCommand::Add { name, emoji, color }) => {
            let input = GameInput {
                id: None,
                name,
                emoji,
                color,
            };
            commit(data, data.upsert_game(input)).await?;
            print!("{}", present::render_games(&data.snapshot(), None));
        }
        AdminCommand::Game(GameCommand::Edit {
            game,
            name,
            emoji,
            color,
        }) => {
            let current = present::resolve_game(&snapshot, &game)?;
            let input = GameInput {
                id: Some(current.id.clone()),
                name: name.unwrap_or_else(|| current.name.clone()),
                emoji: emoji.unwrap_or_else(|| current.emoji.clone()),
                color: color.unwrap_or_else(|| current.color.clone()),
            };
            let selected = input.id.clone();
            commit(data, data.upsert_game(input)).await?;
            print!(
                "{}",
                present::render_games(&data.snapshot(), selected.as_ref())
            );
        }
        AdminCommand::Game(GameCommand::Delete { game }) => {
            let id = present::resolve_game(&snapshot, &game)?.id.clone();
            commit(data, data.delete_game(&id)).await?;
            print!("{}", present::render_games(&data.snapshot(), None));
        }
        AdminCommand::ResetGrid => {
            commit(data, data.reset_grid()).await?;
            println!("Grid cleared");
        }
        AdminCommand::ResetChildren => {
            commit(data, data.reset_all_children()).await?;
            println!("All children removed");
        }
        AdminCommand::SetPin { new_pin } => {
            commit(data, data.update_pin_code(&new_pin)).await?;
            println!("PIN updated");
        }
    }
    Ok(())
}
