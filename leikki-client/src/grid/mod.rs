//! Two-axis play grid: which children head rows and columns, and what each cell holds.

pub mod hit;
pub mod interaction;
pub mod layout;

use std::collections::HashMap;

use leikki_shared::domain::{Axis, Child, ChildId, Game, GameId, PairKey};

use crate::app_data::AppSnapshot;

pub use hit::{CellIndex, GridGeometry, recompute_hover};
pub use interaction::{GridInteraction, HoveredCell, PendingDrop, Point};
pub use layout::GridLayout;

const CELL_TINT_ALPHA: f64 = 0.25;

/// A request to put `game_id` into the cell of two distinct children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub row_child_id: ChildId,
    pub col_child_id: ChildId,
    pub game_id: GameId,
}

pub struct GridModel<'a> {
    pub rows: Vec<&'a Child>,
    pub cols: Vec<&'a Child>,
    games: HashMap<&'a GameId, &'a Game>,
    cells: HashMap<PairKey, &'a GameId>,
}

impl<'a> GridModel<'a> {
    pub fn build(snapshot: &'a AppSnapshot) -> Self {
        let rows = snapshot
            .children
            .iter()
            .filter(|c| c.axis == Some(Axis::Row))
            .collect();
        let cols = snapshot
            .children
            .iter()
            .filter(|c| c.axis == Some(Axis::Col))
            .collect();
        let games = snapshot.games.iter().map(|g| (&g.id, g)).collect();
        // Assignments arrive newest first; the first one seen for a pair wins.
        let mut cells = HashMap::with_capacity(snapshot.assignments.len());
        for a in &snapshot.assignments {
            cells.entry(a.pair()).or_insert(&a.game_id);
        }
        Self {
            rows,
            cols,
            games,
            cells,
        }
    }

    /// The game assigned to the pair, in either order; unknown games read as empty.
    pub fn game_at(&self, a: &ChildId, b: &ChildId) -> Option<&'a Game> {
        let key = PairKey::new(a.clone(), b.clone());
        let game_id = self.cells.get(&key)?;
        self.games.get(game_id).copied()
    }
}

/// Enough roster to draw a grid: two children and one game.
pub fn has_enough_data(snapshot: &AppSnapshot) -> bool {
    snapshot.children.len() >= 2 && !snapshot.games.is_empty()
}

/// Pressing a cell places the selected game, unless nothing is selected or the
/// cell pairs a child with itself.
pub fn cell_press(
    selected_game_id: Option<&GameId>,
    row_child_id: &ChildId,
    col_child_id: &ChildId,
) -> Option<Placement> {
    let game_id = selected_game_id?;
    if row_child_id == col_child_id {
        return None;
    }
    Some(Placement {
        row_child_id: row_child_id.clone(),
        col_child_id: col_child_id.clone(),
        game_id: game_id.clone(),
    })
}

/// `#RRGGBB` with an alpha byte appended (or replaced on `#RRGGBBAA`); other
/// strings pass through untouched.
pub fn with_alpha(color: &str, alpha: f64) -> String {
    let alpha = alpha.clamp(0.0, 1.0);
    let aa = format!("{:02x}", (alpha * 255.0).round() as u8);
    let trimmed = color.trim();
    let is_hex = |s: &str| s.chars().all(|c| c.is_ascii_hexdigit());
    match trimmed.strip_prefix('#') {
        Some(hex) if hex.len() == 6 && is_hex(hex) => format!("{trimmed}{aa}"),
        Some(hex) if hex.len() == 8 && is_hex(hex) => format!("{}{aa}", &trimmed[..7]),
        _ => color.to_string(),
    }
}

pub fn cell_tint(game: &Game) -> String {
    with_alpha(&game.color, CELL_TINT_ALPHA)
}
