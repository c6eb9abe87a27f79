//! Text rendering of the grid, palette and history, plus name lookups for the CLI.

use std::fmt::Write;

use leikki_shared::domain::{Child, ChildId, Game, GameId};

use crate::AppError;
use crate::app_data::AppSnapshot;
use crate::grid::{self, GridModel};

pub const SAVE_FAILED: &str = "Tallennus epäonnistui";
pub const WRONG_PIN: &str = "Väärä PIN";
const EMPTY_CELL: &str = "·";

fn width(s: &str) -> usize {
    s.chars().count()
}

fn pad(s: &str, w: usize) -> String {
    let mut out = s.to_string();
    out.extend(std::iter::repeat_n(' ', w.saturating_sub(width(s))));
    out
}

pub fn render_grid(snapshot: &AppSnapshot) -> String {
    if !grid::has_enough_data(snapshot) {
        return "Aloita admin-tilasta: lisää vähintään 2 lasta ja 1 peli.\n".to_string();
    }
    let model = GridModel::build(snapshot);
    let head_w = model
        .rows
        .iter()
        .map(|c| width(&c.name))
        .max()
        .unwrap_or(0);
    let col_w: Vec<usize> = model.cols.iter().map(|c| width(&c.name).max(2)).collect();

    let mut out = String::new();
    out.push_str(&pad("", head_w));
    for (col, w) in model.cols.iter().zip(&col_w) {
        out.push_str(" | ");
        out.push_str(&pad(&col.name, *w));
    }
    out.push('\n');
    for row in &model.rows {
        out.push_str(&pad(&row.name, head_w));
        for (col, w) in model.cols.iter().zip(&col_w) {
            let glyph = model
                .game_at(&row.id, &col.id)
                .map(|g| g.emoji.as_str())
                .unwrap_or(EMPTY_CELL);
            out.push_str(" | ");
            out.push_str(&pad(glyph, *w));
        }
        out.push('\n');
    }
    out
}

pub fn render_games(snapshot: &AppSnapshot, selected: Option<&GameId>) -> String {
    let mut out = String::new();
    for g in &snapshot.games {
        let mark = if Some(&g.id) == selected { '*' } else { ' ' };
        let _ = writeln!(out, "{mark} {} {} {} [{}]", g.emoji, g.name, g.color, g.id);
    }
    out
}

pub fn render_children(snapshot: &AppSnapshot) -> String {
    let mut out = String::new();
    for c in &snapshot.children {
        let axis = c.axis.map(|a| a.to_string()).unwrap_or_else(|| "-".into());
        let _ = writeln!(out, "{:<4} {} [{}]", axis, c.name, c.id);
    }
    out
}

pub fn render_history(snapshot: &AppSnapshot, limit: usize) -> String {
    let name = |id: &ChildId| {
        snapshot
            .child(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    };
    let mut out = String::new();
    for s in snapshot.sessions.iter().take(limit) {
        let game = snapshot
            .game(&s.game_id)
            .map(|g| format!("{} {}", g.emoji, g.name))
            .unwrap_or_else(|| s.game_id.to_string());
        let at = s.created_at;
        let _ = writeln!(
            out,
            "{} {:02}:{:02}  {} + {}  {}  ({}x)",
            at.date(),
            at.hour(),
            at.minute(),
            name(&s.child_a_id),
            name(&s.child_b_id),
            game,
            snapshot.pair_history_count(&s.child_a_id, &s.child_b_id),
        );
    }
    out
}

/// Matches an exact id first, then a unique case-insensitive name.
pub fn resolve_child<'a>(snapshot: &'a AppSnapshot, needle: &str) -> Result<&'a Child, AppError> {
    resolve(&snapshot.children, needle, |c| c.id.0.as_str(), |c| c.name.as_str(), "child")
}

pub fn resolve_game<'a>(snapshot: &'a AppSnapshot, needle: &str) -> Result<&'a Game, AppError> {
    resolve(&snapshot.games, needle, |g| g.id.0.as_str(), |g| g.name.as_str(), "game")
}

fn resolve<'a, T>(
    items: &'a [T],
    needle: &str,
    id: impl Fn(&T) -> &str,
    name: impl Fn(&T) -> &str,
    kind: &str,
) -> Result<&'a T, AppError> {
    let needle = needle.trim();
    if let Some(hit) = items.iter().find(|it| id(it) == needle) {
        return Ok(hit);
    }
    let mut by_name = items
        .iter()
        .filter(|it| name(it).to_lowercase() == needle.to_lowercase());
    match (by_name.next(), by_name.next()) {
        (Some(hit), None) => Ok(hit),
        (Some(_), Some(_)) => Err(AppError::Validation(format!(
            "{kind} name {needle:?} is ambiguous; use the id"
        ))),
        _ => Err(AppError::Validation(format!("no {kind} matches {needle:?}"))),
    }
}
