//! Maps a pointer position to the grid cell under it.

use leikki_shared::domain::Child;

use super::interaction::{GridInteraction, Point};

/// Row and column index into the body of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellIndex {
    pub row: usize,
    pub col: usize,
}

/// Measured placement of the grid on screen.
///
/// The body starts `header_size` right of `origin` (row names) and one
/// `cell_size` below it (column names).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub origin: Point,
    pub header_size: f64,
    pub cell_size: f64,
    pub scroll: Point,
    pub row_count: usize,
    pub col_count: usize,
}

impl GridGeometry {
    pub fn hit_test(&self, pointer: Point) -> Option<CellIndex> {
        if !(self.cell_size > 0.0) {
            return None;
        }
        let rx = pointer.x - (self.origin.x + self.header_size);
        let ry = pointer.y - (self.origin.y + self.cell_size);
        if !(rx >= 0.0 && ry >= 0.0) {
            return None;
        }
        let col = ((rx + self.scroll.x) / self.cell_size).floor();
        let row = ((ry + self.scroll.y) / self.cell_size).floor();
        if !(col >= 0.0 && row >= 0.0) {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.row_count || col >= self.col_count {
            return None;
        }
        Some(CellIndex { row, col })
    }
}

/// Recomputes the hovered cell after a pointer or scroll change.
///
/// `origin` is `None` until the grid has been measured; hovering is cleared then,
/// as it is when nothing is being dragged.
pub fn recompute_hover(
    interaction: &mut GridInteraction,
    origin: Option<Point>,
    header_size: f64,
    cell_size: f64,
    scroll: Point,
    rows: &[Child],
    cols: &[Child],
) {
    let dragging = interaction.dragging_game_id().is_some();
    let pointer = interaction.pointer();
    let (true, Some(pointer), Some(origin)) = (dragging, pointer, origin) else {
        interaction.clear_hovered();
        return;
    };
    let geometry = GridGeometry {
        origin,
        header_size,
        cell_size,
        scroll,
        row_count: rows.len(),
        col_count: cols.len(),
    };
    match geometry.hit_test(pointer) {
        Some(CellIndex { row, col }) => {
            interaction.set_hovered(rows[row].id.clone(), cols[col].id.clone())
        }
        None => interaction.clear_hovered(),
    }
}
