use leikki_shared::domain::{ChildId, GameId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A grid cell addressed by the children heading its row and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoveredCell {
    pub row_child_id: ChildId,
    pub col_child_id: ChildId,
}

/// What a pointer release over the grid asks to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDrop {
    pub cell: HoveredCell,
    pub game_id: GameId,
}

/// Selected game plus drag state. Ephemeral and never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridInteraction {
    selected_game_id: Option<GameId>,
    dragging_game_id: Option<GameId>,
    pointer: Option<Point>,
    hovered: Option<HoveredCell>,
}

impl GridInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_game_id(&self) -> Option<&GameId> {
        self.selected_game_id.as_ref()
    }

    pub fn set_selected_game_id(&mut self, game_id: Option<GameId>) {
        self.selected_game_id = game_id;
    }

    pub fn dragging_game_id(&self) -> Option<&GameId> {
        self.dragging_game_id.as_ref()
    }

    pub fn pointer(&self) -> Option<Point> {
        self.pointer
    }

    pub fn hovered(&self) -> Option<&HoveredCell> {
        self.hovered.as_ref()
    }

    pub fn start_drag(&mut self, game_id: GameId) {
        self.dragging_game_id = Some(game_id);
        self.pointer = None;
        self.hovered = None;
    }

    /// A non-finite coordinate forgets the pointer instead of storing it.
    pub fn update_pointer(&mut self, x: f64, y: f64) {
        self.pointer = if x.is_finite() && y.is_finite() {
            Some(Point { x, y })
        } else {
            None
        };
    }

    pub fn set_hovered(&mut self, row_child_id: ChildId, col_child_id: ChildId) {
        self.hovered = Some(HoveredCell {
            row_child_id,
            col_child_id,
        });
    }

    pub fn clear_hovered(&mut self) {
        self.hovered = None;
    }

    pub fn end_drag(&mut self) {
        self.dragging_game_id = None;
        self.pointer = None;
        self.hovered = None;
    }

    /// Ends the drag and hands back the cell hovered at release, if any.
    pub fn release(&mut self) -> Option<PendingDrop> {
        let game_id = self.dragging_game_id.take();
        let cell = self.hovered.take();
        self.pointer = None;
        Some(PendingDrop {
            cell: cell?,
            game_id: game_id?,
        })
    }
}
