//! Cell and header sizing for a window of a given size.

pub const CELL_MIN: f64 = 44.0;
pub const HEADER_MIN: f64 = 96.0;
const TABLET_MIN_SIDE: f64 = 900.0;
const TABLET_VISIBLE_COLS: usize = 10;
const PHONE_VISIBLE_COLS: usize = 6;
/// Horizontal space kept free for the row header and margins.
const RESERVED_WIDTH: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub cell_size: f64,
    pub header_size: f64,
    pub tablet: bool,
}

pub fn is_tablet(width: f64, height: f64) -> bool {
    width.max(height) >= TABLET_MIN_SIDE
}

impl GridLayout {
    pub fn for_window(width: f64, height: f64, col_count: usize) -> Self {
        let tablet = is_tablet(width, height);
        let target = if tablet {
            TABLET_VISIBLE_COLS
        } else {
            PHONE_VISIBLE_COLS
        };
        let columns = col_count.clamp(1, target) as f64;
        let approx = ((width - RESERVED_WIDTH) / (columns + 1.0)).floor();
        let cell_size = approx.max(CELL_MIN);
        let header_size = (cell_size * 1.6).floor().max(HEADER_MIN);
        Self {
            cell_size,
            header_size,
            tablet,
        }
    }
}
