use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const DEFAULT_GAME_EMOJI: &str = "🎲";
pub const DEFAULT_GAME_COLOR: &str = "#4F46E5";
pub const PIN_LEN: usize = 4;
const GLYPH_MAX_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildId(pub String);

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ChildId {
    fn from(value: &str) -> Self {
        ChildId(value.to_string())
    }
}

impl FromStr for ChildId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ChildId(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for GameId {
    fn from(value: &str) -> Self {
        GameId(value.to_string())
    }
}

/// Which side of the grid a child is listed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Row,
    Col,
}

impl Axis {
    /// Axis for a newly created child: the side with fewer members, rows on a tie.
    pub fn balanced<'a>(existing: impl IntoIterator<Item = &'a Child>) -> Axis {
        let (mut rows, mut cols) = (0usize, 0usize);
        for child in existing {
            match child.axis {
                Some(Axis::Row) => rows += 1,
                Some(Axis::Col) => cols += 1,
                None => {}
            }
        }
        if rows <= cols { Axis::Row } else { Axis::Col }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Row => f.write_str("row"),
            Axis::Col => f.write_str("col"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub id: ChildId,
    pub name: String,
    #[serde(default)]
    pub axis: Option<Axis>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub color: String,
}

/// One entry of the append-only play history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaySession {
    pub id: String,
    pub child_a_id: ChildId,
    pub child_b_id: ChildId,
    pub game_id: GameId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PlaySession {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.child_a_id.clone(), self.child_b_id.clone())
    }
}

/// The game currently placed in one grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairAssignment {
    pub id: String,
    pub child_a_id: ChildId,
    pub child_b_id: ChildId,
    pub game_id: GameId,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PairAssignment {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.child_a_id.clone(), self.child_b_id.clone())
    }
}

/// Unordered pair of children, stored with the smaller id first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    low: ChildId,
    high: ChildId,
}

impl PairKey {
    pub fn new(a: ChildId, b: ChildId) -> Self {
        if a <= b {
            PairKey { low: a, high: b }
        } else {
            PairKey { low: b, high: a }
        }
    }

    /// Like [`PairKey::new`] but `None` for a child paired with itself.
    pub fn distinct(a: ChildId, b: ChildId) -> Option<Self> {
        if a == b { None } else { Some(Self::new(a, b)) }
    }

    pub fn low(&self) -> &ChildId {
        &self.low
    }

    pub fn high(&self) -> &ChildId {
        &self.high
    }

    pub fn contains(&self, id: &ChildId) -> bool {
        &self.low == id || &self.high == id
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PinError {
    #[error("PIN must be {PIN_LEN} digits, got {0}")]
    WrongLength(usize),
}

/// A 4-digit admin PIN.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pin(String);

impl Pin {
    /// Strips non-digits, keeps the first four and requires exactly four.
    pub fn parse(input: &str) -> Result<Pin, PinError> {
        let digits = sanitize_pin(input);
        if digits.len() != PIN_LEN {
            return Err(PinError::WrongLength(digits.len()));
        }
        Ok(Pin(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(****)")
    }
}

impl TryFrom<String> for Pin {
    type Error = PinError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Pin::parse(&value)
    }
}

impl From<Pin> for String {
    fn from(value: Pin) -> Self {
        value.0
    }
}

/// Digits of `input`, at most four of them.
pub fn sanitize_pin(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_digit)
        .take(PIN_LEN)
        .collect()
}

/// First two characters of a game glyph, or the default glyph when empty.
pub fn clamp_glyph(input: &str) -> String {
    let glyph: String = input.trim().chars().take(GLYPH_MAX_CHARS).collect();
    if glyph.is_empty() {
        DEFAULT_GAME_EMOJI.to_string()
    } else {
        glyph
    }
}

/// `#RRGGBB`
pub fn is_hex_rgb(color: &str) -> bool {
    let Some(hex) = color.strip_prefix('#') else {
        return false;
    };
    hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())
}
