use serde::{Deserialize, Serialize};

/// Crop planted in a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropKind {
    Grass,
    Wheat,
    Carrot,
    Cabbage,
    Strawberry,
    Eggplant,
    Tomato,
    /// Crop name this client has no sprite for
    #[serde(other)]
    Unknown,
}

impl CropKind {
    /// Sprite glyph drawn for this crop
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Grass => "🌿",
            Self::Wheat => "🌾",
            Self::Carrot => "🥕",
            Self::Cabbage => "🥬",
            Self::Strawberry => "🍓",
            Self::Eggplant => "🍆",
            Self::Tomato => "🍅",
            Self::Unknown => "🌱",
        }
    }
}

/// One plot of the farm grid
///
/// `kind == None` is an empty plot. Ratios are in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cell {
    #[serde(rename = "type", default)]
    pub kind: Option<CropKind>,
    #[serde(default)]
    pub maturity: f64,
    #[serde(default)]
    pub water: f64,
    /// The script server spells this `nutrient`
    #[serde(default, alias = "nutrient")]
    pub nutrition: f64,
}

impl Cell {
    pub const fn is_empty(&self) -> bool {
        self.kind.is_none()
    }

    /// Fully grown and ready to harvest
    pub fn is_mature(&self) -> bool {
        self.maturity >= 1.0
    }
}

/// Full mirror of the remote farm
///
/// `grid` is indexed `grid[y][x]`; a missing cell is equivalent to an empty
/// plot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FarmState {
    #[serde(default)]
    pub gold: Option<i64>,
    /// Farm clock in seconds; fractional on the wire
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub grid: Vec<Vec<Option<Cell>>>,
}

impl FarmState {
    /// Cell at column `x`, row `y`, if present
    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.grid.get(y)?.get(x)?.as_ref()
    }
}
