use serde::{Deserialize, Serialize};

use crate::farm::FarmState;

/// Farm plot corners as fractions of the background image rectangle
///
/// Each corner is `[u, v]` with both components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRatio {
    pub top_left: [f64; 2],
    pub top_right: [f64; 2],
    pub bottom_left: [f64; 2],
    pub bottom_right: [f64; 2],
}

/// Session-wide configuration handed out by `GET /api/bootstrap`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmConfig {
    /// Cells per side
    pub grid: i64,
    pub field_ratio: FieldRatio,
    /// URL of the background illustration
    pub background: String,
    /// Auto-step pacing interval in milliseconds
    pub exec_interval: u64,
}

/// Response body of `GET /api/bootstrap`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bootstrap {
    pub config: FarmConfig,
    pub farm: FarmState,
}

impl Bootstrap {
    pub fn from_json(text: &str) -> Result<Self, crate::ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_server_bootstrap() {
        let body = r#"{
            "config": {
                "grid": 6,
                "background": "assets/farm_bg.webp",
                "field_ratio": {
                    "topLeft": [0.425, 0.545],
                    "topRight": [0.755, 0.625],
                    "bottomLeft": [0.165, 0.625],
                    "bottomRight": [0.565, 0.815]
                },
                "exec_interval": 100
            },
            "farm": {"type": "snapshot", "grid": [], "gold": 500, "time": 0.0}
        }"#;
        let boot = Bootstrap::from_json(body).unwrap();
        assert_eq!(boot.config.grid, 6);
        assert_eq!(boot.config.exec_interval, 100);
        assert!((boot.config.field_ratio.bottom_right[1] - 0.815).abs() < 1e-12);
        assert_eq!(boot.farm.gold, Some(500));
    }

    #[test]
    fn test_missing_config_is_error() {
        assert!(Bootstrap::from_json(r#"{"farm": {}}"#).is_err());
    }
}
