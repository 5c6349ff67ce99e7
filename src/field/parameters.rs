//! Nodal parameter labels and storage.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which nodal parameter a vector holds: the value or a derivative with
/// respect to element local coordinates.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ValueLabel {
    #[serde(rename = "VALUE")]
    Value,
    D1,
    D2,
    D12,
    D3,
    D13,
    D23,
    D123,
}

impl ValueLabel {
    pub const ALL: [Self; 8] = [
        Self::Value,
        Self::D1,
        Self::D2,
        Self::D12,
        Self::D3,
        Self::D13,
        Self::D23,
        Self::D123,
    ];

    /// Label for the derivative over the axes set in `mask` (bit 0 = xi1).
    #[must_use]
    pub const fn from_axes(mask: usize) -> Self {
        Self::ALL[mask & 7]
    }

    #[must_use]
    pub const fn axes(self) -> usize {
        self as usize
    }

    /// First derivative along local axis `axis` (0-based).
    #[must_use]
    pub const fn first_derivative(axis: usize) -> Self {
        Self::from_axes(1 << (axis % 3))
    }

    #[must_use]
    pub const fn is_derivative(self) -> bool {
        !matches!(self, Self::Value)
    }
}

impl fmt::Display for ValueLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Value => "VALUE",
            Self::D1 => "D1",
            Self::D2 => "D2",
            Self::D12 => "D12",
            Self::D3 => "D3",
            Self::D13 => "D13",
            Self::D23 => "D23",
            Self::D123 => "D123",
        };
        f.write_str(name)
    }
}

/// Parameter vectors of one node in one field.
pub type NodeParameters = BTreeMap<ValueLabel, Vec<f64>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_map_to_axis_masks() {
        assert_eq!(ValueLabel::from_axes(0), ValueLabel::Value);
        assert_eq!(ValueLabel::from_axes(0b011), ValueLabel::D12);
        assert_eq!(ValueLabel::from_axes(0b101), ValueLabel::D13);
        assert_eq!(ValueLabel::first_derivative(2), ValueLabel::D3);
        assert_eq!(ValueLabel::D23.axes(), 0b110);
    }

    #[test]
    fn labels_serialize_by_name() {
        let json = serde_json::to_string(&vec![ValueLabel::Value, ValueLabel::D123]).unwrap();
        assert_eq!(json, r#"["VALUE","D123"]"#);
    }
}
