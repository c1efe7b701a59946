use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::stage::DrawMode;
use crate::util::Error;

/// Shadow technique. Each variant selects which stages run and which
/// composite pipeline draws the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShadowMode {
    Sm,
    Rsm,
    #[default]
    Ism,
}

impl ShadowMode {
    pub const ALL: [ShadowMode; 3] = [ShadowMode::Sm, ShadowMode::Rsm, ShadowMode::Ism];

    /// Light-space sub-passes this mode samples.
    pub fn light_passes(self) -> &'static [DrawMode] {
        match self {
            ShadowMode::Sm => &[DrawMode::Depth],
            ShadowMode::Rsm | ShadowMode::Ism => &DrawMode::ALL,
        }
    }

    pub fn uses_vpls(self) -> bool {
        matches!(self, ShadowMode::Ism)
    }

    pub fn label(self) -> &'static str {
        match self {
            ShadowMode::Sm => "SM",
            ShadowMode::Rsm => "RSM",
            ShadowMode::Ism => "ISM",
        }
    }

    /// Value of the composite shader's `SHADOW_MODE` override.
    pub fn shader_constant(self) -> f64 {
        match self {
            ShadowMode::Sm => 0.0,
            ShadowMode::Rsm => 1.0,
            ShadowMode::Ism => 2.0,
        }
    }
}

impl fmt::Display for ShadowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ShadowMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sm" => Ok(ShadowMode::Sm),
            "rsm" => Ok(ShadowMode::Rsm),
            "ism" => Ok(ShadowMode::Ism),
            other => Err(Error::other(format!("unknown shadow mode '{}' (expected sm, rsm or ism)", other))),
        }
    }
}
