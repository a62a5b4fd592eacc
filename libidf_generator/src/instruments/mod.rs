//! One driver per instrument.
//!
//! Every driver owns a parameter record with the physical layout of its
//! instrument (`Default` holds the installed geometry) and a `build` function
//! assembling the complete document in memory. Writing is left to the caller.
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod basis;
pub mod biosans;
pub mod biosans_wing;
pub mod in5;
pub mod vulcan;

/// Instruments known to the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentKind {
    Biosans,
    BiosansWing,
    In5,
    Basis,
    Vulcan,
}

impl InstrumentKind {
    pub fn all() -> [InstrumentKind; 5] {
        [
            Self::Biosans,
            Self::BiosansWing,
            Self::In5,
            Self::Basis,
            Self::Vulcan,
        ]
    }
}

impl Display for InstrumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Biosans => write!(f, "BIOSANS"),
            Self::BiosansWing => write!(f, "BIOSANSWING"),
            Self::In5 => write!(f, "IN5"),
            Self::Basis => write!(f, "BASIS"),
            Self::Vulcan => write!(f, "VULCAN"),
        }
    }
}
