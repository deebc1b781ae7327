use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::BridgeError;

/// Which transports a send may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Native,
    Web,
    #[default]
    Auto,
}

impl FromStr for TransportMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(TransportMode::Native),
            "web" => Ok(TransportMode::Web),
            "auto" => Ok(TransportMode::Auto),
            other => Err(BridgeError::Config(format!("unknown transport mode '{other}'"))),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportMode::Native => "native",
            TransportMode::Web => "web",
            TransportMode::Auto => "auto",
        };
        f.write_str(name)
    }
}
