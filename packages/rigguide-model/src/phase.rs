use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};

/// Construction phase identifier.
///
/// The order is fixed and load-bearing: later phases consume artifacts that
/// are only guaranteed to exist once earlier phases have completed for the
/// whole active batch, not just the current component. `ConnectSystem` is
/// the only phase allowed to reach across component boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Phase {
    PreScript,
    CreateObjects,
    CreateAttributes,
    CreateOperators,
    ConnectSystem,
    PostScript,
}

impl Phase {
    /// All phases in execution order.
    pub const ORDER: [Phase; 6] = [
        Phase::PreScript,
        Phase::CreateObjects,
        Phase::CreateAttributes,
        Phase::CreateOperators,
        Phase::ConnectSystem,
        Phase::PostScript,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PreScript => "pre_script",
            Phase::CreateObjects => "create_objects",
            Phase::CreateAttributes => "create_attributes",
            Phase::CreateOperators => "create_operators",
            Phase::ConnectSystem => "connect_system",
            Phase::PostScript => "post_script",
        }
    }

    /// Phases after this one in execution order.
    pub fn index(&self) -> usize {
        Self::ORDER.iter().position(|p| p == self).unwrap_or(0)
    }
}

impl std::str::FromStr for Phase {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pre_script" => Ok(Phase::PreScript),
            "create_objects" => Ok(Phase::CreateObjects),
            "create_attributes" => Ok(Phase::CreateAttributes),
            "create_operators" => Ok(Phase::CreateOperators),
            "connect_system" => Ok(Phase::ConnectSystem),
            "post_script" => Ok(Phase::PostScript),
            _ => Err(ModelError::parse(format!("invalid phase name: {}", s))),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for Phase {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Phase> for String {
    fn from(p: Phase) -> Self {
        p.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_roundtrip() {
        for phase in &Phase::ORDER {
            let s = phase.as_str();
            let parsed: Phase = s.parse().unwrap();
            assert_eq!(*phase, parsed);
        }
    }

    #[test]
    fn test_phase_order_is_strict() {
        for window in Phase::ORDER.windows(2) {
            assert!(window[0].index() < window[1].index());
        }
    }

    #[test]
    fn test_phase_invalid_name() {
        assert!("not_a_phase".parse::<Phase>().is_err());
    }
}
