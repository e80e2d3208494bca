//! Change detection method selection

use crate::error::PipelineError;
use std::fmt;
use std::str::FromStr;

/// Change detection method requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeMethod {
    Difference,
    UrbanClassification,
    Anomaly,
    /// Every concrete method, each run independently
    All,
}

impl ChangeMethod {
    pub const CONCRETE: [ChangeMethod; 3] = [
        ChangeMethod::Difference,
        ChangeMethod::UrbanClassification,
        ChangeMethod::Anomaly,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChangeMethod::Difference => "difference",
            ChangeMethod::UrbanClassification => "urban-classification",
            ChangeMethod::Anomaly => "anomaly",
            ChangeMethod::All => "all",
        }
    }

    /// Concrete methods this selection runs, in execution order
    pub fn expand(self) -> Vec<ChangeMethod> {
        match self {
            ChangeMethod::All => Self::CONCRETE.to_vec(),
            m => vec![m],
        }
    }

    pub fn includes(self, method: ChangeMethod) -> bool {
        self == ChangeMethod::All || self == method
    }
}

impl fmt::Display for ChangeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChangeMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "difference" | "diff" => Ok(ChangeMethod::Difference),
            "urban-classification" | "urban_classification" | "urban" => Ok(ChangeMethod::UrbanClassification),
            "anomaly" => Ok(ChangeMethod::Anomaly),
            "all" => Ok(ChangeMethod::All),
            _ => Err(PipelineError::UnknownMethod(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!("diff".parse::<ChangeMethod>().unwrap(), ChangeMethod::Difference);
        assert_eq!("Urban".parse::<ChangeMethod>().unwrap(), ChangeMethod::UrbanClassification);
        assert_eq!(
            "urban-classification".parse::<ChangeMethod>().unwrap(),
            ChangeMethod::UrbanClassification
        );
        assert!(matches!(
            "ndvi".parse::<ChangeMethod>(),
            Err(PipelineError::UnknownMethod(m)) if m == "ndvi"
        ));
    }

    #[test]
    fn test_expand_all() {
        assert_eq!(ChangeMethod::All.expand(), ChangeMethod::CONCRETE.to_vec());
        assert_eq!(ChangeMethod::Anomaly.expand(), vec![ChangeMethod::Anomaly]);
        assert!(ChangeMethod::All.includes(ChangeMethod::Anomaly));
        assert!(!ChangeMethod::Difference.includes(ChangeMethod::Anomaly));
    }
}
