use super::{NetworkError, NetworkResult};
use error_stack::bail;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct NetworkConfig {
    /// Depth used when an explicit species is added without one.
    pub default_depth: u32,
    /// Remember `complex -> (family, iso)` so identical complexes skip canonicalization.
    pub recognition_cache: bool,
    /// Drop reactions whose reactants and products are the same multiset.
    pub skip_null_reactions: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            default_depth: 1,
            recognition_cache: true,
            skip_null_reactions: true,
        }
    }
}

impl NetworkConfig {
    pub fn with_default_depth(mut self, depth: u32) -> Self {
        self.default_depth = depth;
        self
    }

    pub fn with_recognition_cache(mut self, enabled: bool) -> Self {
        self.recognition_cache = enabled;
        self
    }

    pub fn with_skip_null_reactions(mut self, enabled: bool) -> Self {
        self.skip_null_reactions = enabled;
        self
    }

    /// Validates a depth coming from outside the crate.
    pub fn depth_from_signed(depth: i64) -> NetworkResult<u32> {
        if depth < 0 {
            bail!(NetworkError::NegativeDepth(depth));
        }
        Ok(u32::try_from(depth).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_depth_is_rejected() {
        assert_eq!(NetworkConfig::depth_from_signed(3).unwrap(), 3);
        assert_eq!(NetworkConfig::depth_from_signed(0).unwrap(), 0);
        let err = NetworkConfig::depth_from_signed(-1).unwrap_err();
        assert_eq!(err.current_context(), &NetworkError::NegativeDepth(-1));
    }

    #[test]
    fn builder_methods_override_defaults() {
        let config = NetworkConfig::default()
            .with_default_depth(4)
            .with_recognition_cache(false);
        assert_eq!(config.default_depth, 4);
        assert!(!config.recognition_cache);
        assert!(config.skip_null_reactions);
    }
}
