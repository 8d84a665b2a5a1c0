use tracing::warn;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;
pub const MAX_CALL_DEPTH_VAR: &str = "LISPETTE_MAX_CALL_DEPTH";

/// Limits applied by the [`Interpreter`](crate::evaluator::Interpreter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Nested closure invocations, forced `if`/`when` branches included,
    /// allowed before evaluation fails with `RecursionLimit`.
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl InterpreterConfig {
    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    /// Reads overrides from the environment, keeping defaults for anything
    /// missing or malformed.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = InterpreterConfig::default();
        if let Some(raw) = lookup(MAX_CALL_DEPTH_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => config.max_call_depth = depth,
                _ => warn!(
                    value = %raw,
                    "ignoring invalid {}, using {}", MAX_CALL_DEPTH_VAR, DEFAULT_MAX_CALL_DEPTH
                ),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(
            InterpreterConfig::default().max_call_depth,
            DEFAULT_MAX_CALL_DEPTH
        );
        assert_eq!(
            InterpreterConfig::default()
                .with_max_call_depth(8)
                .max_call_depth,
            8
        );
    }

    #[test]
    fn test_from_lookup() {
        let config = InterpreterConfig::from_lookup(|_| Some("64".to_string()));
        assert_eq!(config.max_call_depth, 64);

        let config = InterpreterConfig::from_lookup(|_| None);
        assert_eq!(config, InterpreterConfig::default());
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        for raw in ["lots", "-3", "0", ""] {
            let config = InterpreterConfig::from_lookup(|_| Some(raw.to_string()));
            assert_eq!(config, InterpreterConfig::default(), "value: {:?}", raw);
        }
    }
}
