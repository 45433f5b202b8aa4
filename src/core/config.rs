// This module holds the per-session configuration. The optimization level is forwarded to
// the backend (Cranelift's opt_level setting), the materialization policy decides whether
// variables get a stack slot at declaration or lazily, the verifier switch runs the
// backend's IR verifier before code generation, and the debug-info switch turns on the
// host-backtrace scope tracking when the debug-info feature is compiled in. Defaults can be
// overridden from the environment so that tools and tests can flip them without code
// changes.

//! Session configuration.

use std::env;
use std::fmt;
use std::str::FromStr;

/// Backend optimization effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    None,
    #[default]
    Speed,
    SpeedAndSize,
}

impl OptimizationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            OptimizationLevel::None => "none",
            OptimizationLevel::Speed => "speed",
            OptimizationLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "0" => Ok(OptimizationLevel::None),
            "speed" | "1" | "2" => Ok(OptimizationLevel::Speed),
            "speed_and_size" | "size" | "3" => Ok(OptimizationLevel::SpeedAndSize),
            other => Err(format!("unknown optimization level '{other}'")),
        }
    }
}

/// Configuration for one routine under construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub optimization: OptimizationLevel,
    /// Allocate a stack slot as soon as a variable is declared.
    pub materialize_on_definition: bool,
    pub enable_verifier: bool,
    /// Build the debug-info scope tree. Ignored without the `debug-info` feature.
    pub debug_info: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            optimization: OptimizationLevel::default(),
            materialize_on_definition: cfg!(feature = "eager-materialization"),
            enable_verifier: cfg!(debug_assertions),
            debug_info: false,
        }
    }
}

impl Config {
    /// Defaults with `REACTOR_OPT_LEVEL` and `REACTOR_DEBUG_INFO` applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = env::var("REACTOR_OPT_LEVEL") {
            match level.parse() {
                Ok(level) => config.optimization = level,
                Err(err) => log::warn!("Ignoring REACTOR_OPT_LEVEL: {}", err),
            }
        }

        if let Ok(flag) = env::var("REACTOR_DEBUG_INFO") {
            config.debug_info = matches!(flag.as_str(), "1" | "true" | "on");
        }

        config
    }

    pub fn with_optimization(mut self, level: OptimizationLevel) -> Self {
        self.optimization = level;
        self
    }

    pub fn with_materialize_on_definition(mut self, eager: bool) -> Self {
        self.materialize_on_definition = eager;
        self
    }

    pub fn with_verifier(mut self, enable: bool) -> Self {
        self.enable_verifier = enable;
        self
    }

    pub fn with_debug_info(mut self, enable: bool) -> Self {
        self.debug_info = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        assert_eq!("none".parse::<OptimizationLevel>(), Ok(OptimizationLevel::None));
        assert_eq!("Speed".parse::<OptimizationLevel>(), Ok(OptimizationLevel::Speed));
        assert_eq!(
            "speed_and_size".parse::<OptimizationLevel>(),
            Ok(OptimizationLevel::SpeedAndSize)
        );
        assert!("fast".parse::<OptimizationLevel>().is_err());
    }

    #[test]
    fn test_builder() {
        let config = Config::default()
            .with_optimization(OptimizationLevel::None)
            .with_materialize_on_definition(true)
            .with_debug_info(true);
        assert_eq!(config.optimization, OptimizationLevel::None);
        assert!(config.materialize_on_definition);
        assert!(config.debug_info);
    }
}
