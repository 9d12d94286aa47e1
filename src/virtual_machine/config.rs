use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::vm::{DEFAULT_MAX_MEMORY, MAX_STACK_DEPTH};

/// Step ceiling, `0` means unlimited.
pub const ENV_MAX_STEPS: &str = "EVM_MAX_STEPS";
/// Log one line per executed instruction.
pub const ENV_TRACE: &str = "EVM_TRACE";
/// Include the stack in trace lines.
pub const ENV_TRACE_STACK: &str = "EVM_TRACE_STACK";
/// Include memory in trace lines.
pub const ENV_TRACE_MEMORY: &str = "EVM_TRACE_MEMORY";
/// Memory cap in bytes.
pub const ENV_MAX_MEMORY: &str = "EVM_MAX_MEMORY";

/// Options for a single run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Maximum number of executed instructions, `0` for no limit.
    pub max_steps: u64,
    /// Emit a trace line after every instruction.
    pub verbose: bool,
    pub print_stack: bool,
    pub print_memory: bool,
    pub max_stack_depth: usize,
    pub max_memory_bytes: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: 0,
            verbose: false,
            print_stack: false,
            print_memory: false,
            max_stack_depth: MAX_STACK_DEPTH,
            max_memory_bytes: DEFAULT_MAX_MEMORY,
        }
    }
}

impl RunConfig {
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_print_stack(mut self, print_stack: bool) -> Self {
        self.print_stack = print_stack;
        self
    }

    pub fn with_print_memory(mut self, print_memory: bool) -> Self {
        self.print_memory = print_memory;
        self
    }

    pub fn with_max_stack_depth(mut self, max_stack_depth: usize) -> Self {
        self.max_stack_depth = max_stack_depth;
        self
    }

    pub fn with_max_memory(mut self, max_memory_bytes: usize) -> Self {
        self.max_memory_bytes = max_memory_bytes;
        self
    }

    /// Defaults overridden by `EVM_*` environment variables.
    ///
    /// Unset variables keep their default. Set but unparsable values fail with
    /// [`VMError::InvalidConfig`].
    pub fn from_env() -> Result<Self, VMError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, VMError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_MAX_STEPS) {
            config.max_steps = parse_number(ENV_MAX_STEPS, &value)?;
        }
        if let Some(value) = lookup(ENV_TRACE) {
            config.verbose = parse_flag(ENV_TRACE, &value)?;
        }
        if let Some(value) = lookup(ENV_TRACE_STACK) {
            config.print_stack = parse_flag(ENV_TRACE_STACK, &value)?;
        }
        if let Some(value) = lookup(ENV_TRACE_MEMORY) {
            config.print_memory = parse_flag(ENV_TRACE_MEMORY, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_MEMORY) {
            config.max_memory_bytes = parse_number(ENV_MAX_MEMORY, &value)?;
        }
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, VMError> {
    value.trim().parse().map_err(|_| VMError::InvalidConfig {
        key,
        value: value.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, VMError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(VMError::InvalidConfig {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = RunConfig::default();
        assert_eq!(config.max_steps, 0);
        assert!(!config.verbose);
        assert_eq!(config.max_stack_depth, 1024);
        assert_eq!(config.max_memory_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn builder_setters() {
        let config = RunConfig::default()
            .with_max_steps(10)
            .with_verbose(true)
            .with_print_stack(true)
            .with_max_memory(64);
        assert_eq!(config.max_steps, 10);
        assert!(config.verbose && config.print_stack && !config.print_memory);
        assert_eq!(config.max_memory_bytes, 64);
    }

    #[test]
    fn lookup_overrides() {
        let config = RunConfig::from_lookup(lookup_in(&[
            (ENV_MAX_STEPS, "500"),
            (ENV_TRACE, "true"),
            (ENV_TRACE_MEMORY, "1"),
        ]))
        .unwrap();
        assert_eq!(config.max_steps, 500);
        assert!(config.verbose);
        assert!(!config.print_stack);
        assert!(config.print_memory);
    }

    #[test]
    fn lookup_rejects_garbage() {
        let err = RunConfig::from_lookup(lookup_in(&[(ENV_MAX_STEPS, "lots")])).unwrap_err();
        assert!(matches!(
            err,
            VMError::InvalidConfig {
                key: ENV_MAX_STEPS,
                ..
            }
        ));
        assert!(RunConfig::from_lookup(lookup_in(&[(ENV_TRACE, "maybe")])).is_err());
    }
}
