use std::env;
use std::str::FromStr;

use log::warn;

/// Default usable stack size for a new greenlet.
pub const DEFAULT_STACK_SIZE: usize = 512 * 1024;

/// Stacks smaller than this are rounded up.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Per-thread runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Usable stack size for greenlets spawned without an explicit size.
    pub stack_size: usize,

    /// How many released stacks a thread keeps around for reuse.
    pub pool_capacity: usize,

    /// When set, switching into a dead greenlet resumes its nearest live
    /// ancestor. When cleared, it fails with `Error::DeadGreenlet`.
    pub fall_up_on_dead: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            stack_size: DEFAULT_STACK_SIZE,
            pool_capacity: 8,
            fall_up_on_dead: true,
        }
    }
}

impl Config {
    /// Reads `GREENLET_STACK_SIZE`, `GREENLET_STACK_POOL` and
    /// `GREENLET_STRICT_DEAD` on top of the defaults. Unparseable values are
    /// logged and ignored.
    pub fn from_env() -> Config {
        Config::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        if let Some(size) = parse_var::<usize, _>(&lookup, "GREENLET_STACK_SIZE") {
            config.stack_size = size;
        }
        if let Some(capacity) = parse_var::<usize, _>(&lookup, "GREENLET_STACK_POOL") {
            config.pool_capacity = capacity;
        }
        if let Some(strict) = parse_var::<u8, _>(&lookup, "GREENLET_STRICT_DEAD") {
            config.fall_up_on_dead = strict == 0;
        }
        config
    }

    pub fn stack_size(mut self, size: usize) -> Config {
        self.stack_size = size;
        self
    }

    pub fn pool_capacity(mut self, capacity: usize) -> Config {
        self.pool_capacity = capacity;
        self
    }

    pub fn fall_up_on_dead(mut self, enabled: bool) -> Config {
        self.fall_up_on_dead = enabled;
        self
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {}={:?}: not a valid number", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
        assert!(config.fall_up_on_dead);
    }

    #[test]
    fn builder_methods() {
        let config = Config::default()
            .stack_size(64 * 1024)
            .pool_capacity(0)
            .fall_up_on_dead(false);
        assert_eq!(config.stack_size, 64 * 1024);
        assert_eq!(config.pool_capacity, 0);
        assert!(!config.fall_up_on_dead);
    }

    #[test]
    fn env_overrides() {
        let config = Config::from_lookup(|name| match name {
            "GREENLET_STACK_SIZE" => Some("131072".to_string()),
            "GREENLET_STACK_POOL" => Some("not a number".to_string()),
            "GREENLET_STRICT_DEAD" => Some(" 1 ".to_string()),
            _ => None,
        });

        assert_eq!(config.stack_size, 131072);
        assert_eq!(config.pool_capacity, Config::default().pool_capacity);
        assert!(!config.fall_up_on_dead);
    }
}
