use crate::error::ConfigError;

/// Default tape size for ordinary runs.
pub const DEFAULT_TAPE_SIZE: usize = 8;

/// Default tape size in golf mode.
pub const GOLF_TAPE_SIZE: usize = 32;

/// Configuration for a machine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Number of tape cells. Fixed for the machine's lifetime.
    pub tape_size: usize,
    /// When false, `.` and `,` are no-ops.
    pub io_enabled: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            tape_size: DEFAULT_TAPE_SIZE,
            io_enabled: true,
        }
    }
}

impl MachineConfig {
    /// Golf mode: a wider tape and no I/O, the program is judged by the
    /// tape it leaves behind.
    pub fn golf() -> Self {
        Self {
            tape_size: GOLF_TAPE_SIZE,
            io_enabled: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tape_size == 0 {
            return Err(ConfigError::EmptyTape);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MachineConfig::default();
        assert_eq!(config.tape_size, 8);
        assert!(config.io_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_golf() {
        let config = MachineConfig::golf();
        assert_eq!(config.tape_size, 32);
        assert!(!config.io_enabled);
    }

    #[test]
    fn test_zero_tape_rejected() {
        let config = MachineConfig {
            tape_size: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyTape));
    }
}
