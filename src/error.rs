//! Process-level error type.
//!
//! `AppError` carries the exit code the binary should terminate with. Only
//! startup-time faults (configuration, reference calibration, initial
//! connection) ever surface here; per-cycle instrument and fit faults are
//! contained inside the polling loop and never become an `AppError`.

/// Exit code for configuration/CLI faults.
pub const EXIT_CONFIG: u8 = 2;
/// Exit code for reference calibration faults.
pub const EXIT_CALIBRATION: u8 = 3;
/// Exit code for instrument/runtime faults that abort startup.
pub const EXIT_RUNTIME: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIG, message)
    }

    pub fn calibration(message: impl Into<String>) -> Self {
        Self::new(EXIT_CALIBRATION, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(EXIT_RUNTIME, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
