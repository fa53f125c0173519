//! Process exit codes shared by every snow-utils binary

/// Exit status reported by a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[repr(i32)]
pub enum ExitCode {
    /// Operation succeeded or infrastructure is ready
    #[strum(serialize = "success")]
    Success = 0,
    /// A precondition is missing, input is invalid, or the user declined
    #[strum(serialize = "precondition")]
    Precondition = 1,
    /// An external call failed
    #[strum(serialize = "error")]
    Error = 2,
    /// A destructive action needs confirmation and no terminal is attached
    #[strum(serialize = "needs-confirmation")]
    NeedsConfirmation = 3,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::Precondition.code(), 1);
        assert_eq!(ExitCode::Error.code(), 2);
        assert_eq!(ExitCode::NeedsConfirmation.code(), 3);
    }
}
