//! Runtime environment detection, trimmed from the donor's `env.rs` down to
//! the one distinction this crate actually needs: are we under test.
//!
//! Set `TERMSESSION_ENV=test` to redirect config/session paths into a
//! scratch directory instead of the real user config dir.

/// Runtime environment for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Test,
}

impl Environment {
    #[must_use]
    pub fn current() -> Self {
        match std::env::var("TERMSESSION_ENV").as_deref() {
            Ok("test") => Self::Test,
            _ => Self::Production,
        }
    }

    #[must_use]
    pub fn is_test(self) -> bool {
        self == Self::Test
    }
}

/// Convenience function equivalent to `Environment::current().is_test()`.
#[must_use]
pub fn is_test_mode() -> bool {
    Environment::current().is_test()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_production() {
        // SAFETY: test-only env var mutation, not run concurrently with
        // other tests that read TERMSESSION_ENV.
        unsafe { std::env::remove_var("TERMSESSION_ENV") };
        assert_eq!(Environment::current(), Environment::Production);
        assert!(!is_test_mode());
    }
}
