//! Database configuration.

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether write transactions are refused.
    pub read_only: bool,

    /// Whether to warn when a record type's schema lacks the
    /// accessors-generated marker.
    pub warn_on_missing_accessors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            read_only: false,
            warn_on_missing_accessors: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether the database refuses write transactions.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets whether missing accessor markers are reported.
    #[must_use]
    pub const fn warn_on_missing_accessors(mut self, value: bool) -> Self {
        self.warn_on_missing_accessors = value;
        self
    }
}
