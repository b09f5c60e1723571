use derive_more::From;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Http(reqwest::Error),

    #[from]
    Csv(csv::Error),

    #[from]
    Date(chrono::ParseError),

    #[from]
    Metrics(prometheus::Error),

    /// Custom error message
    Custom(String),
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Self::Http(e) => write!(fmt, "http: {e}"),
            Self::Csv(e) => write!(fmt, "csv: {e}"),
            Self::Date(e) => write!(fmt, "date: {e}"),
            Self::Metrics(e) => write!(fmt, "metrics: {e}"),
            Self::Custom(message) => fmt.write_str(message),
        }
    }
}

impl std::error::Error for Error {}

/// Create a `LockPoisoned` error for mutex/rwlock poisoning (indicates prior panic)
#[must_use]
pub fn lock_poisoned_error(what: &str) -> Error {
    Error::Custom(format!(
        "{what} lock poisoned - this indicates a prior panic, state may be inconsistent"
    ))
}
