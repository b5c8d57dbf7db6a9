//! The `utils` module provides shared plumbing used across `buslink`:
//! the crate-wide error type and logging initialization.

pub mod error;
pub mod logging;

pub use error::SyncError;

#[cfg(test)]
mod tests {
    use super::logging;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        logging::init("info");
        logging::init("debug");
        logging::init("warn");
    }
}
