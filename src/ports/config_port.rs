//! Configuration access port trait.

use crate::domain::error::NavtraderError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// `Ok(None)` when the key is absent; an error when present but not a number.
    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, NavtraderError>;

    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, NavtraderError>;

    /// Keys defined in `section`, sorted.
    fn keys(&self, section: &str) -> Vec<String>;
}
