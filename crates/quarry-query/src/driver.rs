//! The boundary to whatever actually executes SQL.

use std::future::Future;

use quarry_schema::Value;

/// Errors from a driver are passed through untouched.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// A database connection, pool or client able to run rendered statements.
pub trait Driver: Send + Sync {
    /// Runs `text` with positional `params` and returns every result row.
    fn execute(
        &self,
        text: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Vec<Vec<Value>>, DriverError>> + Send;

    /// Driver-specific identifier quoting; `None` leaves quoting to the
    /// generator.
    fn escape_identifier(&self, _name: &str) -> Option<String> {
        None
    }
}
