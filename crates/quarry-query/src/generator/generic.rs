use quarry_schema::Dialect;

use super::Generator;

/// Dialect-neutral SQL: identifiers quoted only when needed, `?`
/// placeholders, MySQL-style multi-table `UPDATE`/`DELETE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericGenerator;

impl Generator for GenericGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Generic
    }
}
