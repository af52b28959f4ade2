//! Logical column kinds and their per-dialect storage rules.
//!
//! Each [`ColumnKind`] knows three things about itself:
//!
//! - the datatype it is stored as under a given [`Dialect`] ([`ColumnKind::datatype`]),
//! - how a caller-supplied value is checked and normalized ([`ColumnKind::validate`]),
//! - how a normalized value is encoded for, and decoded from, a given dialect
//!   ([`ColumnKind::encode`], [`ColumnKind::decode`]).
//!
//! Validation is dialect-neutral so it can run while a query is being built,
//! before any generator has been chosen.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::value::{Value, TIME_FORMAT};

/// SQL dialect selecting datatypes, value encodings and generator behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Generic,
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    Sqlite,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [Self::Generic, Self::MySql, Self::Postgres, Self::Sqlite];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" | "ansi" => Ok(Self::Generic),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(format!(
                "unknown dialect `{other}` (expected generic, mysql, postgres or sqlite)"
            )),
        }
    }
}

/// Largest decimal precision whose values survive the `f64` used for decimals.
pub const MAX_DECIMAL_PRECISION: u8 = 15;

/// Width of an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerSize {
    Small,
    Regular,
    Big,
}

impl IntegerSize {
    const fn bounds(self) -> (i64, i64) {
        match self {
            Self::Small => (i16::MIN as i64, i16::MAX as i64),
            Self::Regular => (i32::MIN as i64, i32::MAX as i64),
            Self::Big => (i64::MIN, i64::MAX),
        }
    }
}

/// Logical type of a stored column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Integer(IntegerSize),
    Real,
    Decimal { precision: u8, scale: u8 },
    Text { max_length: Option<u32> },
    Boolean,
    Time,
    /// Foreign key column, stored exactly like the referenced primary key.
    Reference(Box<ColumnKind>),
}

impl ColumnKind {
    /// The kind a reference column resolves to, stripping any reference layers.
    pub fn storage(&self) -> &ColumnKind {
        match self {
            Self::Reference(inner) => inner.storage(),
            other => other,
        }
    }

    /// Checks the kind's own parameters; called once at definition time.
    pub fn check(&self) -> Result<(), String> {
        match self.storage() {
            Self::Decimal { precision, scale } => {
                if *precision == 0 || *precision > MAX_DECIMAL_PRECISION {
                    return Err(format!(
                        "decimal precision {precision} is outside 1..={MAX_DECIMAL_PRECISION}"
                    ));
                }
                if scale > precision {
                    return Err(format!(
                        "decimal scale {scale} exceeds precision {precision}"
                    ));
                }
                Ok(())
            }
            Self::Text {
                max_length: Some(0),
            } => Err("text max length must be positive".into()),
            _ => Ok(()),
        }
    }

    /// The datatype this kind is stored as under `dialect`.
    pub fn datatype(&self, dialect: Dialect) -> String {
        use Dialect::*;
        use IntegerSize::*;

        match (self.storage(), dialect) {
            (Self::Integer(_), Sqlite) => "INTEGER".into(),
            (Self::Integer(Small), _) => "SMALLINT".into(),
            (Self::Integer(Regular), MySql) => "INT".into(),
            (Self::Integer(Regular), _) => "INTEGER".into(),
            (Self::Integer(Big), _) => "BIGINT".into(),
            (Self::Real, MySql) => "DOUBLE".into(),
            (Self::Real, Postgres) => "DOUBLE PRECISION".into(),
            (Self::Real, _) => "REAL".into(),
            (Self::Decimal { .. }, Sqlite) => "NUMERIC".into(),
            (Self::Decimal { precision, scale }, Postgres) => {
                format!("NUMERIC({precision}, {scale})")
            }
            (Self::Decimal { precision, scale }, _) => format!("DECIMAL({precision}, {scale})"),
            (Self::Text { .. }, Sqlite) => "TEXT".into(),
            (
                Self::Text {
                    max_length: Some(n),
                },
                _,
            ) => format!("VARCHAR({n})"),
            (Self::Text { max_length: None }, _) => "TEXT".into(),
            (Self::Boolean, MySql) => "TINYINT(1)".into(),
            (Self::Boolean, Sqlite) => "INTEGER".into(),
            (Self::Boolean, _) => "BOOLEAN".into(),
            (Self::Time, MySql) => "DATETIME".into(),
            (Self::Time, Sqlite) => "TEXT".into(),
            (Self::Time, _) => "TIMESTAMP".into(),
            (Self::Reference(_), _) => unreachable!("storage() strips references"),
        }
    }

    /// Checks and normalizes a non-null value for this kind.
    ///
    /// Returns a human readable reason on rejection; the caller attaches the
    /// property name.
    pub fn validate(&self, value: Value) -> Result<Value, String> {
        match (self.storage(), value) {
            (Self::Integer(size), Value::Integer(v)) => check_integer(*size, v),
            (Self::Integer(size), Value::Real(v)) if v.fract() == 0.0 && v.is_finite() => {
                // `as` saturates, and `i64::MAX as f64` rounds up to 2^63.
                if v < i64::MIN as f64 || v >= i64::MAX as f64 {
                    let (min, max) = size.bounds();
                    return Err(format!("{v} is outside the range {min}..={max}"));
                }
                check_integer(*size, v as i64)
            }
            (Self::Real, Value::Integer(v)) => Ok(Value::Real(v as f64)),
            (Self::Real, Value::Real(v)) if v.is_finite() => Ok(Value::Real(v)),
            (Self::Decimal { precision, scale }, value) => {
                check_decimal(*precision, *scale, value)
            }
            (Self::Text { max_length }, Value::Text(v)) => match max_length {
                Some(max) if v.chars().count() > *max as usize => Err(format!(
                    "text of {} characters exceeds the maximum of {max}",
                    v.chars().count()
                )),
                _ => Ok(Value::Text(v)),
            },
            (Self::Boolean, Value::Bool(v)) => Ok(Value::Bool(v)),
            (Self::Boolean, Value::Integer(v @ (0 | 1))) => Ok(Value::Bool(v == 1)),
            (Self::Time, Value::Time(v)) => Ok(Value::Time(v)),
            (Self::Time, Value::Text(v)) => Value::parse_time(&v)
                .map(Value::Time)
                .ok_or_else(|| format!("`{v}` is not a timestamp")),
            (kind, value) => Err(format!(
                "expected {}, got {} `{value}`",
                kind.label(),
                value.type_name()
            )),
        }
    }

    /// Encodes a validated value for storage under `dialect`.
    pub fn encode(&self, dialect: Dialect, value: Value) -> Value {
        match (self.storage(), dialect, value) {
            (Self::Boolean, Dialect::MySql | Dialect::Sqlite, Value::Bool(v)) => {
                Value::Integer(i64::from(v))
            }
            (Self::Time, Dialect::Sqlite, Value::Time(v)) => {
                Value::Text(v.format(TIME_FORMAT).to_string())
            }
            (_, _, value) => value,
        }
    }

    /// Decodes a value fetched from a `dialect` driver back into its logical form.
    pub fn decode(&self, _dialect: Dialect, value: Value) -> Value {
        match (self.storage(), value) {
            (Self::Boolean, Value::Integer(v)) => Value::Bool(v != 0),
            (Self::Time, Value::Text(v)) => match Value::parse_time(&v) {
                Some(time) => Value::Time(time),
                None => Value::Text(v),
            },
            (Self::Decimal { .. }, Value::Text(v)) => match v.parse::<f64>() {
                Ok(number) => Value::Real(number),
                Err(_) => Value::Text(v),
            },
            (Self::Real | Self::Decimal { .. }, Value::Integer(v)) => Value::Real(v as f64),
            (_, value) => value,
        }
    }

    /// Short human readable name, e.g. `decimal(10, 2)`.
    pub fn label(&self) -> String {
        match self.storage() {
            Self::Integer(_) => "integer".into(),
            Self::Real => "real".into(),
            Self::Decimal { precision, scale } => format!("decimal({precision}, {scale})"),
            Self::Text { .. } => "text".into(),
            Self::Boolean => "boolean".into(),
            Self::Time => "time".into(),
            Self::Reference(_) => unreachable!("storage() strips references"),
        }
    }
}

fn check_integer(size: IntegerSize, value: i64) -> Result<Value, String> {
    let (min, max) = size.bounds();
    if value < min || value > max {
        return Err(format!("{value} is outside the range {min}..={max}"));
    }
    Ok(Value::Integer(value))
}

// Rounds half away from zero to `scale` digits, then rejects values whose
// integer part needs more than `precision - scale` digits.
fn check_decimal(precision: u8, scale: u8, value: Value) -> Result<Value, String> {
    let number = match value {
        Value::Integer(v) => v as f64,
        Value::Real(v) => v,
        Value::Text(ref v) => v
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("`{v}` is not a decimal number"))?,
        other => {
            return Err(format!(
                "expected decimal({precision}, {scale}), got {} `{other}`",
                other.type_name()
            ))
        }
    };
    if !number.is_finite() {
        return Err(format!("{number} is not a finite number"));
    }

    let factor = 10f64.powi(i32::from(scale));
    let rounded = (number * factor).round() / factor;
    let limit = 10f64.powi(i32::from(precision - scale));
    if rounded.abs() >= limit {
        return Err(format!(
            "{number} does not fit decimal({precision}, {scale})"
        ));
    }
    Ok(Value::Real(rounded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datatype_table() {
        let kind = ColumnKind::Boolean;
        assert_eq!(kind.datatype(Dialect::Generic), "BOOLEAN");
        assert_eq!(kind.datatype(Dialect::MySql), "TINYINT(1)");
        assert_eq!(kind.datatype(Dialect::Sqlite), "INTEGER");

        let text = ColumnKind::Text {
            max_length: Some(32),
        };
        assert_eq!(text.datatype(Dialect::Postgres), "VARCHAR(32)");
        assert_eq!(text.datatype(Dialect::Sqlite), "TEXT");

        let reference = ColumnKind::Reference(Box::new(ColumnKind::Integer(IntegerSize::Big)));
        assert_eq!(reference.datatype(Dialect::Postgres), "BIGINT");
        assert_eq!(
            ColumnKind::Decimal {
                precision: 10,
                scale: 2
            }
            .datatype(Dialect::Postgres),
            "NUMERIC(10, 2)"
        );
    }

    #[test]
    fn test_integer_range() {
        let small = ColumnKind::Integer(IntegerSize::Small);
        assert_eq!(small.validate(Value::Integer(300)), Ok(Value::Integer(300)));
        assert!(small.validate(Value::Integer(40_000)).is_err());
        assert!(small.validate(Value::Text("3".into())).is_err());
        assert_eq!(small.validate(Value::Real(3.0)), Ok(Value::Integer(3)));

        let big = ColumnKind::Integer(IntegerSize::Big);
        let err = big.validate(Value::Real(1e30)).unwrap_err();
        assert!(err.contains("outside the range"));
        assert!(big.validate(Value::Real(2f64.powi(63))).is_err());
        assert!(big.validate(Value::Real(-1e30)).is_err());
        assert_eq!(
            big.validate(Value::Real(-(2f64.powi(63)))),
            Ok(Value::Integer(i64::MIN))
        );
    }

    #[test]
    fn test_text_length() {
        let kind = ColumnKind::Text {
            max_length: Some(3),
        };
        assert!(kind.validate(Value::Text("abc".into())).is_ok());
        let err = kind.validate(Value::Text("abcd".into())).unwrap_err();
        assert!(err.contains("maximum of 3"));
    }

    #[test]
    fn test_decimal_rounds_then_checks_bounds() {
        let kind = ColumnKind::Decimal {
            precision: 4,
            scale: 2,
        };
        assert_eq!(kind.validate(Value::Real(12.346)), Ok(Value::Real(12.35)));
        assert_eq!(kind.validate(Value::Integer(99)), Ok(Value::Real(99.0)));
        assert!(kind.validate(Value::Real(99.996)).is_err());
        assert!(kind.validate(Value::Integer(100)).is_err());
        assert_eq!(
            kind.validate(Value::Text(" 1.5 ".into())),
            Ok(Value::Real(1.5))
        );

        let wide = ColumnKind::Decimal {
            precision: 15,
            scale: 0,
        };
        assert_eq!(
            wide.validate(Value::Text("999999999999999".into())),
            Ok(Value::Real(999_999_999_999_999.0))
        );
        assert!(wide
            .validate(Value::Text("12345678901234567890123".into()))
            .is_err());
    }

    #[test]
    fn test_kind_check() {
        assert!(ColumnKind::Decimal {
            precision: 2,
            scale: 3
        }
        .check()
        .is_err());
        assert!(ColumnKind::Decimal {
            precision: 15,
            scale: 2
        }
        .check()
        .is_ok());
        let err = ColumnKind::Decimal {
            precision: 38,
            scale: 0,
        }
        .check()
        .unwrap_err();
        assert!(err.contains("outside 1..=15"));
        assert!(ColumnKind::Text {
            max_length: Some(0)
        }
        .check()
        .is_err());
        assert!(ColumnKind::Time.check().is_ok());
    }

    #[test]
    fn test_boolean_encoding_round_trip() {
        let kind = ColumnKind::Boolean;
        let stored = kind.encode(Dialect::Sqlite, Value::Bool(true));
        assert_eq!(stored, Value::Integer(1));
        assert_eq!(kind.decode(Dialect::Sqlite, stored), Value::Bool(true));
        assert_eq!(
            kind.encode(Dialect::Postgres, Value::Bool(true)),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_time_accepts_text() {
        let kind = ColumnKind::Time;
        let value = kind.validate(Value::Text("2024-01-02 03:04:05".into())).unwrap();
        assert!(matches!(value, Value::Time(_)));
        assert_eq!(
            kind.encode(Dialect::Sqlite, value),
            Value::Text("2024-01-02 03:04:05".into())
        );
        assert!(kind.validate(Value::Text("soon".into())).is_err());
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("pg".parse::<Dialect>(), Ok(Dialect::Postgres));
        assert_eq!("MySQL".parse::<Dialect>(), Ok(Dialect::MySql));
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
