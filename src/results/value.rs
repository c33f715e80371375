// Stored-value parser for legacy result tables.
//
// Older result files store every cell as the text form of a number, a NaN
// marker or a (possibly nested) list of those. This parser accepts exactly
// that grammar and nothing else:
//
//   value := number | nan | '[' (value (',' value)* ','?)? ']'
//   nan   := "nan" | "NaN" | "np.nan"
//
// Identifiers, calls, dicts and trailing text are errors.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Number(f64),
    List(Vec<StoredValue>),
}

impl StoredValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::List(_) => None,
        }
    }

    /// Flatten a list of numbers. `None` if any element is itself a list.
    pub fn as_series(&self) -> Option<Vec<f64>> {
        match self {
            Self::Number(_) => None,
            Self::List(items) => items.iter().map(StoredValue::as_number).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueParseError {
    #[error("empty value")]
    Empty,
    #[error("unexpected {found:?} at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("unterminated list")]
    UnterminatedList,
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
    #[error("trailing input at offset {0}")]
    Trailing(usize),
}

const NAN_MARKERS: [&str; 3] = ["np.nan", "nan", "NaN"];

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn value(&mut self) -> Result<StoredValue, ValueParseError> {
        self.skip_ws();
        match self.peek() {
            None => Err(ValueParseError::Empty),
            Some('[') => {
                self.pos += 1;
                self.list()
            }
            Some(_) => self.scalar(),
        }
    }

    fn list(&mut self) -> Result<StoredValue, ValueParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(ValueParseError::UnterminatedList),
                Some(']') => {
                    self.pos += 1;
                    return Ok(StoredValue::List(items));
                }
                Some(_) => {}
            }

            match self.value() {
                Err(ValueParseError::Empty) => return Err(ValueParseError::UnterminatedList),
                other => items.push(other?),
            }

            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {}
                None => return Err(ValueParseError::UnterminatedList),
                Some(c) => {
                    return Err(ValueParseError::Unexpected {
                        found: c,
                        offset: self.pos,
                    })
                }
            }
        }
    }

    fn scalar(&mut self) -> Result<StoredValue, ValueParseError> {
        let rest = self.rest();
        for marker in NAN_MARKERS {
            if let Some(after) = rest.strip_prefix(marker) {
                if !after.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
                    self.pos += marker.len();
                    return Ok(StoredValue::Number(f64::NAN));
                }
            }
        }

        let len = rest
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(ValueParseError::Unexpected {
                found: rest.chars().next().unwrap_or(' '),
                offset: self.pos,
            });
        }
        let token = &rest[..len];
        let v = token
            .parse::<f64>()
            .map_err(|_| ValueParseError::InvalidNumber(token.to_string()))?;
        self.pos += len;
        Ok(StoredValue::Number(v))
    }
}

/// Parse one stored cell.
pub fn parse_value(text: &str) -> Result<StoredValue, ValueParseError> {
    let mut parser = Parser { text, pos: 0 };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != text.len() {
        return Err(ValueParseError::Trailing(parser.pos));
    }
    Ok(value)
}

/// Turn a legacy header/value row pair into `(label, field → value)`.
///
/// The label sits in column 1; fields start at column 2. Fields that fail
/// to parse are skipped with a warning. `None` when the row has no label.
pub fn parse_record(
    header: &[&str],
    values: &[&str],
) -> Option<(String, BTreeMap<String, StoredValue>)> {
    let label = values.get(1)?.trim().to_string();
    let mut fields = BTreeMap::new();
    for (i, name) in header.iter().enumerate().skip(2) {
        let Some(raw) = values.get(i) else {
            break;
        };
        match parse_value(raw) {
            Ok(v) => {
                fields.insert(name.to_string(), v);
            }
            Err(e) => warn!(label = %label, field = %name, error = %e, "Skipping unparseable stored value"),
        }
    }
    Some((label, fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(parse_value("0.25").unwrap(), StoredValue::Number(0.25));
        assert_eq!(parse_value(" -1e-3 ").unwrap(), StoredValue::Number(-0.001));
        for marker in ["nan", "NaN", "np.nan"] {
            assert!(parse_value(marker).unwrap().as_number().unwrap().is_nan());
        }
    }

    #[test]
    fn test_nested_lists() {
        let v = parse_value("[1.0, nan, [2, 3],]").unwrap();
        let StoredValue::List(items) = &v else {
            panic!("expected list, got {v:?}");
        };
        assert_eq!(items.len(), 3);
        assert!(items[1].as_number().unwrap().is_nan());
        assert_eq!(
            items[2],
            StoredValue::List(vec![StoredValue::Number(2.0), StoredValue::Number(3.0)])
        );
        assert!(v.as_series().is_none());
        assert_eq!(parse_value("[]").unwrap(), StoredValue::List(vec![]));
    }

    #[test]
    fn test_rejects_expressions() {
        for bad in [
            "__import__('os')",
            "nanx",
            "np.nan.real",
            "{1: 2}",
            "[1, 2",
            "1 2",
            "[1 2]",
            "",
            "--1",
        ] {
            assert!(parse_value(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_parse_record_skips_bad_fields() {
        let header = ["", "label", "a", "b", "c"];
        let values = ["0", "sgns_run", "[0.1, nan]", "eval(1)", "3"];
        let (label, fields) = parse_record(&header, &values).unwrap();
        assert_eq!(label, "sgns_run");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["c"], StoredValue::Number(3.0));
        assert_eq!(fields["a"].as_series().unwrap().len(), 2);
    }
}
