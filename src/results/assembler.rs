use thiserror::Error;

use crate::domain_model::{ValueConversionError, ValueMapping};
use crate::value::Value;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssemblyError {
    #[error("row has {width} values, no position {position}")]
    PositionOutOfRange { position: usize, width: usize },
    #[error(transparent)]
    Conversion(#[from] ValueConversionError),
}

/// Reads one value from a fixed position of every row.
///
/// Built once per statement; holds no per-row state, so the initializer
/// forest can call it in any fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BasicAssembler {
    pub position: usize,
    /// `None` keeps the raw store value.
    pub mapping: Option<ValueMapping>,
}

impl BasicAssembler {
    pub fn new(position: usize, mapping: Option<ValueMapping>) -> Self {
        BasicAssembler { position, mapping }
    }

    pub fn assemble(&self, row: &[Value]) -> Result<Value, AssemblyError> {
        let raw = row
            .get(self.position)
            .ok_or(AssemblyError::PositionOutOfRange {
                position: self.position,
                width: row.len(),
            })?;
        match &self.mapping {
            Some(mapping) => Ok(mapping.extract(raw)?),
            None => Ok(raw.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::value_mapping::{INT64, STRING};

    #[test]
    fn test_assemble_extracts_with_mapping() {
        let row = vec![Value::Text("17".into()), Value::Null];
        assert_eq!(
            BasicAssembler::new(0, Some(INT64)).assemble(&row).unwrap(),
            Value::Int(17)
        );
        assert_eq!(
            BasicAssembler::new(1, Some(STRING)).assemble(&row).unwrap(),
            Value::Null
        );
        assert_eq!(
            BasicAssembler::new(0, None).assemble(&row).unwrap(),
            Value::Text("17".into())
        );
    }

    #[test]
    fn test_assemble_out_of_range() {
        let err = BasicAssembler::new(3, None).assemble(&[]).unwrap_err();
        assert_eq!(err, AssemblyError::PositionOutOfRange { position: 3, width: 0 });
    }
}
