use std::collections::HashMap;

use crate::value::Value;

/// Values supplied by the caller for one execution: named (`:name`) and
/// 1-based positional (`?1`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameters {
    named: HashMap<String, Value>,
    positional: Vec<Value>,
}

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_named(name, value);
        self
    }

    pub fn with_positional(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn set_named(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.named.insert(name.into(), value.into());
    }

    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    pub fn positional(&self, position: u32) -> Option<&Value> {
        let index = usize::try_from(position).ok()?.checked_sub(1)?;
        self.positional.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.positional.is_empty()
    }

    /// `name=value` as given on the command line. The value is typed loosely:
    /// integers, floats, booleans and `null` are recognised, anything else is
    /// text.
    pub fn parse_assignment(raw: &str) -> Option<(String, Value)> {
        let (name, value) = raw.split_once('=')?;
        let name = name.trim().trim_start_matches(':');
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), Value::parse_loose(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_is_one_based() {
        let params = QueryParameters::new().with_positional(10).with_positional("x");
        assert_eq!(params.positional(0), None);
        assert_eq!(params.positional(1), Some(&Value::Int(10)));
        assert_eq!(params.positional(2), Some(&Value::from("x")));
        assert_eq!(params.positional(3), None);
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            QueryParameters::parse_assignment("min=10"),
            Some(("min".to_string(), Value::Int(10)))
        );
        assert_eq!(
            QueryParameters::parse_assignment(":name=Ann"),
            Some(("name".to_string(), Value::from("Ann")))
        );
        assert_eq!(QueryParameters::parse_assignment("novalue"), None);
        assert_eq!(QueryParameters::parse_assignment("=3"), None);
    }
}
