//! Data-driven linear formulas.
//!
//! A formula is `constant + Σ coefficient × input`, optionally clamped. The
//! input names are checked against the inputs a call site provides when the
//! content is loaded, so a typo in a recipe surfaces before the first turn.

use std::collections::BTreeMap;

use error::ContentError;
use serde::{Deserialize, Serialize};

pub type FormulaInputs = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Formula {
    pub constant: f64,
    pub terms: BTreeMap<String, f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Formula {
    pub fn constant(value: f64) -> Self {
        Self {
            constant: value,
            ..Self::default()
        }
    }

    pub fn linear(constant: f64, terms: &[(&str, f64)]) -> Self {
        Self {
            constant,
            terms: terms.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            ..Self::default()
        }
    }

    pub fn clamped(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Evaluates with a lookup function; unknown inputs contribute zero.
    pub fn evaluate_with(&self, lookup: impl Fn(&str) -> Option<f64>) -> f64 {
        let raw = self
            .terms
            .iter()
            .fold(self.constant, |acc, (name, coeff)| acc + coeff * lookup(name).unwrap_or(0.0));
        let raw = self.min.map_or(raw, |min| raw.max(min));
        self.max.map_or(raw, |max| raw.min(max))
    }

    pub fn evaluate(&self, inputs: &FormulaInputs) -> f64 {
        self.evaluate_with(|name| inputs.get(name).copied())
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    /// Fails on the first input not offered by the call site.
    pub fn validate_inputs<'a, I>(&self, formula: &str, allowed: I) -> Result<(), ContentError>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        for name in self.input_names() {
            if !allowed.clone().into_iter().any(|a| a == name) {
                return Err(ContentError::UnknownFormulaInput {
                    formula: formula.to_string(),
                    input: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

pub fn inputs(pairs: &[(&str, f64)]) -> FormulaInputs {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_evaluation() {
        let f = Formula::linear(0.0, &[("attack", 1.0), ("defense", -1.0)]);
        assert_eq!(f.evaluate(&inputs(&[("attack", 5.0), ("defense", 2.0)])), 3.0);
    }

    #[test]
    fn missing_inputs_are_zero_and_bounds_apply() {
        let f = Formula::linear(2.0, &[("purity", 10.0)]).clamped(Some(3.0), Some(6.0));
        assert_eq!(f.evaluate(&FormulaInputs::new()), 3.0);
        assert_eq!(f.evaluate(&inputs(&[("purity", 1.0)])), 6.0);
    }

    #[test]
    fn unknown_input_is_rejected() {
        let f = Formula::linear(0.0, &[("atack", 1.0)]);
        let err = f.validate_inputs("damage", ["attack", "defense"]).unwrap_err();
        assert_eq!(
            err,
            ContentError::UnknownFormulaInput {
                formula: "damage".into(),
                input: "atack".into()
            }
        );
        assert!(Formula::constant(1.0).validate_inputs("x", ["a"]).is_ok());
    }
}
