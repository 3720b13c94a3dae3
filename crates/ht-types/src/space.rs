//! Hyperparameter configurations and the minimal search space that produces
//! them.
//!
//! Full configuration-space definition and validation lives with the advisor;
//! the [`SearchSpace`] here is just enough structure to sample candidate
//! [`Configuration`]s and to provide a default one.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A concrete hyperparameter value.
///
/// `Float` values compare and hash by bit pattern so a [`Configuration`] can
/// serve as a map key with a stable identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParameterValue {
    Float(f64),
    Int(i64),
    Categorical(String),
    Bool(bool),
}

impl PartialEq for ParameterValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Categorical(a), Self::Categorical(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParameterValue {}

impl Hash for ParameterValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Float(v) => {
                0u8.hash(state);
                v.to_bits().hash(state);
            }
            Self::Int(v) => {
                1u8.hash(state);
                v.hash(state);
            }
            Self::Categorical(v) => {
                2u8.hash(state);
                v.hash(state);
            }
            Self::Bool(v) => {
                3u8.hash(state);
                v.hash(state);
            }
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Categorical(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// One candidate point in the search space: an immutable, ordered assignment
/// of hyperparameter values.
///
/// Identity is the full value list, so two configurations with the same
/// values are the same map key. There is no mutation API after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    values: Vec<(String, ParameterValue)>,
}

impl Configuration {
    pub fn new(values: Vec<(String, ParameterValue)>) -> Self {
        Self { values }
    }

    /// Look up a single parameter by name.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ParameterValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, "}}")
    }
}

/// How a single dimension is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DimensionKind {
    /// Continuous uniform range [low, high].
    FloatRange { low: f64, high: f64 },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64 },
    /// Categorical choices.
    Choice { values: Vec<String> },
}

/// A single named dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub kind: DimensionKind,
}

/// An ordered list of dimensions a suggestion strategy samples from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    pub dimensions: Vec<Dimension>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            dimensions: Vec::new(),
        }
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            kind: DimensionKind::FloatRange { low, high },
        });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            kind: DimensionKind::IntRange { low, high },
        });
        self
    }

    pub fn add_choice(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            kind: DimensionKind::Choice { values },
        });
        self
    }

    /// Draw one uniform sample from every dimension.
    pub fn sample(&self, rng: &mut impl Rng) -> Configuration {
        let values = self
            .dimensions
            .iter()
            .map(|dim| {
                let value = match &dim.kind {
                    DimensionKind::FloatRange { low, high } => {
                        ParameterValue::Float(rng.random_range(*low..=*high))
                    }
                    DimensionKind::IntRange { low, high } => {
                        ParameterValue::Int(rng.random_range(*low..=*high))
                    }
                    DimensionKind::Choice { values } => {
                        let idx = rng.random_range(0..values.len());
                        ParameterValue::Categorical(values[idx].clone())
                    }
                };
                (dim.name.clone(), value)
            })
            .collect();
        Configuration::new(values)
    }

    /// The deterministic default configuration: range midpoints and first
    /// choices. This is the incumbent before any trial succeeds.
    pub fn default_configuration(&self) -> Configuration {
        let values = self
            .dimensions
            .iter()
            .map(|dim| {
                let value = match &dim.kind {
                    DimensionKind::FloatRange { low, high } => {
                        ParameterValue::Float((low + high) / 2.0)
                    }
                    DimensionKind::IntRange { low, high } => {
                        ParameterValue::Int(low + (high - low) / 2)
                    }
                    DimensionKind::Choice { values } => {
                        ParameterValue::Categorical(values.first().cloned().unwrap_or_default())
                    }
                };
                (dim.name.clone(), value)
            })
            .collect();
        Configuration::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .add_float("lr", 1e-4, 1e-1)
            .add_int("depth", 2, 10)
            .add_choice("booster", vec!["gbtree".into(), "dart".into()])
    }

    #[test]
    fn configuration_identity_is_value_based() {
        let a = Configuration::new(vec![
            ("lr".into(), ParameterValue::Float(0.01)),
            ("depth".into(), ParameterValue::Int(3)),
        ]);
        let b = Configuration::new(vec![
            ("lr".into(), ParameterValue::Float(0.01)),
            ("depth".into(), ParameterValue::Int(3)),
        ]);
        assert_eq!(a, b);

        let mut map: HashMap<Configuration, usize> = HashMap::new();
        map.insert(a, 1);
        map.insert(b, 2);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn sample_respects_bounds() {
        let space = space();
        let mut rng = rand::rng();
        for _ in 0..50 {
            let config = space.sample(&mut rng);
            match config.get("lr") {
                Some(ParameterValue::Float(v)) => assert!((1e-4..=1e-1).contains(v)),
                other => panic!("unexpected lr value: {other:?}"),
            }
            match config.get("depth") {
                Some(ParameterValue::Int(v)) => assert!((2..=10).contains(v)),
                other => panic!("unexpected depth value: {other:?}"),
            }
        }
    }

    #[test]
    fn default_configuration_is_deterministic() {
        let space = space();
        assert_eq!(space.default_configuration(), space.default_configuration());
        match space.default_configuration().get("booster") {
            Some(ParameterValue::Categorical(v)) => assert_eq!(v, "gbtree"),
            other => panic!("unexpected booster value: {other:?}"),
        }
    }

    #[test]
    fn configuration_round_trip() {
        let config = space().default_configuration();
        let json = serde_json::to_string(&config).unwrap();
        let back: Configuration = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
