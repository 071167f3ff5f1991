//! Lookup table of the available delay distributions.
//!
//! Each [`DistributionEntry`] names a distribution, describes the parameters it takes and knows
//! how to build a [`Distribution`] from a set of named [`Params`]. Configuration files select a
//! distribution by name and supply its parameters as a table, eg.
//!
//! ```toml
//! [distribution]
//! name = "gaussian"
//! params = { mean = 0.05, std_dev = 0.01 }
//! ```

use crate::priv_prelude::*;

/// Named parameter values used to construct a distribution.
pub type Params = BTreeMap<String, ParamValue>;

/// A single parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A boolean flag.
    Bool(bool),
    /// A whole number. Accepted wherever a float is expected.
    Integer(i64),
    /// A floating point number.
    Float(f64),
}

/// The type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Float,
    Bool,
}

/// Describes one parameter of a distribution.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    /// Value used when the parameter is omitted. Parameters without a default are required.
    pub default: Option<ParamValue>,
}

/// A registered distribution.
#[derive(Debug, Clone, Copy)]
pub struct DistributionEntry {
    pub name: &'static str,
    pub params: &'static [ParamSpec],
    build: fn(&Resolved) -> Distribution,
}

const fn required(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec { name, kind, default: None }
}

const fn optional(name: &'static str, kind: ParamKind, default: ParamValue) -> ParamSpec {
    ParamSpec { name, kind, default: Some(default) }
}

static ENTRIES: [DistributionEntry; 3] = [
    DistributionEntry {
        name: "CONSTANT",
        params: &[required("constant", ParamKind::Float)],
        build: |params| Distribution::Constant {
            value: params.float("constant"),
        },
    },
    DistributionEntry {
        name: "GAUSSIAN",
        params: &[
            required("mean", ParamKind::Float),
            required("std_dev", ParamKind::Float),
            optional("strictly_positive", ParamKind::Bool, ParamValue::Bool(true)),
        ],
        build: |params| Distribution::Gaussian {
            mean: params.float("mean"),
            std_dev: params.float("std_dev"),
            strictly_positive: params.bool("strictly_positive"),
        },
    },
    DistributionEntry {
        name: "EXPONENTIAL",
        params: &[required("scale", ParamKind::Float)],
        build: |params| Distribution::Exponential {
            scale: params.float("scale"),
        },
    },
];

/// All registered distributions.
pub fn entries() -> &'static [DistributionEntry] {
    &ENTRIES
}

/// Finds a distribution by name, ignoring case.
pub fn lookup(name: &str) -> Option<&'static DistributionEntry> {
    ENTRIES.iter().find(|entry| entry.name.eq_ignore_ascii_case(name))
}

/// Parameters after type checking and default substitution. Only ever holds values for
/// parameters named in the entry's schema, so the accessors can't miss.
struct Resolved {
    values: BTreeMap<&'static str, ParamValue>,
}

impl Resolved {
    fn float(&self, name: &str) -> f64 {
        match self.values.get(name) {
            Some(ParamValue::Float(value)) => *value,
            Some(ParamValue::Integer(value)) => *value as f64,
            _ => unreachable!("parameter {} was checked against the schema", name),
        }
    }

    fn bool(&self, name: &str) -> bool {
        match self.values.get(name) {
            Some(ParamValue::Bool(value)) => *value,
            _ => unreachable!("parameter {} was checked against the schema", name),
        }
    }
}

impl ParamValue {
    fn matches(&self, kind: ParamKind) -> bool {
        match (self, kind) {
            (ParamValue::Float(_), ParamKind::Float) => true,
            (ParamValue::Integer(_), ParamKind::Float) => true,
            (ParamValue::Bool(_), ParamKind::Bool) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Float => write!(f, "float"),
            ParamKind::Bool => write!(f, "bool"),
        }
    }
}

impl DistributionEntry {
    /// Builds the distribution from `params`, checking them against this entry's schema.
    pub fn build(&self, params: &Params) -> Result<Distribution, ConfigError> {
        if let Some(unknown) = params.keys().find(|key| {
            !self.params.iter().any(|spec| spec.name == key.as_str())
        }) {
            return Err(ConfigError::UnknownParam {
                distribution: self.name,
                param: unknown.clone(),
            });
        }

        let mut values = BTreeMap::new();
        for spec in self.params {
            let value = match (params.get(spec.name), spec.default) {
                (Some(value), _) => *value,
                (None, Some(default)) => default,
                (None, None) => {
                    return Err(ConfigError::MissingParam {
                        distribution: self.name,
                        param: spec.name,
                    });
                },
            };
            if !value.matches(spec.kind) {
                return Err(ConfigError::ParamType {
                    distribution: self.name,
                    param: spec.name,
                    expected: spec.kind,
                });
            }
            values.insert(spec.name, value);
        }
        Ok((self.build)(&Resolved { values }))
    }
}

impl Distribution {
    /// Builds a distribution from its registered name and a set of named parameters.
    pub fn from_params(name: &str, params: &Params) -> Result<Distribution, ConfigError> {
        match lookup(name) {
            Some(entry) => entry.build(params),
            None => Err(ConfigError::UnknownDistribution(name.to_owned())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn params(pairs: &[(&str, ParamValue)]) -> Params {
        pairs.iter().map(|(name, value)| (name.to_string(), *value)).collect()
    }

    #[test]
    fn every_variant_is_registered() {
        let samples = [
            Distribution::constant(0.0),
            Distribution::gaussian(0.0, 1.0),
            Distribution::exponential(1.0),
        ];
        for dist in samples {
            assert!(lookup(dist.name()).is_some());
        }
        assert_eq!(entries().len(), samples.len());
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(lookup("gaussian").unwrap().name, "GAUSSIAN");
        assert_eq!(lookup("Exponential").unwrap().name, "EXPONENTIAL");
        assert!(lookup("uniform").is_none());
    }

    #[test]
    fn builds_constant() {
        let dist = Distribution::from_params(
            "constant",
            &params(&[("constant", ParamValue::Float(0.25))]),
        ).unwrap();
        assert_eq!(dist, Distribution::constant(0.25));
    }

    #[test]
    fn integers_are_accepted_as_floats() {
        let dist = Distribution::from_params(
            "exponential",
            &params(&[("scale", ParamValue::Integer(2))]),
        ).unwrap();
        assert_eq!(dist, Distribution::exponential(2.0));
    }

    #[test]
    fn gaussian_is_strictly_positive_by_default() {
        let dist = Distribution::from_params(
            "GAUSSIAN",
            &params(&[
                ("mean", ParamValue::Float(0.1)),
                ("std_dev", ParamValue::Float(0.01)),
            ]),
        ).unwrap();
        assert_eq!(dist, Distribution::gaussian(0.1, 0.01));

        let dist = Distribution::from_params(
            "GAUSSIAN",
            &params(&[
                ("mean", ParamValue::Float(0.1)),
                ("std_dev", ParamValue::Float(0.01)),
                ("strictly_positive", ParamValue::Bool(false)),
            ]),
        ).unwrap();
        match dist {
            Distribution::Gaussian { strictly_positive, .. } => assert!(!strictly_positive),
            other => panic!("unexpected distribution {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_params() {
        let err = Distribution::from_params("gaussian", &params(&[("mean", ParamValue::Float(0.1))]));
        match err {
            Err(ConfigError::MissingParam { param: "std_dev", .. }) => (),
            other => panic!("unexpected result {:?}", other),
        }

        let err = Distribution::from_params(
            "constant",
            &params(&[
                ("constant", ParamValue::Float(0.1)),
                ("jitter", ParamValue::Float(0.1)),
            ]),
        );
        match err {
            Err(ConfigError::UnknownParam { param, .. }) => assert_eq!(param, "jitter"),
            other => panic!("unexpected result {:?}", other),
        }

        let err = Distribution::from_params(
            "exponential",
            &params(&[("scale", ParamValue::Bool(true))]),
        );
        match err {
            Err(ConfigError::ParamType { param: "scale", expected: ParamKind::Float, .. }) => (),
            other => panic!("unexpected result {:?}", other),
        }

        let err = Distribution::from_params("pareto", &Params::new());
        match err {
            Err(ConfigError::UnknownDistribution(name)) => assert_eq!(name, "pareto"),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
