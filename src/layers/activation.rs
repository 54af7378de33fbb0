//! Activation Functions
//!
//! Element-wise nonlinearities applied after a layer's affine transform,
//! together with the derivatives backpropagation needs.
//!
//! ## Variants
//!
//! ```text
//! identity        f(x) = x                       f'(x) = 1
//! sigmoid         f(x) = 1 / (1 + e^-x)          f'(x) = y (1 - y)
//! tanh            f(x) = tanh(x)                 f'(x) = 1 - y²
//! leakyReLU[α]    f(x) = x if x > 0 else α x     f'(x) = 1 if x > 0 else α
//! ```
//!
//! where `y = f(x)`. Sigmoid and tanh derivatives are cheapest when written
//! in terms of the output, which the forward cache already holds.
//!
//! ## Identifiers
//!
//! Each variant has a stable textual identity. A host runtime asks for an
//! activation by name with [`activation_by_name`] and receives a fresh value;
//! there is no global table to mutate.
//!
//! ```rust
//! use synapses::{activation_by_name, ActivationFunction};
//!
//! let f = activation_by_name("leakyReLU[0.2]").unwrap();
//! assert_eq!(f, ActivationFunction::leaky_relu(0.2).unwrap());
//! assert_eq!(f.identifier(), "leakyReLU[0.2]");
//! ```

use crate::error::{Error, Result};
use std::fmt;

/// Default slope of LeakyReLU for negative inputs.
pub const DEFAULT_LEAKY_ALPHA: f64 = 0.01;

/// Closed set of supported activation functions.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ActivationFunction {
    Identity,
    #[default]
    Sigmoid,
    Tanh,
    /// Slope `alpha` for non-positive inputs. Always finite and `>= 0`
    /// when built through [`ActivationFunction::leaky_relu`].
    LeakyReLU { alpha: f64 },
}

impl ActivationFunction {
    /// Base identifiers of every variant.
    pub const NAMES: [&'static str; 4] = ["identity", "sigmoid", "tanh", "leakyReLU"];

    /// LeakyReLU with a validated slope.
    pub fn leaky_relu(alpha: f64) -> Result<Self> {
        if !alpha.is_finite() {
            return Err(Error::invalid("alpha", format!("must be finite, got {alpha}")));
        }
        if alpha < 0.0 {
            return Err(Error::invalid("alpha", format!("must be >= 0, got {alpha}")));
        }
        Ok(ActivationFunction::LeakyReLU { alpha })
    }

    /// Base identifier without parameters (`"leakyReLU"` for any alpha).
    pub fn name(&self) -> &'static str {
        match self {
            ActivationFunction::Identity => "identity",
            ActivationFunction::Sigmoid => "sigmoid",
            ActivationFunction::Tanh => "tanh",
            ActivationFunction::LeakyReLU { .. } => "leakyReLU",
        }
    }

    /// Full identifier including parameters, e.g. `leakyReLU[0.01]`.
    pub fn identifier(&self) -> String {
        match self {
            ActivationFunction::LeakyReLU { alpha } => format!("leakyReLU[{alpha}]"),
            other => other.name().to_string(),
        }
    }

    /// Numeric parameters in declaration order.
    pub fn parameters(&self) -> Vec<f64> {
        match self {
            ActivationFunction::LeakyReLU { alpha } => vec![*alpha],
            _ => Vec::new(),
        }
    }

    /// Rebuild a variant from its base identifier and parameter list.
    pub fn from_parts(name: &str, params: &[f64]) -> Result<Self> {
        let expect_no_params = |f: ActivationFunction| {
            if params.is_empty() {
                Ok(f)
            } else {
                Err(Error::invalid(
                    "activation",
                    format!("`{name}` takes no parameters, got {}", params.len()),
                ))
            }
        };

        match name {
            "identity" => expect_no_params(ActivationFunction::Identity),
            "sigmoid" => expect_no_params(ActivationFunction::Sigmoid),
            "tanh" => expect_no_params(ActivationFunction::Tanh),
            "leakyReLU" => match params {
                [] => Self::leaky_relu(DEFAULT_LEAKY_ALPHA),
                [alpha] => Self::leaky_relu(*alpha),
                _ => Err(Error::invalid(
                    "activation",
                    format!("`leakyReLU` takes one parameter, got {}", params.len()),
                )),
            },
            _ => Err(Error::invalid(
                "activation",
                format!("unknown activation `{name}`"),
            )),
        }
    }

    /// Parse an identifier: a bare name or `name[p1,p2,...]`.
    pub fn from_name(identifier: &str) -> Result<Self> {
        let identifier = identifier.trim();
        let Some(open) = identifier.find('[') else {
            return Self::from_parts(identifier, &[]);
        };
        let Some(inner) = identifier[open + 1..].strip_suffix(']') else {
            return Err(Error::invalid(
                "activation",
                format!("malformed identifier `{identifier}`"),
            ));
        };

        let params = inner
            .split(',')
            .map(|p| {
                p.trim().parse::<f64>().map_err(|_| {
                    Error::invalid(
                        "activation",
                        format!("bad parameter `{}` in `{identifier}`", p.trim()),
                    )
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        Self::from_parts(&identifier[..open], &params)
    }

    /// Apply the function to one value.
    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            ActivationFunction::Identity => x,
            ActivationFunction::Sigmoid => sigmoid(x),
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => {
                if x > 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
        }
    }

    /// Derivative at the pre-activation value `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match *self {
            ActivationFunction::Identity => 1.0,
            ActivationFunction::Sigmoid | ActivationFunction::Tanh => {
                self.derivative_from_output(self.apply(x))
            }
            ActivationFunction::LeakyReLU { alpha } => {
                if x > 0.0 {
                    1.0
                } else {
                    alpha
                }
            }
        }
    }

    /// Derivative expressed through the output `y = apply(x)`.
    ///
    /// Valid for every variant: LeakyReLU with `alpha >= 0` keeps the sign of
    /// its input, so `y > 0` exactly when `x > 0`.
    pub fn derivative_from_output(&self, y: f64) -> f64 {
        match *self {
            ActivationFunction::Identity => 1.0,
            ActivationFunction::Sigmoid => y * (1.0 - y),
            ActivationFunction::Tanh => 1.0 - y * y,
            ActivationFunction::LeakyReLU { alpha } => {
                if y > 0.0 {
                    1.0
                } else {
                    alpha
                }
            }
        }
    }

    /// Apply element-wise.
    pub fn apply_all(&self, z: &[f64]) -> Vec<f64> {
        z.iter().map(|&x| self.apply(x)).collect()
    }

    /// Derivative for a cached `(pre_activation, output)` pair.
    pub fn derivative_cached(&self, z: f64, a: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid | ActivationFunction::Tanh => {
                self.derivative_from_output(a)
            }
            _ => self.derivative(z),
        }
    }
}

impl fmt::Display for ActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

impl std::str::FromStr for ActivationFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// Look up an activation function by identifier, returning a fresh value.
pub fn activation_by_name(identifier: &str) -> Result<ActivationFunction> {
    ActivationFunction::from_name(identifier)
}

/// Logistic function in the overflow-free two-branch form.
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn all_variants() -> Vec<ActivationFunction> {
        vec![
            ActivationFunction::Identity,
            ActivationFunction::Sigmoid,
            ActivationFunction::Tanh,
            ActivationFunction::LeakyReLU { alpha: 0.01 },
            ActivationFunction::LeakyReLU { alpha: 0.3 },
        ]
    }

    fn central_difference(f: &ActivationFunction, x: f64) -> f64 {
        let h = 1e-6;
        (f.apply(x + h) - f.apply(x - h)) / (2.0 * h)
    }

    proptest! {
        #[test]
        fn prop_derivative_matches_finite_difference(x in -20.0f64..20.0) {
            // LeakyReLU has a kink at zero
            prop_assume!(x.abs() > 1e-3);
            for f in all_variants() {
                let numeric = central_difference(&f, x);
                prop_assert!((f.derivative(x) - numeric).abs() < 1e-5,
                    "{f}: analytic {} vs numeric {} at {x}", f.derivative(x), numeric);
                prop_assert!((f.derivative_from_output(f.apply(x)) - f.derivative(x)).abs() < 1e-12);
            }
        }

        #[test]
        fn prop_finite_for_finite_input(x in -1e300f64..1e300) {
            for f in all_variants() {
                prop_assert!(f.apply(x).is_finite());
                prop_assert!(f.derivative(x).is_finite());
            }
        }
    }

    #[test]
    fn test_sigmoid_saturation() {
        let f = ActivationFunction::Sigmoid;
        let hi = f.apply(1000.0);
        let lo = f.apply(-1000.0);
        assert!(hi.is_finite() && lo.is_finite());
        assert!((hi - 1.0).abs() < 1e-12);
        assert!(lo.abs() < 1e-12);
        assert_eq!(f.apply(0.0), 0.5);
    }

    #[test]
    fn test_leaky_relu_values() {
        let f = ActivationFunction::leaky_relu(0.01).unwrap();
        assert!((f.apply(-10.0) - (-0.1)).abs() < 1e-12);
        assert_eq!(f.derivative(-10.0), 0.01);
        assert_eq!(f.apply(5.0), 5.0);
        assert_eq!(f.derivative(5.0), 1.0);
    }

    #[test]
    fn test_leaky_relu_rejects_bad_alpha() {
        assert!(matches!(
            ActivationFunction::leaky_relu(-0.1),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(ActivationFunction::leaky_relu(f64::NAN).is_err());
        assert!(ActivationFunction::leaky_relu(f64::INFINITY).is_err());
        assert!(ActivationFunction::leaky_relu(0.0).is_ok());
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(activation_by_name("identity").unwrap(), ActivationFunction::Identity);
        assert_eq!(activation_by_name("sigmoid").unwrap(), ActivationFunction::Sigmoid);
        assert_eq!(activation_by_name("tanh").unwrap(), ActivationFunction::Tanh);
        assert_eq!(
            activation_by_name("leakyReLU").unwrap(),
            ActivationFunction::LeakyReLU { alpha: DEFAULT_LEAKY_ALPHA }
        );
        assert_eq!(
            activation_by_name("leakyReLU[0.25]").unwrap(),
            ActivationFunction::LeakyReLU { alpha: 0.25 }
        );
    }

    #[test]
    fn test_lookup_rejects_unknown_and_malformed() {
        assert!(activation_by_name("relu").is_err());
        assert!(activation_by_name("leakyReLU[0.1").is_err());
        assert!(activation_by_name("leakyReLU[abc]").is_err());
        assert!(activation_by_name("leakyReLU[-1]").is_err());
        assert!(activation_by_name("sigmoid[1]").is_err());
    }

    #[test]
    fn test_identifier_round_trip() {
        for f in all_variants() {
            let parsed: ActivationFunction = f.identifier().parse().unwrap();
            assert_eq!(parsed, f);
            assert_eq!(ActivationFunction::from_parts(f.name(), &f.parameters()).unwrap(), f);
        }
    }

    #[test]
    fn test_names_cover_all_variants() {
        for name in ActivationFunction::NAMES {
            assert_eq!(activation_by_name(name).unwrap().name(), name);
        }
    }
}
