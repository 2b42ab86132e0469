use std::str::FromStr;

use crate::error::SraSketchError;
use crate::sketch::{DEFAULT_SEED, Molecule, Sampling, SketchRecipe, SketchSet};

pub const DEFAULT_PARAM_STRING: &str = "dna";

/// A validated parameter string, e.g. `dna,k=31,scaled=1000,noabund`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamString {
    raw: String,
    recipe: SketchRecipe,
}

impl ParamString {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn recipe(&self) -> &SketchRecipe {
        &self.recipe
    }
}

impl FromStr for ParamString {
    type Err = SraSketchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| SraSketchError::InvalidParameterConfiguration {
            params: value.to_string(),
            reason,
        };

        let tokens = value
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>();
        if tokens.is_empty() {
            return Err(invalid("empty parameter string".to_string()));
        }

        let mut molecule: Option<Molecule> = None;
        let mut ksize: Option<u32> = None;
        let mut sampling: Option<Sampling> = None;
        let mut seed = DEFAULT_SEED;
        let mut track_abundance = false;

        for token in tokens {
            let token_molecule = match token {
                "dna" | "nucleotide" => Some(Molecule::Dna),
                "protein" => Some(Molecule::Protein),
                "dayhoff" => Some(Molecule::Dayhoff),
                "hp" => Some(Molecule::Hp),
                _ => None,
            };
            if let Some(found) = token_molecule {
                match molecule {
                    Some(existing) if existing != found => {
                        return Err(invalid(format!(
                            "conflicting molecule types {existing} and {found}"
                        )));
                    }
                    _ => molecule = Some(found),
                }
                continue;
            }

            match token {
                "abund" => track_abundance = true,
                "noabund" => track_abundance = false,
                _ => {
                    let (key, raw) = token
                        .split_once('=')
                        .ok_or_else(|| invalid(format!("unknown parameter '{token}'")))?;
                    let number = raw
                        .trim()
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("'{key}' needs a number, got '{raw}'")))?;
                    match key.trim() {
                        "k" => {
                            if ksize.is_some() {
                                return Err(invalid(
                                    "multiple k-mer sizes; give each its own parameter string"
                                        .to_string(),
                                ));
                            }
                            let k = u32::try_from(number)
                                .ok()
                                .filter(|k| *k > 0)
                                .ok_or_else(|| invalid(format!("invalid k-mer size {number}")))?;
                            ksize = Some(k);
                        }
                        "scaled" => {
                            if matches!(sampling, Some(Sampling::Num(_))) {
                                return Err(invalid("cannot set both num and scaled".to_string()));
                            }
                            let scaled = u32::try_from(number)
                                .ok()
                                .filter(|scaled| *scaled > 0)
                                .ok_or_else(|| invalid(format!("invalid scaled {number}")))?;
                            sampling = Some(Sampling::Scaled(scaled));
                        }
                        "num" => {
                            if matches!(sampling, Some(Sampling::Scaled(_))) {
                                return Err(invalid("cannot set both num and scaled".to_string()));
                            }
                            let num = u32::try_from(number)
                                .ok()
                                .filter(|num| *num > 0)
                                .ok_or_else(|| invalid(format!("invalid num {number}")))?;
                            sampling = Some(Sampling::Num(num));
                        }
                        "seed" => seed = number,
                        other => return Err(invalid(format!("unknown parameter '{other}'"))),
                    }
                }
            }
        }

        let molecule = molecule.unwrap_or(Molecule::Dna);
        Ok(Self {
            raw: value.to_string(),
            recipe: SketchRecipe {
                molecule,
                ksize: ksize.unwrap_or_else(|| molecule.default_ksize()),
                sampling: sampling.unwrap_or(Sampling::Scaled(molecule.default_scaled())),
                seed,
                track_abundance,
            },
        })
    }
}

/// Builds a fresh, empty [`SketchSet`] for one parameter string.
#[derive(Debug, Clone)]
pub struct SketchFactory {
    params: ParamString,
}

impl SketchFactory {
    pub fn new(params: ParamString) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ParamString {
        &self.params
    }

    pub fn build(&self) -> SketchSet {
        SketchSet::new(std::slice::from_ref(&self.params.recipe))
    }
}

/// One factory per parameter string, in the order given. No strings means the
/// default `dna` recipe.
pub fn build_factories<S: AsRef<str>>(
    param_strings: &[S],
) -> Result<Vec<SketchFactory>, SraSketchError> {
    if param_strings.is_empty() {
        let params = DEFAULT_PARAM_STRING.parse()?;
        return Ok(vec![SketchFactory::new(params)]);
    }
    param_strings
        .iter()
        .map(|value| value.as_ref().parse().map(SketchFactory::new))
        .collect()
}
