use crate::config::Scale;
use crate::formula::WeightedFormula;
use crate::models::BoundPair;

/// Range a formula could produce if every input sat at the scale floor or
/// ceiling. Depends only on the coefficients, never on observed data.
pub fn theoretical_bounds(formula: &WeightedFormula, scale: Scale) -> BoundPair {
    let weight = formula.coefficient_sum();
    BoundPair {
        min: scale.floor * weight,
        max: scale.ceiling * weight,
    }
}
