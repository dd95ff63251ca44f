use validator::{ValidationError, ValidationErrors};

use crate::errors::BoundViolation;

/// Custom validator: `range` lets NaN through, so every float field also carries this
pub fn finite(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new("finite"))
    }
}

/// Turn a `validator` result into bound violations.
///
/// `bounds` lists every validated field in declaration order with its value
/// and accepted range; a violation is reported for each field `validator`
/// flagged, keeping that order.
pub fn collect_violations(
    result: Result<(), ValidationErrors>,
    bounds: &[BoundViolation],
) -> Result<(), Vec<BoundViolation>> {
    let errors = match result {
        Ok(()) => return Ok(()),
        Err(errors) => errors,
    };

    let field_errors = errors.field_errors();
    let violations: Vec<BoundViolation> = bounds
        .iter()
        .filter(|bound| field_errors.contains_key(bound.field))
        .cloned()
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Shorthand for a bounds table entry
pub fn bound(field: &'static str, value: f64, min: f64, max: f64) -> BoundViolation {
    BoundViolation { field, value, min, max }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(range(min = 0.0, max = 1.0), custom(function = "finite"))]
        a: f64,
        #[validate(range(min = 0.0, max = 1.0), custom(function = "finite"))]
        b: f64,
        #[validate(range(min = 0.0, max = 1.0), custom(function = "finite"))]
        c: f64,
    }

    impl Sample {
        fn check(&self) -> Result<(), Vec<BoundViolation>> {
            collect_violations(
                self.validate(),
                &[
                    bound("a", self.a, 0.0, 1.0),
                    bound("b", self.b, 0.0, 1.0),
                    bound("c", self.c, 0.0, 1.0),
                ],
            )
        }
    }

    #[test]
    fn test_collects_all_violations_in_order() {
        let sample = Sample { a: 5.0, b: 0.5, c: f64::NAN };
        let violations = sample.check().unwrap_err();
        let fields: Vec<_> = violations.iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["a", "c"]);
    }

    #[test]
    fn test_infinity_is_rejected() {
        let sample = Sample { a: 0.5, b: f64::INFINITY, c: 0.0 };
        assert_eq!(sample.check().unwrap_err().len(), 1);
        assert!(Sample { a: 0.0, b: 1.0, c: 0.5 }.check().is_ok());
    }
}
