//! Annotation text formatting.
//!
//! Fixed string forms for the per-face text fields; rounding follows
//! standard round-half-away-from-zero rules.

use facehud_core::types::{ExpressionScores, GenderEstimate};

/// "male - 87%" — gender label plus confidence as a whole percentage.
pub fn format_gender(estimate: &GenderEstimate) -> String {
    format!(
        "{} - {}%",
        estimate.gender,
        (estimate.probability * 100.0).round() as u32
    )
}

/// "32 years" — age rounded to the nearest whole year.
pub fn format_age(age: f32) -> String {
    format!("{} years", age.round() as i64)
}

/// "happy (92%)" — the dominant expression with its probability.
pub fn format_expression(expressions: &ExpressionScores) -> String {
    let (name, probability) = expressions.dominant();
    format!("{name} ({}%)", (probability * 100.0).round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facehud_core::types::Gender;

    fn expressions_with(index: usize, p: f32) -> ExpressionScores {
        let mut scores = [0.01f32; 7];
        scores[index] = p;
        ExpressionScores { scores }
    }

    #[test]
    fn test_gender_rounding() {
        let e = GenderEstimate { gender: Gender::Male, probability: 0.874 };
        assert_eq!(format_gender(&e), "male - 87%");
    }

    #[test]
    fn test_gender_rounds_half_up() {
        let e = GenderEstimate { gender: Gender::Female, probability: 0.875 };
        assert_eq!(format_gender(&e), "female - 88%");
    }

    #[test]
    fn test_gender_full_confidence() {
        let e = GenderEstimate { gender: Gender::Female, probability: 1.0 };
        assert_eq!(format_gender(&e), "female - 100%");
    }

    #[test]
    fn test_age_zero() {
        assert_eq!(format_age(0.0), "0 years");
    }

    #[test]
    fn test_age_120() {
        assert_eq!(format_age(120.0), "120 years");
    }

    #[test]
    fn test_age_rounds() {
        assert_eq!(format_age(31.5), "32 years");
        assert_eq!(format_age(31.4), "31 years");
    }

    #[test]
    fn test_expression_dominant() {
        let e = expressions_with(1, 0.92); // happy
        assert_eq!(format_expression(&e), "happy (92%)");
    }

    #[test]
    fn test_expression_surprised() {
        let e = expressions_with(6, 0.51);
        assert_eq!(format_expression(&e), "surprised (51%)");
    }
}
