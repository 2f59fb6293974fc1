use crate::error::AppError;

const WEIGHT_EPSILON: f64 = 1e-9;
const FIVE_POINT_GOAL: f64 = 3.0;
const HUNDRED_POINT_GOAL: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeOutcome {
    pub current_total: f64,
    pub goal: f64,
    pub needed: f64,
}

/// Minimum grade on the pending third component to reach a pass.
///
/// `p1`, `p2` and `p3` are percentages and must add up to 100. Both known
/// grades at or below 5 select the 0-5 scale (pass at 3.0); otherwise the
/// 0-100 scale (pass at 60) is assumed.
pub fn needed_grade(
    n1: f64,
    p1: f64,
    n2: f64,
    p2: f64,
    p3: f64,
) -> Result<GradeOutcome, AppError> {
    let values = [n1, p1, n2, p2, p3];
    if values.iter().any(|value| !value.is_finite()) {
        return Err(AppError::invalid_input("all values must be numbers"));
    }
    if (p1 + p2 + p3 - 100.0).abs() > WEIGHT_EPSILON {
        return Err(AppError::invalid_input("los porcentajes deben sumar 100%"));
    }
    if p3 <= 0.0 {
        return Err(AppError::invalid_input(
            "the pending component must carry some weight",
        ));
    }

    let goal = if n1 <= 5.0 && n2 <= 5.0 {
        FIVE_POINT_GOAL
    } else {
        HUNDRED_POINT_GOAL
    };
    let current_total = n1 * (p1 / 100.0) + n2 * (p2 / 100.0);
    let needed = (goal - current_total) / (p3 / 100.0);

    Ok(GradeOutcome {
        current_total,
        goal,
        needed,
    })
}

/// Reads `N1 P1 N2 P2 P3` from whitespace-separated text. Extra values are
/// ignored.
pub fn parse_grade_args(args: &str) -> Result<[f64; 5], AppError> {
    let usage = || AppError::invalid_input("uso: N1 P1 N2 P2 P3");
    let mut values = [0.0; 5];
    let mut tokens = args.split_whitespace();
    for slot in values.iter_mut() {
        let token = tokens.next().ok_or_else(usage)?;
        *slot = token
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|_| AppError::invalid_input(format!("'{token}' is not a number")))?;
    }
    Ok(values)
}

pub fn grade_from_args(args: &str) -> Result<GradeOutcome, AppError> {
    let [n1, p1, n2, p2, p3] = parse_grade_args(args)?;
    needed_grade(n1, p1, n2, p2, p3)
}

pub fn render_grade(outcome: &GradeOutcome) -> String {
    format!(
        "🧮 *CÁLCULO*\nLlevas: *{:.2}*\nMeta: *{}*\n😱 *NECESITAS: {:.2}*",
        outcome.current_total, outcome.goal, outcome.needed
    )
}

#[cfg(test)]
mod tests {
    use super::{GradeOutcome, grade_from_args, needed_grade, parse_grade_args, render_grade};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn five_point_scale_example() {
        let outcome = needed_grade(4.5, 30.0, 3.8, 30.0, 40.0).unwrap();

        assert!(close(outcome.current_total, 2.49));
        assert!(close(outcome.goal, 3.0));
        assert!(close(outcome.needed, 1.275));
    }

    #[test]
    fn hundred_point_scale_when_a_grade_exceeds_five() {
        let outcome = needed_grade(70.0, 25.0, 50.0, 25.0, 50.0).unwrap();

        assert!(close(outcome.goal, 60.0));
        assert!(close(outcome.current_total, 30.0));
        assert!(close(outcome.needed, 60.0));
    }

    #[test]
    fn weights_must_sum_to_hundred() {
        let err = needed_grade(4.0, 30.0, 4.0, 30.0, 30.0).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn fractional_weights_within_epsilon_are_accepted() {
        assert!(needed_grade(4.0, 33.3, 4.0, 33.3, 33.4).is_ok());
    }

    #[test]
    fn zero_pending_weight_is_rejected() {
        let err = needed_grade(4.0, 50.0, 4.0, 50.0, 0.0).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn parse_requires_five_numbers() {
        assert!(parse_grade_args("4.5 30 3.8 30").is_err());
        assert!(parse_grade_args("4.5 30 x 30 40").is_err());
        assert_eq!(
            parse_grade_args("4,5 30 3.8 30 40 99").unwrap(),
            [4.5, 30.0, 3.8, 30.0, 40.0]
        );
    }

    #[test]
    fn renders_two_decimals() {
        let outcome = GradeOutcome {
            current_total: 2.5,
            goal: 3.0,
            needed: 1.25,
        };

        assert_eq!(
            render_grade(&outcome),
            "🧮 *CÁLCULO*\nLlevas: *2.50*\nMeta: *3*\n😱 *NECESITAS: 1.25*"
        );
    }

    #[test]
    fn grade_from_args_reads_the_example() {
        let outcome = grade_from_args("4.5 30 3.8 30 40").unwrap();
        assert!(close(outcome.needed, 1.275));
    }
}
