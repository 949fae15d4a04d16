//! Daily calorie target from a biometric profile.
//!
//! BMR uses the Mifflin-St Jeor equation:
//! `10 x weight + 6.25 x height - 5 x age + s`, where `s` is +5 for men and
//! -161 for women. TDEE is BMR times the activity factor, and the goal is
//! TDEE plus the goal offset, rounded half away from zero.

use crate::{BiometricProfile, Error, Result};
use serde::Serialize;

/// Intermediate values of a goal calculation
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DailyGoal {
    pub bmr: f64,
    pub tdee: f64,
    pub goal_limit: f64,
}

/// Compute the daily calorie target for a profile
pub fn compute(profile: &BiometricProfile) -> Result<f64> {
    calculate(profile).map(|goal| goal.goal_limit)
}

/// Compute BMR, TDEE and the goal limit
pub fn calculate(profile: &BiometricProfile) -> Result<DailyGoal> {
    validate(profile)?;

    let bmr = 10.0 * profile.weight_kg + 6.25 * profile.height_cm
        - 5.0 * f64::from(profile.age_years)
        + profile.sex.bmr_offset();
    let tdee = bmr * profile.activity.factor();
    // f64::round rounds half away from zero
    let goal_limit = (tdee + f64::from(profile.goal.offset())).round();

    tracing::debug!(bmr, tdee, goal_limit, "Calculated daily goal");

    Ok(DailyGoal {
        bmr,
        tdee,
        goal_limit,
    })
}

fn validate(profile: &BiometricProfile) -> Result<()> {
    if !(profile.weight_kg.is_finite() && profile.weight_kg > 0.0) {
        return Err(Error::InvalidProfile(format!(
            "weight_kg must be a positive number, got {}",
            profile.weight_kg
        )));
    }
    if !(profile.height_cm.is_finite() && profile.height_cm > 0.0) {
        return Err(Error::InvalidProfile(format!(
            "height_cm must be a positive number, got {}",
            profile.height_cm
        )));
    }
    if profile.age_years == 0 {
        return Err(Error::InvalidProfile("age_years must be positive".into()));
    }
    Ok(())
}
