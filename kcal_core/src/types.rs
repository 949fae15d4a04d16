//! Core domain types for the calorie ledger.
//!
//! This module defines the fundamental types used throughout the system:
//! - The biometric profile and its enumerated selections
//! - Log entries as read from the ledger
//! - Per-day summary records and their goal status

use crate::date_key::DateKey;
use chrono::{DateTime, FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Profile Types
// ============================================================================

/// Sex used by the Mifflin-St Jeor equation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Constant term of the BMR equation
    pub fn bmr_offset(self) -> f64 {
        match self {
            Sex::Male => 5.0,
            Sex::Female => -161.0,
        }
    }
}

/// Habitual activity level, each carrying its TDEE multiplier
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    /// Little or no exercise
    Sedentary,
    /// Light exercise 1-3 days/week
    Light,
    /// Moderate exercise 3-5 days/week
    Moderate,
    /// Hard exercise 6-7 days/week
    Active,
    /// Physical job or twice-daily training
    VeryActive,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 5] = [
        ActivityLevel::Sedentary,
        ActivityLevel::Light,
        ActivityLevel::Moderate,
        ActivityLevel::Active,
        ActivityLevel::VeryActive,
    ];

    pub fn factor(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }

    /// Map a numeric multiplier back onto its level
    pub fn from_factor(factor: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|level| (level.factor() - factor).abs() < 1e-9)
    }
}

/// Signed calorie adjustment applied on top of TDEE
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalAdjustment {
    Lose,
    #[default]
    Maintain,
    Gain,
}

impl GoalAdjustment {
    pub fn offset(self) -> i32 {
        match self {
            GoalAdjustment::Lose => -500,
            GoalAdjustment::Maintain => 0,
            GoalAdjustment::Gain => 500,
        }
    }

    pub fn from_offset(offset: i32) -> Option<Self> {
        match offset {
            -500 => Some(GoalAdjustment::Lose),
            0 => Some(GoalAdjustment::Maintain),
            500 => Some(GoalAdjustment::Gain),
            _ => None,
        }
    }
}

/// Physiological inputs to the daily calorie target.
///
/// Built once at the profile-read boundary; the calculator still rejects
/// non-positive measurements since the fields are public.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BiometricProfile {
    pub sex: Sex,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age_years: u32,
    pub activity: ActivityLevel,
    pub goal: GoalAdjustment,
}

// ============================================================================
// Ledger Types
// ============================================================================

/// Meal slot of a log entry
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Drink,
}

impl MealType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Some(MealType::Breakfast),
            "lunch" => Some(MealType::Lunch),
            "dinner" => Some(MealType::Dinner),
            "snack" => Some(MealType::Snack),
            "drink" => Some(MealType::Drink),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Snack => "Snack",
            MealType::Drink => "Drink",
        }
    }
}

/// One food entry from the append-only log.
///
/// `date` and `calories` are `None` when the stored cell could not be read;
/// such entries are skipped by the aggregator.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub date: Option<DateTime<FixedOffset>>,
    pub time: Option<NaiveTime>,
    pub meal_type: Option<MealType>,
    pub description: String,
    pub calories: Option<f64>,
}

/// Per-day calorie totals keyed by DateKey
pub type DailyTotals = BTreeMap<DateKey, f64>;

// ============================================================================
// Summary Types
// ============================================================================

/// Goal adherence of a day
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Under,
    Over,
}

impl GoalStatus {
    /// A day exactly on target counts as Under
    pub fn classify(remaining: f64) -> Self {
        if remaining >= 0.0 {
            GoalStatus::Under
        } else {
            GoalStatus::Over
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GoalStatus::Under => "Under Goal",
            GoalStatus::Over => "Over Goal",
        }
    }
}

/// The persisted per-day record, one per DateKey
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DailySummaryRecord {
    pub date: DateKey,
    pub total_calories: f64,
    pub goal_limit: f64,
    pub remaining: f64,
    pub status: GoalStatus,
    pub display_text: String,
}

impl DailySummaryRecord {
    /// Grade a day's total against a goal limit.
    ///
    /// Values are rounded to hundredths first, so the stored total, the
    /// status and the display text all agree on the same number.
    pub fn compute(date: DateKey, total_calories: f64, goal_limit: f64) -> Self {
        let total_calories = round_calories(total_calories);
        let goal_limit = round_calories(goal_limit);
        let remaining = round_calories(goal_limit - total_calories);
        let status = GoalStatus::classify(remaining);
        let display_text = format!("{} ({})", status.label(), format_signed(remaining, status));

        Self {
            date,
            total_calories,
            goal_limit,
            remaining,
            status,
            display_text,
        }
    }
}

impl fmt::Display for DailySummaryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {} / {} kcal  {}",
            self.date,
            format_calories(self.total_calories),
            format_calories(self.goal_limit),
            self.display_text
        )
    }
}

/// Render a calorie amount with at most two decimals and no trailing zeros
pub fn format_calories(value: f64) -> String {
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Round to hundredths of a calorie; negative zero becomes zero
pub fn round_calories(value: f64) -> f64 {
    (value * 100.0).round() / 100.0 + 0.0
}

// The sign follows the status so the text never contradicts it
fn format_signed(remaining: f64, status: GoalStatus) -> String {
    match status {
        GoalStatus::Under => format!("+{}", format_calories(remaining)),
        GoalStatus::Over => format!("-{}", format_calories(-remaining)),
    }
}
