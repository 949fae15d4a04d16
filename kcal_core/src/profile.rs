//! Biometric profile loading.
//!
//! The profile collection is a two-column `field,value` table. Values are
//! decoded once here into typed selections, so the calculator never sees
//! dropdown labels like `"1.55 - Moderately active"`.

use crate::store::TabularStore;
use crate::{ActivityLevel, BiometricProfile, Error, GoalAdjustment, Result, Sex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Header of the profile collection
pub const PROFILE_HEADER: [&str; 2] = ["field", "value"];

/// Named fields of the profile collection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Sex,
    WeightKg,
    HeightCm,
    AgeYears,
    ActivityFactor,
    GoalOffset,
}

impl ProfileField {
    pub const ALL: [ProfileField; 6] = [
        ProfileField::Sex,
        ProfileField::WeightKg,
        ProfileField::HeightCm,
        ProfileField::AgeYears,
        ProfileField::ActivityFactor,
        ProfileField::GoalOffset,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProfileField::Sex => "sex",
            ProfileField::WeightKg => "weight_kg",
            ProfileField::HeightCm => "height_cm",
            ProfileField::AgeYears => "age_years",
            ProfileField::ActivityFactor => "activity_factor",
            ProfileField::GoalOffset => "goal_offset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Undecoded profile cells, `None` where the cell is absent or blank
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawProfile {
    pub sex: Option<String>,
    pub weight_kg: Option<String>,
    pub height_cm: Option<String>,
    pub age_years: Option<String>,
    pub activity_factor: Option<String>,
    pub goal_offset: Option<String>,
}

impl TryFrom<RawProfile> for BiometricProfile {
    type Error = Error;

    fn try_from(raw: RawProfile) -> Result<Self> {
        let sex = parse_sex(required(&raw.sex, ProfileField::Sex)?)?;
        let weight_kg = parse_positive(required(&raw.weight_kg, ProfileField::WeightKg)?, ProfileField::WeightKg)?;
        let height_cm = parse_positive(required(&raw.height_cm, ProfileField::HeightCm)?, ProfileField::HeightCm)?;
        let age_years = parse_age(required(&raw.age_years, ProfileField::AgeYears)?)?;
        let activity = parse_activity(required(&raw.activity_factor, ProfileField::ActivityFactor)?)?;
        let goal = match raw.goal_offset.as_deref() {
            Some(value) => parse_goal(value)?,
            None => GoalAdjustment::Maintain,
        };

        Ok(BiometricProfile {
            sex,
            weight_kg,
            height_cm,
            age_years,
            activity,
            goal,
        })
    }
}

/// Read the raw profile cells from the store
pub fn read_raw_profile(store: &dyn TabularStore, collection: &str) -> Result<RawProfile> {
    let names: Vec<&str> = ProfileField::ALL.iter().map(|f| f.as_str()).collect();
    let mut values = store.read_fields(collection, &names)?.into_iter();
    let mut next = || values.next().flatten();

    Ok(RawProfile {
        sex: next(),
        weight_kg: next(),
        height_cm: next(),
        age_years: next(),
        activity_factor: next(),
        goal_offset: next(),
    })
}

/// Read and decode the biometric profile
pub fn load_profile(store: &dyn TabularStore, collection: &str) -> Result<BiometricProfile> {
    let raw = read_raw_profile(store, collection)?;
    let profile = BiometricProfile::try_from(raw)?;
    tracing::debug!(?profile, "Loaded profile");
    Ok(profile)
}

/// Set profile fields, updating rows in place and appending new ones.
///
/// Writes are buffered by the store; the caller commits.
pub fn write_profile_fields(
    store: &mut dyn TabularStore,
    collection: &str,
    updates: &[(ProfileField, String)],
) -> Result<()> {
    let rows = store.read_all(collection)?;

    for (field, value) in updates {
        let existing = rows
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, row)| row.first().map(|f| f.trim()) == Some(field.as_str()))
            .map(|(index, _)| index);

        let values = vec![field.as_str().to_string(), value.clone()];
        match existing {
            Some(index) => store.write_row(collection, index, values)?,
            None => store.append_row(collection, values)?,
        }
        tracing::info!("Set profile field {} = {}", field, value);
    }
    Ok(())
}

fn required(value: &Option<String>, field: ProfileField) -> Result<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidProfile(format!("{} is missing", field)))
}

/// Case-insensitive; accepts `m`/`f`
pub fn parse_sex(s: &str) -> Result<Sex> {
    match s.trim().to_lowercase().as_str() {
        "male" | "m" => Ok(Sex::Male),
        "female" | "f" => Ok(Sex::Female),
        other => Err(Error::InvalidProfile(format!("unrecognized sex: {}", other))),
    }
}

/// Plain number, or the numeric prefix of a label like `"1.55 - Moderately active"`
pub fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Ok(value) = s.parse::<f64>() {
        return Some(value).filter(|v| v.is_finite());
    }

    let token: String = s
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')))
        .map(|(_, c)| c)
        .collect();
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_activity(s: &str) -> Result<ActivityLevel> {
    let factor = leading_number(s).ok_or_else(|| {
        Error::InvalidProfile(format!("activity_factor has no numeric value: {}", s))
    })?;
    ActivityLevel::from_factor(factor).ok_or_else(|| {
        Error::InvalidProfile(format!("unsupported activity_factor: {}", factor))
    })
}

pub fn parse_goal(s: &str) -> Result<GoalAdjustment> {
    let offset = leading_number(s)
        .ok_or_else(|| Error::InvalidProfile(format!("goal_offset has no numeric value: {}", s)))?;
    if offset.fract() != 0.0 {
        return Err(Error::InvalidProfile(format!("unsupported goal_offset: {}", offset)));
    }
    GoalAdjustment::from_offset(offset as i32)
        .ok_or_else(|| Error::InvalidProfile(format!("unsupported goal_offset: {}", offset)))
}

fn parse_positive(s: &str, field: ProfileField) -> Result<f64> {
    match leading_number(s) {
        Some(value) if value > 0.0 => Ok(value),
        Some(value) => Err(Error::InvalidProfile(format!(
            "{} must be positive, got {}",
            field, value
        ))),
        None => Err(Error::InvalidProfile(format!("{} is not a number: {}", field, s))),
    }
}

fn parse_age(s: &str) -> Result<u32> {
    let age = parse_positive(s, ProfileField::AgeYears)?;
    if age.fract() != 0.0 || age > f64::from(u32::MAX) {
        return Err(Error::InvalidProfile(format!(
            "age_years must be a whole number, got {}",
            age
        )));
    }
    Ok(age as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store_with(fields: &[(&str, &str)]) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.create_collection("profile", &PROFILE_HEADER).unwrap();
        for (field, value) in fields {
            store
                .append_row("profile", vec![field.to_string(), value.to_string()])
                .unwrap();
        }
        store
    }

    fn reference_fields() -> Vec<(&'static str, &'static str)> {
        vec![
            ("sex", "Male"),
            ("weight_kg", "70"),
            ("height_cm", "175"),
            ("age_years", "30"),
            ("activity_factor", "1.55 - Moderately active"),
            ("goal_offset", "-500 (Lose 0.5 kg/week)"),
        ]
    }

    #[test]
    fn test_load_profile_decodes_labels() {
        let store = store_with(&reference_fields());
        let profile = load_profile(&store, "profile").unwrap();

        assert_eq!(profile.sex, Sex::Male);
        assert_eq!(profile.weight_kg, 70.0);
        assert_eq!(profile.age_years, 30);
        assert_eq!(profile.activity, ActivityLevel::Moderate);
        assert_eq!(profile.goal, GoalAdjustment::Lose);
    }

    #[test]
    fn test_plain_numbers_accepted() {
        assert_eq!(parse_activity("1.9").unwrap(), ActivityLevel::VeryActive);
        assert_eq!(parse_goal("+500").unwrap(), GoalAdjustment::Gain);
        assert_eq!(parse_goal("0").unwrap(), GoalAdjustment::Maintain);
        assert_eq!(parse_goal("-500").unwrap(), GoalAdjustment::Lose);
    }

    #[test]
    fn test_labels_without_number_rejected() {
        assert!(matches!(parse_activity("Moderately active"), Err(Error::InvalidProfile(_))));
        assert!(matches!(parse_goal("Lose weight"), Err(Error::InvalidProfile(_))));
        assert!(matches!(parse_activity("1.6 - Custom"), Err(Error::InvalidProfile(_))));
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("1.375 - Lightly active"), Some(1.375));
        assert_eq!(leading_number("-500(Lose)"), Some(-500.0));
        assert_eq!(leading_number("  2.5  "), Some(2.5));
        assert_eq!(leading_number("abc"), None);
        assert_eq!(leading_number("-"), None);
    }

    #[test]
    fn test_parse_sex_variants() {
        assert_eq!(parse_sex("MALE").unwrap(), Sex::Male);
        assert_eq!(parse_sex("m").unwrap(), Sex::Male);
        assert_eq!(parse_sex("Female").unwrap(), Sex::Female);
        assert_eq!(parse_sex(" F ").unwrap(), Sex::Female);
        assert!(parse_sex("x").is_err());
    }

    #[test]
    fn test_missing_and_invalid_fields() {
        let mut fields = reference_fields();
        fields.retain(|(f, _)| *f != "weight_kg");
        let store = store_with(&fields);
        assert!(matches!(load_profile(&store, "profile"), Err(Error::InvalidProfile(_))));

        let mut fields = reference_fields();
        fields[3] = ("age_years", "-3");
        let store = store_with(&fields);
        assert!(matches!(load_profile(&store, "profile"), Err(Error::InvalidProfile(_))));

        let mut fields = reference_fields();
        fields[2] = ("height_cm", "tall");
        let store = store_with(&fields);
        assert!(matches!(load_profile(&store, "profile"), Err(Error::InvalidProfile(_))));
    }

    #[test]
    fn test_missing_goal_offset_defaults_to_maintain() {
        let mut fields = reference_fields();
        fields.pop();
        let store = store_with(&fields);
        let profile = load_profile(&store, "profile").unwrap();
        assert_eq!(profile.goal, GoalAdjustment::Maintain);
    }

    #[test]
    fn test_missing_profile_collection() {
        let store = MemoryStore::new();
        assert!(matches!(
            load_profile(&store, "profile"),
            Err(Error::MissingCollection(_))
        ));
    }

    #[test]
    fn test_write_profile_fields_updates_in_place() {
        let mut store = store_with(&reference_fields());
        write_profile_fields(
            &mut store,
            "profile",
            &[(ProfileField::WeightKg, "72.5".into())],
        )
        .unwrap();

        let rows = store.read_all("profile").unwrap();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[2], vec!["weight_kg".to_string(), "72.5".to_string()]);

        let mut store = store_with(&[]);
        write_profile_fields(&mut store, "profile", &[(ProfileField::Sex, "f".into())]).unwrap();
        assert_eq!(store.read_all("profile").unwrap().len(), 2);
    }

    #[test]
    fn test_profile_field_parse() {
        assert_eq!(ProfileField::parse("Weight_Kg"), Some(ProfileField::WeightKg));
        assert_eq!(ProfileField::parse("notes"), None);
    }
}
