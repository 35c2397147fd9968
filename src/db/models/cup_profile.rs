//! Cup profiles: the conversion basis between sips, milliliters and cups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_PROFILE_NAME: &str = "Default";
pub const DEFAULT_CUP_SIZE_ML: u32 = 250;
pub const DEFAULT_SIPS_PER_CUP: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CupProfile {
    pub id: Option<i64>,
    pub name: String,
    pub size_ml: u32,
    pub sips_per_cup: u32,
    pub color: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CupProfile {
    /// Builds a validated, not yet persisted profile.
    pub fn new(
        name: impl Into<String>,
        size_ml: u32,
        sips_per_cup: u32,
        color: Option<String>,
    ) -> Result<Self, ValidationError> {
        let now = Utc::now();
        let profile = Self {
            id: None,
            name: name.into(),
            size_ml,
            sips_per_cup,
            color,
            is_default: false,
            created_at: now,
            updated_at: now,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Fallback profile used whenever a caller has none: 250 ml, 10 sips.
    pub fn default_profile() -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: DEFAULT_PROFILE_NAME.into(),
            size_ml: DEFAULT_CUP_SIZE_ML,
            sips_per_cup: DEFAULT_SIPS_PER_CUP,
            color: None,
            is_default: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let name_len = self.name.chars().count();
        if !(1..=50).contains(&name_len) {
            return Err(ValidationError::ProfileName(name_len));
        }
        if !(1..=2000).contains(&self.size_ml) {
            return Err(ValidationError::CupSize(self.size_ml));
        }
        if !(1..=100).contains(&self.sips_per_cup) {
            return Err(ValidationError::SipsPerCup(self.sips_per_cup));
        }
        if let Some(color) = &self.color {
            if !is_hex_color(color) {
                return Err(ValidationError::Color(color.clone()));
            }
        }
        Ok(())
    }

    pub fn ml_per_sip(&self) -> f64 {
        f64::from(self.size_ml) / f64::from(self.sips_per_cup)
    }
}

fn is_hex_color(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 7 && bytes[0] == b'#' && bytes[1..].iter().all(u8::is_ascii_hexdigit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_profile() {
        let profile = CupProfile::new("Bottle", 750, 25, Some("#1a2B3c".into())).unwrap();
        assert_eq!(profile.size_ml, 750);
        assert!(!profile.is_default);
        assert!((profile.ml_per_sip() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert_eq!(
            CupProfile::new("", 250, 10, None).unwrap_err(),
            ValidationError::ProfileName(0)
        );
        assert_eq!(
            CupProfile::new("x".repeat(51), 250, 10, None).unwrap_err(),
            ValidationError::ProfileName(51)
        );
        assert_eq!(
            CupProfile::new("Mug", 0, 10, None).unwrap_err(),
            ValidationError::CupSize(0)
        );
        assert_eq!(
            CupProfile::new("Mug", 2001, 10, None).unwrap_err(),
            ValidationError::CupSize(2001)
        );
        assert_eq!(
            CupProfile::new("Mug", 250, 101, None).unwrap_err(),
            ValidationError::SipsPerCup(101)
        );
        assert!(matches!(
            CupProfile::new("Mug", 250, 10, Some("red".into())),
            Err(ValidationError::Color(_))
        ));
    }

    #[test]
    fn default_profile_is_250ml_10_sips() {
        let profile = CupProfile::default_profile();
        assert_eq!(profile.name, "Default");
        assert_eq!(profile.size_ml, 250);
        assert_eq!(profile.sips_per_cup, 10);
        assert!(profile.is_default);
        assert!(profile.validate().is_ok());
    }
}
