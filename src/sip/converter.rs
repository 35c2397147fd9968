use crate::db::models::{CupProfile, SipEvent};

/// Sip, milliliter and cup conversions against a cup profile. Calls without
/// a profile use the converter's default.
#[derive(Debug, Clone)]
pub struct CupConverter {
    default_profile: CupProfile,
}

impl Default for CupConverter {
    fn default() -> Self {
        Self::new(CupProfile::default_profile())
    }
}

impl CupConverter {
    pub fn new(default_profile: CupProfile) -> Self {
        Self { default_profile }
    }

    pub fn default_profile(&self) -> &CupProfile {
        &self.default_profile
    }

    pub fn set_default_profile(&mut self, profile: CupProfile) {
        self.default_profile = profile;
    }

    pub fn sips_to_cups(&self, sips: u32, profile: Option<&CupProfile>) -> f64 {
        let profile = self.resolve(profile);
        f64::from(sips) / f64::from(profile.sips_per_cup.max(1))
    }

    pub fn ml_to_cups(&self, ml: f64, profile: Option<&CupProfile>) -> f64 {
        let profile = self.resolve(profile);
        ml / f64::from(profile.size_ml.max(1))
    }

    pub fn cups_to_ml(&self, cups: f64, profile: Option<&CupProfile>) -> f64 {
        cups * f64::from(self.resolve(profile).size_ml.max(1))
    }

    /// The event's own estimate when positive, otherwise one profile sip.
    pub fn estimate_sip_ml(&self, event: &SipEvent, profile: Option<&CupProfile>) -> f64 {
        if event.ml_estimate > 0.0 {
            return event.ml_estimate;
        }
        let profile = self.resolve(profile);
        f64::from(profile.size_ml) / f64::from(profile.sips_per_cup.max(1))
    }

    fn resolve<'a>(&'a self, profile: Option<&'a CupProfile>) -> &'a CupProfile {
        profile.unwrap_or(&self.default_profile)
    }
}
