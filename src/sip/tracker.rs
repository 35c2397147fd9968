use chrono::NaiveDate;

use crate::{
    clock::SharedClock,
    db::models::{CupProfile, SipEvent},
    error::ValidationError,
    models::{DetectionResult, TrackerStats},
};

use super::{CupConverter, SipAggregator, DEFAULT_PROFILE_ID};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Day-scoped owner of today's running totals. Every public method first
/// rolls the counters over when the calendar day has changed.
pub struct SipTracker {
    aggregator: SipAggregator,
    converter: CupConverter,
    clock: SharedClock,
    total_sips_today: u32,
    total_ml_today: f64,
    sip_events_today: Vec<SipEvent>,
    last_reset_date: NaiveDate,
}

impl SipTracker {
    pub fn new(aggregator: SipAggregator, converter: CupConverter, clock: SharedClock) -> Self {
        let last_reset_date = clock.today();
        Self {
            aggregator,
            converter,
            clock,
            total_sips_today: 0,
            total_ml_today: 0.0,
            sip_events_today: Vec::new(),
            last_reset_date,
        }
    }

    pub fn converter(&self) -> &CupConverter {
        &self.converter
    }

    pub fn set_default_profile(&mut self, profile: CupProfile) {
        self.converter.set_default_profile(profile);
    }

    pub fn process_detection(
        &mut self,
        detection: DetectionResult,
        profile: Option<&CupProfile>,
    ) -> Option<SipEvent> {
        self.check_daily_reset();

        let mut event = self.aggregator.process_detection(detection)?;
        if let Some(profile) = profile {
            event.profile_id = profile.id.unwrap_or(DEFAULT_PROFILE_ID);
        }
        if event.ml_estimate <= 0.0 {
            event.ml_estimate = self.converter.estimate_sip_ml(&event, profile);
        }

        self.record(event.clone());
        Some(event)
    }

    pub fn add_manual_sip(
        &mut self,
        ml: f64,
        profile: Option<&CupProfile>,
    ) -> Result<SipEvent, ValidationError> {
        self.check_daily_reset();

        let profile_id = profile.and_then(|p| p.id).unwrap_or(DEFAULT_PROFILE_ID);
        let event = SipEvent::manual(self.clock.now(), profile_id, ml)?;
        log_info!("manual sip added: {:.1}ml", ml);

        self.record(event.clone());
        Ok(event)
    }

    pub fn get_daily_stats(&mut self) -> TrackerStats {
        self.check_daily_reset();

        TrackerStats {
            date: self.last_reset_date,
            total_sips: self.total_sips_today,
            total_ml: self.total_ml_today,
            total_cups: self.converter.ml_to_cups(self.total_ml_today, None),
            sip_events: self.sip_events_today.clone(),
        }
    }

    /// Sips per hour over the trailing window.
    pub fn get_sip_rate(&mut self, window_minutes: f64) -> f64 {
        self.check_daily_reset();

        if !(window_minutes > 0.0) {
            return 0.0;
        }
        // A window reaching past representable time covers all of today.
        let cutoff = chrono::Duration::try_milliseconds((window_minutes * 60_000.0) as i64)
            .and_then(|window| self.clock.now().checked_sub_signed(window));
        let recent = self
            .sip_events_today
            .iter()
            .filter(|event| cutoff.map_or(true, |cutoff| event.timestamp >= cutoff))
            .count();
        recent as f64 / (window_minutes / 60.0)
    }

    /// Manual zeroing, independent of the calendar rollover.
    pub fn reset_daily_stats(&mut self) {
        self.clear_today();
        self.last_reset_date = self.clock.today();
        log_info!("daily stats reset");
    }

    /// Drops any in-progress sip candidate without recording it.
    pub fn abandon_pending(&mut self) -> bool {
        self.aggregator.abandon()
    }

    pub fn total_sips_today(&self) -> u32 {
        self.total_sips_today
    }

    pub fn total_ml_today(&self) -> f64 {
        self.total_ml_today
    }

    fn record(&mut self, event: SipEvent) {
        self.total_sips_today += 1;
        self.total_ml_today += event.ml_estimate;
        self.sip_events_today.push(event);
    }

    fn check_daily_reset(&mut self) {
        let today = self.clock.today();
        if today > self.last_reset_date {
            log_info!(
                "day rolled over from {} to {}; resetting daily totals",
                self.last_reset_date,
                today
            );
            self.clear_today();
            self.last_reset_date = today;
        }
    }

    fn clear_today(&mut self) {
        self.total_sips_today = 0;
        self.total_ml_today = 0.0;
        self.sip_events_today.clear();
    }
}
