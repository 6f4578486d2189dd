//! Fasting windows and protocol presets.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::{self, MINUTES_PER_DAY};

/// Derived mode of a fasting habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FastingMode {
    Inactive,
    Fasting,
    Eating,
}

/// One fast→eat cycle.
///
/// `eating_transition_time` is written once, when the user starts eating.
/// `end_time` is written once, when the cycle is closed; after that the
/// window is history and never changes again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastingWindow {
    pub id: String,
    pub habit_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub eating_transition_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub target_minutes: u32,
}

impl FastingWindow {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Mode this window puts its habit in. Closed windows are `Inactive`.
    pub fn mode(&self) -> FastingMode {
        match (self.end_time, self.eating_transition_time) {
            (Some(_), _) => FastingMode::Inactive,
            (None, Some(_)) => FastingMode::Eating,
            (None, None) => FastingMode::Fasting,
        }
    }

    /// `eating_transition_time - start_time` in whole minutes, once known.
    pub fn fasting_duration_minutes(&self) -> Option<i64> {
        let eating = self.eating_transition_time?;
        time::elapsed(self.start_time, eating).map(|e| e.total_minutes())
    }

    /// Whether the completed fast reached its target.
    pub fn met_target(&self) -> bool {
        self.target_minutes > 0
            && self
                .fasting_duration_minutes()
                .is_some_and(|m| m >= i64::from(self.target_minutes))
    }
}

/// Common intermittent-fasting schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FastingProtocol {
    /// 16h fast, 8h eating window.
    SixteenEight,
    /// 18h fast, 6h eating window.
    EighteenSix,
    /// 20h fast, 4h eating window.
    TwentyFour,
    /// One meal a day: 23h fast.
    OneMealADay,
    Custom { fasting_minutes: u32 },
}

impl FastingProtocol {
    pub fn target_minutes(&self) -> u32 {
        match self {
            FastingProtocol::SixteenEight => 16 * 60,
            FastingProtocol::EighteenSix => 18 * 60,
            FastingProtocol::TwentyFour => 20 * 60,
            FastingProtocol::OneMealADay => 23 * 60,
            FastingProtocol::Custom { fasting_minutes } => *fasting_minutes,
        }
    }

    /// Length of the eating window that completes a 24h cycle.
    ///
    /// `None` for extended fasts of a day or longer.
    pub fn eating_minutes(&self) -> Option<u32> {
        eating_window_minutes(self.target_minutes())
    }
}

/// Eating window implied by a fasting target over a 24h cycle.
pub fn eating_window_minutes(target_minutes: u32) -> Option<u32> {
    let day = MINUTES_PER_DAY as u32;
    (target_minutes < day).then(|| day - target_minutes)
}

impl fmt::Display for FastingProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FastingProtocol::SixteenEight => f.write_str("16:8"),
            FastingProtocol::EighteenSix => f.write_str("18:6"),
            FastingProtocol::TwentyFour => f.write_str("20:4"),
            FastingProtocol::OneMealADay => f.write_str("omad"),
            FastingProtocol::Custom { fasting_minutes } => {
                write!(f, "{}m", fasting_minutes)
            }
        }
    }
}

impl FromStr for FastingProtocol {
    type Err = ValidationError;

    /// Accepts `16:8`, `18:6`, `20:4`, `omad`/`23:1`, any `H:H` pair summing
    /// to 24, or a bare minute count such as `900m`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| ValidationError::InvalidValue {
            field: "fasting_protocol".to_string(),
            message: format!("'{s}': {message}"),
        };

        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "16:8" => return Ok(FastingProtocol::SixteenEight),
            "18:6" => return Ok(FastingProtocol::EighteenSix),
            "20:4" => return Ok(FastingProtocol::TwentyFour),
            "omad" | "23:1" => return Ok(FastingProtocol::OneMealADay),
            _ => {}
        }

        if let Some(minutes) = normalized.strip_suffix('m') {
            let fasting_minutes: u32 = minutes
                .parse()
                .map_err(|_| invalid("expected a minute count"))?;
            if fasting_minutes == 0 {
                return Err(invalid("fasting target must be positive"));
            }
            return Ok(FastingProtocol::Custom { fasting_minutes });
        }

        let (fast, eat) = normalized
            .split_once(':')
            .ok_or_else(|| invalid("expected FAST:EAT hours"))?;
        let fast: u32 = fast.parse().map_err(|_| invalid("fasting hours"))?;
        let eat: u32 = eat.parse().map_err(|_| invalid("eating hours"))?;
        if fast == 0 || fast.checked_add(eat) != Some(24) {
            return Err(invalid("fasting and eating hours must sum to 24"));
        }
        Ok(FastingProtocol::Custom {
            fasting_minutes: fast * 60,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn window(eat_after_h: Option<i64>, closed: bool) -> FastingWindow {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap();
        let eating = eat_after_h.map(|h| start + Duration::hours(h));
        FastingWindow {
            id: "w1".into(),
            habit_id: "h1".into(),
            start_time: start,
            eating_transition_time: eating,
            end_time: closed.then(|| start + Duration::hours(24)),
            target_minutes: 16 * 60,
        }
    }

    #[test]
    fn mode_follows_transitions() {
        assert_eq!(window(None, false).mode(), FastingMode::Fasting);
        assert_eq!(window(Some(16), false).mode(), FastingMode::Eating);
        assert_eq!(window(Some(16), true).mode(), FastingMode::Inactive);
    }

    #[test]
    fn fasting_duration_ignores_eating_phase() {
        let w = window(Some(17), true);
        assert_eq!(w.fasting_duration_minutes(), Some(17 * 60));
        assert!(w.met_target());
        assert_eq!(window(None, false).fasting_duration_minutes(), None);
    }

    #[test]
    fn protocol_presets_parse() {
        assert_eq!("16:8".parse::<FastingProtocol>().unwrap().target_minutes(), 960);
        assert_eq!("OMAD".parse::<FastingProtocol>().unwrap(), FastingProtocol::OneMealADay);
        assert_eq!(
            "14:10".parse::<FastingProtocol>().unwrap(),
            FastingProtocol::Custom { fasting_minutes: 840 }
        );
        assert_eq!(
            "2160m".parse::<FastingProtocol>().unwrap().eating_minutes(),
            None
        );
    }

    #[test]
    fn protocol_rejects_malformed_input() {
        assert!("16:9".parse::<FastingProtocol>().is_err());
        assert!("sixteen".parse::<FastingProtocol>().is_err());
        assert!("0m".parse::<FastingProtocol>().is_err());
    }

    #[test]
    fn protocol_rejects_hours_that_overflow() {
        assert!("4294967295:1".parse::<FastingProtocol>().is_err());
        assert!("1:4294967295".parse::<FastingProtocol>().is_err());
    }

    #[test]
    fn protocol_display_round_trips() {
        for p in [
            FastingProtocol::SixteenEight,
            FastingProtocol::EighteenSix,
            FastingProtocol::TwentyFour,
            FastingProtocol::OneMealADay,
            FastingProtocol::Custom { fasting_minutes: 750 },
        ] {
            assert_eq!(p.to_string().parse::<FastingProtocol>().unwrap(), p);
        }
    }
}
