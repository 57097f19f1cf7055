use chrono::{NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::meal_type::MealType;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// One diary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: String,
    pub date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub time: NaiveTime,
    pub meal_type: MealType,
    /// Durable reference into the photo store, never a picker location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Meal {
    pub fn new(date: NaiveDate, time: NaiveTime, meal_type: MealType) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            date,
            time: truncate_to_minute(time),
            meal_type,
            photo_uri: None,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_note(mut self, note: impl AsRef<str>) -> Self {
        self.note = normalize_note(Some(note.as_ref()));
        self
    }

    pub fn with_photo_uri(mut self, photo_uri: impl Into<String>) -> Self {
        self.photo_uri = Some(photo_uri.into());
        self
    }
}

impl fmt::Display for Meal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.date.format(DATE_FORMAT), self.time.format(TIME_FORMAT))?;
        writeln!(f, "Meal: {}", self.meal_type)?;
        if let Some(photo) = &self.photo_uri {
            writeln!(f, "Photo: {}", photo)?;
        }
        if let Some(note) = &self.note {
            writeln!(f, "Note: {}", note)?;
        }
        Ok(())
    }
}

/// Unique id used for meals and photo file names alike.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Drop seconds so the stored `HH:mm` form round-trips.
pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Trimmed note, or `None` when nothing is left.
pub fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIME_FORMAT;

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&time.format(TIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    #[test]
    fn test_meal_new() {
        let time = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        let meal = Meal::new(date(), time, MealType::Breakfast);

        assert_eq!(meal.date, date());
        assert_eq!(meal.time, time);
        assert_eq!(meal.meal_type, MealType::Breakfast);
        assert!(meal.photo_uri.is_none());
        assert!(meal.note.is_none());
        assert_eq!(meal.created_at, meal.updated_at);
        assert_eq!(meal.id.len(), 32);
    }

    #[test]
    fn test_meal_new_truncates_seconds() {
        let time = NaiveTime::from_hms_milli_opt(12, 5, 42, 300).unwrap();
        let meal = Meal::new(date(), time, MealType::Lunch);
        assert_eq!(meal.time, NaiveTime::from_hms_opt(12, 5, 0).unwrap());
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..100).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_with_note_normalizes_blank() {
        let time = NaiveTime::from_hms_opt(19, 0, 0).unwrap();
        let meal = Meal::new(date(), time, MealType::Dinner).with_note("   ");
        assert!(meal.note.is_none());

        let meal = meal.with_note("  오트밀 ");
        assert_eq!(meal.note.as_deref(), Some("오트밀"));
    }

    #[test]
    fn test_normalize_note() {
        assert_eq!(normalize_note(None), None);
        assert_eq!(normalize_note(Some("")), None);
        assert_eq!(normalize_note(Some("\n\t ")), None);
        assert_eq!(normalize_note(Some(" salad")), Some("salad".to_string()));
    }

    #[test]
    fn test_meal_display() {
        let time = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        let meal = Meal::new(date(), time, MealType::Breakfast).with_note("오트밀");

        let output = format!("{}", meal);
        assert!(output.contains("2024-03-10 08:30"));
        assert!(output.contains("아침"));
        assert!(output.contains("오트밀"));
    }

    #[test]
    fn test_meal_json_shape() {
        let time = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        let meal = Meal::new(date(), time, MealType::Breakfast);

        let json: serde_json::Value = serde_json::to_value(&meal).unwrap();
        assert_eq!(json["date"], "2024-03-10");
        assert_eq!(json["time"], "08:30");
        assert_eq!(json["mealType"], "아침");
        assert!(json.get("photoUri").is_none());

        let parsed: Meal = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, meal);
    }
}
