//! Pill models
//!
//! Rust structs representing the persisted pill list.
//! All models use serde; the JSON field names are the on-disk format.

use crate::config;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Colour tag shown next to a pill. Unknown tags read back as blue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum PillColor {
    #[default]
    Blue,
    Red,
    Green,
    Orange,
    Purple,
    Pink,
}

impl PillColor {
    pub const ALL: [PillColor; 6] = [
        PillColor::Blue,
        PillColor::Red,
        PillColor::Green,
        PillColor::Orange,
        PillColor::Purple,
        PillColor::Pink,
    ];

    /// Case-insensitive lookup, falling back to blue
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "blue" => PillColor::Blue,
            "red" => PillColor::Red,
            "green" => PillColor::Green,
            "orange" => PillColor::Orange,
            "purple" => PillColor::Purple,
            "pink" => PillColor::Pink,
            _ => PillColor::Blue,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PillColor::Blue => "blue",
            PillColor::Red => "red",
            PillColor::Green => "green",
            PillColor::Orange => "orange",
            PillColor::Purple => "purple",
            PillColor::Pink => "pink",
        }
    }

    /// Strong colour for the pill badge
    pub fn hex(&self) -> &'static str {
        match self {
            PillColor::Blue => "#2563EB",
            PillColor::Red => "#EF4444",
            PillColor::Green => "#10B981",
            PillColor::Orange => "#F59E0B",
            PillColor::Purple => "#8B5CF6",
            PillColor::Pink => "#EC4899",
        }
    }

    /// Light tint for the card background
    pub fn light_hex(&self) -> &'static str {
        match self {
            PillColor::Blue => "#DBEAFE",
            PillColor::Red => "#FEE2E2",
            PillColor::Green => "#D1FAE5",
            PillColor::Orange => "#FED7AA",
            PillColor::Purple => "#E9D5FF",
            PillColor::Pink => "#FCE7F3",
        }
    }
}

impl From<String> for PillColor {
    fn from(tag: String) -> Self {
        PillColor::from_tag(&tag)
    }
}

impl std::fmt::Display for PillColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pill with its daily reminder time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pill {
    /// Assigned once at creation, never reused
    pub id: i64,
    pub name: String,
    pub dosage: String,
    /// Free-form time as typed ("8:00 AM"); also the scheduling source
    pub time: String,
    pub color: PillColor,
    pub taken: bool,
}

/// Create pill request
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePillRequest {
    /// Keeps a caller-provided id when it is not already in use
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub dosage: String,
    pub time: String,
    #[serde(default)]
    pub color: PillColor,
    #[serde(default)]
    pub taken: bool,
}

impl CreatePillRequest {
    pub fn new(
        name: impl Into<String>,
        dosage: impl Into<String>,
        time: impl Into<String>,
        color: PillColor,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            dosage: dosage.into(),
            time: time.into(),
            color,
            taken: false,
        }
    }

    /// Form validation for the add-pill dialog: every field is required.
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.name, &self.dosage, &self.time)
    }
}

/// Update pill request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePillRequest {
    pub id: i64,
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub time: Option<String>,
    pub color: Option<PillColor>,
}

impl UpdatePillRequest {
    /// Apply the changed fields to `pill`, keeping its id and taken flag
    pub fn apply_to(&self, pill: &Pill) -> Result<Pill> {
        let updated = Pill {
            id: pill.id,
            name: self.name.clone().unwrap_or_else(|| pill.name.clone()),
            dosage: self.dosage.clone().unwrap_or_else(|| pill.dosage.clone()),
            time: self.time.clone().unwrap_or_else(|| pill.time.clone()),
            color: self.color.unwrap_or(pill.color),
            taken: pill.taken,
        };
        validate_fields(&updated.name, &updated.dosage, &updated.time)?;
        Ok(updated)
    }

    /// Whether applying this request can move the pill's reminder
    pub fn changes_schedule(&self) -> bool {
        self.time.is_some() || self.name.is_some() || self.dosage.is_some()
    }
}

fn validate_fields(name: &str, dosage: &str, time: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Pill name is required".to_string()));
    }
    if dosage.trim().is_empty() {
        return Err(AppError::Validation("Dosage is required".to_string()));
    }
    if time.trim().is_empty() {
        return Err(AppError::Validation("Time is required".to_string()));
    }
    if name.chars().count() > config::MAX_PILL_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Pill name must be at most {} characters",
            config::MAX_PILL_NAME_LENGTH
        )));
    }
    if dosage.chars().count() > config::MAX_DOSAGE_LENGTH {
        return Err(AppError::Validation(format!(
            "Dosage must be at most {} characters",
            config::MAX_DOSAGE_LENGTH
        )));
    }
    Ok(())
}

/// Taken/remaining counters for the daily list header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PillSummary {
    pub total: usize,
    pub taken: usize,
    pub remaining: usize,
}

impl PillSummary {
    pub fn from_pills(pills: &[Pill]) -> Self {
        let taken = pills.iter().filter(|p| p.taken).count();
        Self {
            total: pills.len(),
            taken,
            remaining: pills.len() - taken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pill() -> Pill {
        Pill {
            id: 42,
            name: "Vitamin D".to_string(),
            dosage: "1000 IU".to_string(),
            time: "8:00 AM".to_string(),
            color: PillColor::Blue,
            taken: false,
        }
    }

    #[test]
    fn test_pill_json_field_names() {
        let json = serde_json::to_value(pill()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 42,
                "name": "Vitamin D",
                "dosage": "1000 IU",
                "time": "8:00 AM",
                "color": "blue",
                "taken": false
            })
        );
    }

    #[test]
    fn test_unknown_color_falls_back_to_blue() {
        let json = r#"{"id":1,"name":"A","dosage":"1","time":"8:00","color":"teal","taken":true}"#;
        let pill: Pill = serde_json::from_str(json).unwrap();
        assert_eq!(pill.color, PillColor::Blue);

        assert_eq!(PillColor::from_tag("PURPLE"), PillColor::Purple);
        assert_eq!(PillColor::from_tag(""), PillColor::Blue);
    }

    #[test]
    fn test_every_color_round_trips_by_name() {
        for color in PillColor::ALL {
            assert_eq!(PillColor::from_tag(color.as_str()), color);
            assert!(color.hex().starts_with('#'));
            assert!(color.light_hex().starts_with('#'));
        }
    }

    #[test]
    fn test_create_request_validation() {
        let ok = CreatePillRequest::new("Aspirin", "81mg", "9:00 PM", PillColor::Red);
        assert!(ok.validate().is_ok());

        let missing_name = CreatePillRequest::new("  ", "81mg", "9:00 PM", PillColor::Red);
        assert!(matches!(missing_name.validate(), Err(AppError::Validation(_))));

        let missing_time = CreatePillRequest::new("Aspirin", "81mg", "", PillColor::Red);
        assert!(matches!(missing_time.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_update_request_keeps_id_and_taken() {
        let mut original = pill();
        original.taken = true;

        let req = UpdatePillRequest {
            id: original.id,
            time: Some("9:30 AM".to_string()),
            color: Some(PillColor::Pink),
            ..Default::default()
        };
        let updated = req.apply_to(&original).unwrap();

        assert_eq!(updated.id, original.id);
        assert!(updated.taken);
        assert_eq!(updated.time, "9:30 AM");
        assert_eq!(updated.color, PillColor::Pink);
        assert_eq!(updated.name, original.name);
        assert!(req.changes_schedule());
    }

    #[test]
    fn test_summary_counts() {
        let mut taken = pill();
        taken.taken = true;
        let summary = PillSummary::from_pills(&[pill(), taken, pill()]);
        assert_eq!(summary, PillSummary { total: 3, taken: 1, remaining: 2 });
    }
}
