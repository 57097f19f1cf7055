use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Meal-of-day category. Persisted by its Korean label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MealType {
    #[serde(rename = "아침")]
    Breakfast,
    #[serde(rename = "점심")]
    Lunch,
    #[serde(rename = "저녁")]
    Dinner,
    #[serde(rename = "간식")]
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    /// Stored label
    pub fn label(&self) -> &'static str {
        match self {
            MealType::Breakfast => "아침",
            MealType::Lunch => "점심",
            MealType::Dinner => "저녁",
            MealType::Snack => "간식",
        }
    }

    /// Display color used to tag the meal in calendar and list views.
    pub fn color(&self) -> &'static str {
        match self {
            MealType::Breakfast => "#3b82f6",
            MealType::Lunch => "#22c55e",
            MealType::Dinner => "#a855f7",
            MealType::Snack => "#f97316",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "아침" | "breakfast" => Ok(MealType::Breakfast),
            "점심" | "lunch" => Ok(MealType::Lunch),
            "저녁" | "dinner" => Ok(MealType::Dinner),
            "간식" | "snack" => Ok(MealType::Snack),
            _ => Err(format!(
                "Invalid meal type '{}'. Valid options: 아침 (breakfast), 점심 (lunch), 저녁 (dinner), 간식 (snack)",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_type_display() {
        assert_eq!(format!("{}", MealType::Breakfast), "아침");
        assert_eq!(format!("{}", MealType::Lunch), "점심");
        assert_eq!(format!("{}", MealType::Dinner), "저녁");
        assert_eq!(format!("{}", MealType::Snack), "간식");
    }

    #[test]
    fn test_meal_type_from_str() {
        assert_eq!(MealType::from_str("아침").unwrap(), MealType::Breakfast);
        assert_eq!(MealType::from_str("LUNCH").unwrap(), MealType::Lunch);
        assert_eq!(MealType::from_str("Dinner").unwrap(), MealType::Dinner);
        assert_eq!(MealType::from_str(" 간식 ").unwrap(), MealType::Snack);
    }

    #[test]
    fn test_meal_type_from_str_invalid() {
        assert!(MealType::from_str("brunch").is_err());
        assert!(MealType::from_str("").is_err());
    }

    #[test]
    fn test_label_parses_back() {
        for meal_type in MealType::ALL {
            assert_eq!(meal_type.label().parse::<MealType>().unwrap(), meal_type);
        }
    }

    #[test]
    fn test_colors_are_distinct() {
        let colors: std::collections::HashSet<_> =
            MealType::ALL.iter().map(|t| t.color()).collect();
        assert_eq!(colors.len(), 4);
    }

    #[test]
    fn test_meal_type_json_uses_label() {
        let json = serde_json::to_string(&MealType::Breakfast).unwrap();
        assert_eq!(json, "\"아침\"");

        let parsed: MealType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, MealType::Breakfast);
    }
}
