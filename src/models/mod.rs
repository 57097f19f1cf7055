mod meal;
mod meal_type;

pub use meal::{
    generate_id, normalize_note, now_millis, truncate_to_minute, Meal, DATE_FORMAT, TIME_FORMAT,
};
pub use meal_type::MealType;
