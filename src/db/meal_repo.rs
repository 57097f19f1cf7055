use chrono::{NaiveDate, NaiveTime};
use std::collections::BTreeSet;

use super::Database;
use crate::error::{Result, StoreError};
use crate::models::{Meal, MealType, DATE_FORMAT, TIME_FORMAT};

/// Record store for meals.
#[derive(Clone)]
pub struct MealRepository {
    db: Database,
}

#[derive(sqlx::FromRow)]
#[sqlx(rename_all = "camelCase")]
struct MealRow {
    id: String,
    date: String,
    time: String,
    meal_type: String,
    photo_uri: Option<String>,
    note: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<MealRow> for Meal {
    type Error = StoreError;

    fn try_from(row: MealRow) -> Result<Self> {
        let corrupt = |reason: String| StoreError::CorruptRow {
            id: row.id.clone(),
            reason,
        };

        let date = NaiveDate::parse_from_str(&row.date, DATE_FORMAT)
            .map_err(|e| corrupt(format!("date '{}': {}", row.date, e)))?;
        let time = NaiveTime::parse_from_str(&row.time, TIME_FORMAT)
            .map_err(|e| corrupt(format!("time '{}': {}", row.time, e)))?;
        let meal_type: MealType = row.meal_type.parse().map_err(corrupt)?;

        Ok(Meal {
            id: row.id,
            date,
            time,
            meal_type,
            photo_uri: row.photo_uri,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn hydrate(rows: Vec<MealRow>) -> Result<Vec<Meal>> {
    rows.into_iter().map(Meal::try_from).collect()
}

impl MealRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, meal: &Meal) -> Result<Meal> {
        let pool = self.db.pool().await?;

        sqlx::query(
            r#"
            INSERT INTO meals (id, date, time, mealType, photoUri, note, createdAt, updatedAt)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&meal.id)
        .bind(meal.date.format(DATE_FORMAT).to_string())
        .bind(meal.time.format(TIME_FORMAT).to_string())
        .bind(meal.meal_type.label())
        .bind(&meal.photo_uri)
        .bind(&meal.note)
        .bind(meal.created_at)
        .bind(meal.updated_at)
        .execute(pool)
        .await?;

        tracing::debug!(id = %meal.id, date = %meal.date, "Inserted meal");

        self.get_by_id(&meal.id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Meal>> {
        let pool = self.db.pool().await?;

        let row: Option<MealRow> = sqlx::query_as("SELECT * FROM meals WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        row.map(Meal::try_from).transpose()
    }

    /// All meals, most recent first.
    pub async fn list(&self) -> Result<Vec<Meal>> {
        let pool = self.db.pool().await?;

        let rows: Vec<MealRow> =
            sqlx::query_as("SELECT * FROM meals ORDER BY date DESC, time DESC")
                .fetch_all(pool)
                .await?;

        hydrate(rows)
    }

    /// Meals of one day in chronological order.
    pub async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Meal>> {
        let pool = self.db.pool().await?;

        let rows: Vec<MealRow> =
            sqlx::query_as("SELECT * FROM meals WHERE date = ? ORDER BY time ASC")
                .bind(date.format(DATE_FORMAT).to_string())
                .fetch_all(pool)
                .await?;

        hydrate(rows)
    }

    /// Overwrites the mutable fields of the row with `meal.id`.
    ///
    /// Last write wins by `updatedAt`: a row that already carries a newer
    /// `updatedAt` is left alone. Returns whether a row was written, so an
    /// unknown id and a stale write both come back as `Ok(false)`.
    pub async fn update(&self, meal: &Meal) -> Result<bool> {
        let pool = self.db.pool().await?;

        let result = sqlx::query(
            r#"
            UPDATE meals
            SET date = ?, time = ?, mealType = ?, photoUri = ?, note = ?, updatedAt = ?
            WHERE id = ? AND updatedAt <= ?
            "#,
        )
        .bind(meal.date.format(DATE_FORMAT).to_string())
        .bind(meal.time.format(TIME_FORMAT).to_string())
        .bind(meal.meal_type.label())
        .bind(&meal.photo_uri)
        .bind(&meal.note)
        .bind(meal.updated_at)
        .bind(&meal.id)
        .bind(meal.updated_at)
        .execute(pool)
        .await?;

        let written = result.rows_affected() > 0;
        tracing::debug!(id = %meal.id, written, "Updated meal");
        Ok(written)
    }

    /// Removes the row; an unknown id is not an error.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let pool = self.db.pool().await?;

        let result = sqlx::query("DELETE FROM meals WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        tracing::debug!(id, deleted, "Deleted meal");
        Ok(deleted)
    }

    /// Dates that have at least one meal.
    pub async fn distinct_dates(&self) -> Result<BTreeSet<NaiveDate>> {
        let pool = self.db.pool().await?;

        let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT date FROM meals")
            .fetch_all(pool)
            .await?;

        rows.into_iter()
            .map(|(date,)| {
                NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|e| StoreError::CorruptRow {
                    id: String::new(),
                    reason: format!("date '{}': {}", date, e),
                })
            })
            .collect()
    }

    pub async fn count(&self) -> Result<i64> {
        let pool = self.db.pool().await?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM meals")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}
