use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use super::OutputFormat;
use crate::error::StoreError;
use crate::models::{Meal, MealType, DATE_FORMAT, TIME_FORMAT};
use crate::service::{MealDraft, MealService, PhotoChange};

#[derive(Args)]
pub struct MealCommand {
    #[command(subcommand)]
    pub command: MealSubcommand,
}

#[derive(Subcommand)]
pub enum MealSubcommand {
    /// Record a meal
    Add {
        /// Meal type (아침/breakfast, 점심/lunch, 저녁/dinner, 간식/snack)
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        meal_type: String,

        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Time (HH:MM), defaults to now
        #[arg(long)]
        time: Option<String>,

        /// Image to copy into the diary
        #[arg(long, short)]
        photo: Option<PathBuf>,

        /// Free-text note
        #[arg(long)]
        note: Option<String>,
    },

    /// Change a recorded meal
    Edit {
        /// Meal ID
        id: String,

        /// Meal type
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        meal_type: Option<String>,

        /// Date (YYYY-MM-DD)
        #[arg(long, short)]
        date: Option<String>,

        /// Time (HH:MM)
        #[arg(long)]
        time: Option<String>,

        /// Replace the photo with this image
        #[arg(long, short, conflicts_with = "remove_photo")]
        photo: Option<PathBuf>,

        /// Remove the photo
        #[arg(long)]
        remove_photo: bool,

        /// New note (empty clears it)
        #[arg(long)]
        note: Option<String>,
    },

    /// Delete a meal and its photo
    Delete {
        /// Meal ID
        id: String,
    },

    /// List meals, most recent first
    List {
        /// Only meals on this date (YYYY-MM-DD), in time order
        #[arg(long, short)]
        date: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one meal
    Show {
        /// Meal ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Dates that have meals
    Dates {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Meal types and their colors
    Types,

    /// Remove photo files no meal refers to
    Cleanup,
}

impl MealCommand {
    pub async fn run(&self, service: &MealService) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            MealSubcommand::Add {
                meal_type,
                date,
                time,
                photo,
                note,
            } => {
                let now = Local::now();
                let draft = MealDraft {
                    date: date
                        .as_deref()
                        .map(parse_date)
                        .transpose()?
                        .unwrap_or_else(|| now.date_naive()),
                    time: time
                        .as_deref()
                        .map(parse_time)
                        .transpose()?
                        .unwrap_or_else(|| now.time()),
                    meal_type: meal_type.parse()?,
                    note: note.clone(),
                };

                let meal = service
                    .add(draft, photo.clone())
                    .await
                    .map_err(|e| failure("save", e))?;

                println!("Recorded meal:");
                println!();
                print_details(&meal);
                Ok(())
            }
            MealSubcommand::Edit {
                id,
                meal_type,
                date,
                time,
                photo,
                remove_photo,
                note,
            } => {
                let current = service
                    .get(id)
                    .await
                    .map_err(|e| failure("load", e))?
                    .ok_or_else(|| format!("Meal not found: {}", id))?;

                let draft = MealDraft {
                    date: date
                        .as_deref()
                        .map(parse_date)
                        .transpose()?
                        .unwrap_or(current.date),
                    time: time
                        .as_deref()
                        .map(parse_time)
                        .transpose()?
                        .unwrap_or(current.time),
                    meal_type: match meal_type {
                        Some(t) => t.parse::<MealType>()?,
                        None => current.meal_type,
                    },
                    note: note.clone().or(current.note),
                };
                let change = match (photo, remove_photo) {
                    (Some(source), _) => PhotoChange::Replace(source.clone()),
                    (None, true) => PhotoChange::Remove,
                    (None, false) => PhotoChange::Keep,
                };

                let meal = service
                    .update(id, draft, change)
                    .await
                    .map_err(|e| failure("save", e))?
                    .ok_or_else(|| format!("Meal not found: {}", id))?;

                println!("Updated meal:");
                println!();
                print_details(&meal);
                Ok(())
            }
            MealSubcommand::Delete { id } => {
                let existed = service.delete(id).await.map_err(|e| failure("delete", e))?;
                if existed {
                    println!("Deleted meal {}", id);
                } else {
                    println!("Meal not found: {}", id);
                }
                Ok(())
            }
            MealSubcommand::List { date, format } => {
                let meals = match date {
                    Some(d) => service.list_by_date(parse_date(d)?).await,
                    None => service.list().await,
                }
                .map_err(|e| failure("load", e))?;
                print_meals(&meals, format)
            }
            MealSubcommand::Show { id, format } => {
                let meal = service
                    .get(id)
                    .await
                    .map_err(|e| failure("load", e))?
                    .ok_or_else(|| format!("Meal not found: {}", id))?;

                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&meal)?),
                    OutputFormat::Text => print_details(&meal),
                }
                Ok(())
            }
            MealSubcommand::Dates { format } => {
                let dates = service
                    .marked_dates()
                    .await
                    .map_err(|e| failure("load", e))?;

                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&dates)?),
                    OutputFormat::Text => {
                        for date in &dates {
                            println!("{}", date.format(DATE_FORMAT));
                        }
                        let total = service.count().await.map_err(|e| failure("load", e))?;
                        println!("\n{} meal(s) on {} day(s)", total, dates.len());
                    }
                }
                Ok(())
            }
            MealSubcommand::Types => {
                for meal_type in MealType::ALL {
                    println!("{}  {}", meal_type.color(), meal_type);
                }
                Ok(())
            }
            MealSubcommand::Cleanup => {
                let removed = service
                    .cleanup_orphans()
                    .await
                    .map_err(|e| failure("clean up", e))?;
                println!("Removed {} orphaned photo(s)", removed);
                Ok(())
            }
        }
    }
}

/// Log the cause, show the user one generic message.
fn failure(action: &str, e: StoreError) -> String {
    tracing::error!("Failed to {} meal: {}", action, e);
    match e {
        StoreError::Unavailable(_) => "Meal data is unavailable.".to_string(),
        _ => format!("Failed to {} meal.", action),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| format!("Invalid date format '{}'. Use YYYY-MM-DD.", s))
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .map_err(|_| format!("Invalid time format '{}'. Use HH:MM.", s))
}

fn print_meals(meals: &[Meal], format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    if meals.is_empty() {
        println!("No meals recorded");
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(meals)?);
        }
        OutputFormat::Text => {
            let mut current_date: Option<NaiveDate> = None;

            for meal in meals {
                // Print date header when it changes
                if current_date != Some(meal.date) {
                    if current_date.is_some() {
                        println!();
                    }
                    println!("{}", meal.date.format(DATE_FORMAT));
                    println!("{}", "-".repeat(10));
                    current_date = Some(meal.date);
                }

                let photo = if meal.photo_uri.is_some() { " [photo]" } else { "" };
                println!(
                    "  {} {}{}  ({})",
                    meal.time.format(TIME_FORMAT),
                    meal.meal_type,
                    photo,
                    meal.id
                );

                if let Some(note) = &meal.note {
                    println!("        {}", note);
                }
            }

            println!("\nTotal: {} meal(s)", meals.len());
        }
    }

    Ok(())
}

fn print_details(meal: &Meal) {
    print!("{}", meal);
    println!();
    println!("Meal ID: {}", meal.id);
}
