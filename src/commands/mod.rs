mod config_cmd;
mod meal;

pub use config_cmd::ConfigCommand;
pub use meal::MealCommand;

use clap::ValueEnum;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
