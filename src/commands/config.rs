use crate::config::{self, Config};
use anyhow::Result;
use colored::Colorize;

pub fn execute(settings: &mut Config, key: Option<String>, value: Option<String>) -> Result<()> {
    match (key, value) {
        (None, _) => {
            println!("{}", settings.file().display().to_string().dimmed());
            for key in config::keys() {
                let value = settings.get(&key).unwrap_or_default();
                println!("{:<24} {}", key.cyan(), value);
            }
        }
        (Some(key), None) => match settings.get(&key) {
            Some(value) => println!("{value}"),
            None => println!("{} is not set", key.to_uppercase()),
        },
        (Some(key), Some(value)) => {
            let key = key.to_uppercase();
            match config::validate(&key, &value)? {
                Some(value) => {
                    settings.set(&key, &value);
                    println!("{} = {}", key.cyan(), value.green());
                }
                None => {
                    settings.set(&key, "");
                    println!("{} cleared", key.cyan());
                }
            }
        }
    }
    Ok(())
}
