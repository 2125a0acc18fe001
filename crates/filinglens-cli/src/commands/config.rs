//! Config command: inspect and initialize configuration

use crate::app::{ConfigAction, ConfigArgs};
use anyhow::Result;
use filinglens_core::Config;

pub fn run(args: ConfigArgs, config: Config) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            println!("# {}", Config::default_path().display());
            print!("{}", serde_yaml::to_string(&config)?);
        }
        ConfigAction::Init => {
            let path = Config::default_path();
            if path.exists() {
                eprintln!("Config already exists at {}", path.display());
            } else {
                config.save()?;
                println!("Wrote default config to {}", path.display());
            }
        }
    }
    Ok(())
}
