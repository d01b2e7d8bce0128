use clap::Parser;
use color_eyre::Result;
use txdash::error_display::user_message_from_report;
use txdash::{logging, AppConfig, Args, CacheManager, ConfigManager, LaunchOptions, APP_NAME};

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let manager = ConfigManager::new(APP_NAME)?;
        match manager.write_default_config(args.force) {
            Ok(path) => {
                println!("Wrote default configuration to {}", path.display());
                return Ok(Some(()));
            }
            Err(e) => {
                eprintln!("Error generating config: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.clear_cache {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => {
                if let Err(e) = cache.clear_all() {
                    eprintln!("Error clearing cache: {}", e);
                    std::process::exit(1);
                }
                println!("Cache cleared successfully");
            }
            Err(_e) => println!("No cache to clear"),
        }
        return Ok(Some(()));
    }

    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    let config = match AppConfig::load(APP_NAME) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };
    let options = LaunchOptions::from_args_and_config(&args, &config);

    match CacheManager::new(APP_NAME) {
        Ok(cache) => {
            if let Err(e) = logging::init(&cache, options.debug, &config.debug.log_level) {
                eprintln!("Warning: logging disabled: {}", e);
            }
        }
        Err(e) => eprintln!("Warning: logging disabled: {}", e),
    }

    color_eyre::install()?;
    if let Err(e) = txdash::run(options, config) {
        eprintln!("Error: {}", user_message_from_report(&e, None));
        std::process::exit(1);
    }
    Ok(())
}
