//! Entry point for Meshview: logging, CLI, run.

use anyhow::Result;

mod cli;

use cli::Command;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // A missing resource directory is reported but still exits with status 0.
    let config = match cli::parse(std::env::args().skip(1)) {
        Command::Usage => {
            println!("{}", cli::USAGE);
            return Ok(());
        }
        Command::Run(config) => config,
    };

    log::info!(
        "Starting Meshview. Resources: {}, backend: {:?}, show_fps={}, window_size={}x{}",
        config.resource_dir.display(),
        config.backends,
        config.show_fps,
        config.width,
        config.height
    );

    platform::run(config)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
