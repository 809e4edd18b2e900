use clap::Parser;
use color_eyre::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use docdesk::app::App;
use docdesk::commands::{Args, Command};
use docdesk::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging(args.verbose);

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  if args.command == Command::Login {
    println!("{}", App::login(&config).await?);
    return Ok(());
  }

  let app = App::new(config).await?;
  app.run(args.command).await?;

  Ok(())
}

/// Log to a daily file so output on stdout stays clean.
///
/// Filter comes from DOCDESK_LOG, falling back to `info` (`debug` with -v).
fn init_logging(verbose: bool) -> Option<WorkerGuard> {
  let default_level = if verbose { "docdesk=debug,info" } else { "info" };
  let filter =
    EnvFilter::try_from_env("DOCDESK_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

  let log_dir = dirs::data_dir().map(|dir| dir.join("docdesk").join("logs"))?;
  if std::fs::create_dir_all(&log_dir).is_err() {
    return None;
  }

  let appender = tracing_appender::rolling::daily(log_dir, "docdesk.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Some(guard)
}
