//! ch-harness: Chrome Harness Main Binary
//!
//! Runs a named test-suite file through the external suite runner with a
//! managed Chrome session around it.
//!
//! Usage:
//!   ch-harness <suite-file>  - Launch Chrome, attach the driver, run the suite
//!   ch-harness --help        - Show help

use ch_browser::ChromeLifecycle;
use ch_core::HarnessConfig;
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Run a suite file
    Suite(String),
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args();

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("ch-harness {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = HarnessConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    let RunMode::Suite(suite_file) = mode else {
        return Ok(());
    };

    tracing::info!("Starting ch-harness for suite {}", suite_file);
    tracing::info!("Chrome: {}", config.browser.chrome_path.display());

    let result_code = run_suite(config, &suite_file).await?;
    tracing::info!("Suite runner finished with code {}", result_code);
    std::process::exit(result_code);
}

/// Launch Chrome, run the suite, and tear the session down
///
/// The session is closed whether or not the runner succeeds; the runner's
/// result code is passed through.
async fn run_suite(config: HarnessConfig, suite_file: &str) -> anyhow::Result<i32> {
    let mut chrome = ChromeLifecycle::new(config.browser.clone());

    let status = chrome.launch_chrome(&config.download_dir).await?;
    tracing::info!("{}", status);

    let run_result = async {
        let status = chrome.connect_driver().await?;
        tracing::info!("{}", status);

        let runner_status = tokio::process::Command::new(&config.runner_command)
            .arg(suite_file)
            .status()
            .await
            .map_err(|e| {
                anyhow::anyhow!("Failed to run {} {}: {}", config.runner_command, suite_file, e)
            })?;
        Ok::<i32, anyhow::Error>(runner_status.code().unwrap_or(1))
    }
    .await;

    // Teardown happens even when the runner or attach failed
    match chrome.close_chrome().await {
        Ok(status) => tracing::info!("{}", status),
        Err(e) => tracing::warn!("Close failed: {}", e),
    }

    run_result
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    let args: Vec<String> = std::env::args().collect();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => return RunMode::Suite(arg.clone()),
        }
    }

    RunMode::Help
}

/// Print help message
fn print_help() {
    println!("ch-harness - Chrome test harness runner");
    println!();
    println!("Usage:");
    println!("  ch-harness <suite-file>  Run a test-suite file with a managed Chrome session");
    println!("  ch-harness --help        Show this help message");
    println!("  ch-harness --version     Show version");
    println!();
    println!("Environment Variables:");
    println!("  CHROME_PATH              Chrome binary (default: /usr/bin/google-chrome)");
    println!("  CHROME_DEBUG_PORT        Remote debugging port (default: 9222)");
    println!("  CHROME_PROFILE_DIR       Profile directory (default: ./chrome-profile)");
    println!("  CHROME_READY_TIMEOUT     Endpoint readiness bound in seconds (default: 15)");
    println!("  CHROME_SHUTDOWN_TIMEOUT  Graceful close bound in seconds (default: 5)");
    println!("  CHROME_DRIVER_ALIAS      Driver registry alias (default: ChromeDebug)");
    println!("  SUITE_RUNNER             Suite runner command (default: robot)");
    println!("  DOWNLOAD_DIR             Download directory (default: ./downloads)");
}
