//! Release Promoter - resumable staging to production promotion.

use release_promoter::cli;
use release_promoter::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match cli::run().await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            let output = OutputManager::new(false, false);
            if e.is_interrupted() {
                output.warn("Interrupted. Progress up to the last completed step is saved.");
                process::exit(cli::EXIT_INTERRUPTED);
            }

            output.error(&format!("Fatal error: {e}"));
            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    output.indent(&suggestion);
                }
            }
            process::exit(1);
        }
    }
}
