//! exebuild - package a script into a standalone executable.
//!
//! Runs the packaging tool, verifies the artifact, optionally signs it and
//! records the build in a JSON config file.

use std::process;

#[tokio::main]
async fn main() {
    // Run CLI and get exit code
    let exit_code = match exebuild::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}
