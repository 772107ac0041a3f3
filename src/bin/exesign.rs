//! exesign - sign an existing executable.

use std::process;

#[tokio::main]
async fn main() {
    let exit_code = match exebuild::cli::run_sign().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}
