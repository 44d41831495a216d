use anyhow::Result;
use identeco::cli::{actions, actions::Action, start};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let (action, config) = start()?;

    // Handle the action
    match action {
        Action::Server { .. } => actions::server::handle(action, config).await?,
    }

    Ok(())
}
