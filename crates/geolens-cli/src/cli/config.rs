use dotenvy::dotenv;
use eyre::Result;

/// Load a `.env` file from the working directory, if there is one. Provider
/// keys set there are picked up by credential resolution.
pub fn load_env() -> Result<()> {
    dotenv().ok();
    Ok(())
}
