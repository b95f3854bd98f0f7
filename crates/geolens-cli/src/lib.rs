pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod workspace;

pub use geolens_core::{api, app, config, session, tools, transport};
