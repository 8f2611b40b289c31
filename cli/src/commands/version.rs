//! `ephemera version`

use anyhow::Result;

use crate::app::AppContext;

/// Print the CLI version.
///
/// # Errors
///
/// Returns an error if JSON rendering fails.
pub fn run(app: &AppContext) -> Result<()> {
    app.renderer().render_version(env!("CARGO_PKG_VERSION"))
}
