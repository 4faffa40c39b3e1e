pub mod clean;
pub mod commit;
pub mod completions;
pub mod init;
pub mod record;
pub mod report;
pub mod status;

use std::path::Path;

use anyhow::{Context as _, Result};
use tally_core::Project;
use tally_core::clock::{Clock, FixedClock, SystemClock};
use tally_core::config::{ProjectConfig, load_project_config};

/// Env var pinning "now" to a Unix epoch, for tests and replays.
pub const NOW_ENV: &str = "TALLY_NOW";

/// Discover the project above `cwd` and load its config.
pub fn open_project(cwd: &Path) -> Result<(Project, ProjectConfig)> {
    let project = Project::discover(cwd)?;
    let config = load_project_config(&project)?;
    Ok((project, config))
}

/// The system clock, or a frozen one when `TALLY_NOW` is set.
pub fn clock_from_env() -> Result<Box<dyn Clock>> {
    clock_from(std::env::var(NOW_ENV).ok().as_deref())
}

fn clock_from(value: Option<&str>) -> Result<Box<dyn Clock>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => {
            let epoch: i64 = raw
                .parse()
                .with_context(|| format!("{NOW_ENV} must be a Unix epoch in seconds, got '{raw}'"))?;
            Ok(Box::new(FixedClock::new(epoch)))
        }
        None => Ok(Box::new(SystemClock)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_override_freezes_clock() {
        assert_eq!(clock_from(Some("1700000000")).unwrap().now(), 1_700_000_000);
        assert!(clock_from(Some("yesterday")).is_err());
        assert!(clock_from(None).unwrap().now() > 1_577_836_800);
        assert!(clock_from(Some("  ")).unwrap().now() > 1_577_836_800);
    }
}
