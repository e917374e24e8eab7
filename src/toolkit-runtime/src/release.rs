//! New-release notice.

use semver::Version;

use crate::host::Host;
use crate::state::ToolkitState;
use crate::storage::SettingsStore;
use crate::{Result, ToolkitError};

/// Outcome of a release-version check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseCheck {
    /// Nothing stored yet; the current version was recorded silently.
    FirstRun,
    /// Stored version is not older than the running one.
    UpToDate,
    /// The running version is newer; the notice was shown.
    Upgraded { from: String, to: String },
    /// One of the versions is not valid semver; nothing was changed.
    Unparsable,
}

/// Storage key holding the last version seen on a release channel.
pub fn latest_version_key(state: &ToolkitState) -> Result<String> {
    let environment = state.environment().ok_or(ToolkitError::NotBootstrapped)?;
    Ok(format!("latest-version-{environment}"))
}

/// Compare the stored release version against the running one and show the
/// release notice after an upgrade.
pub async fn check_release_version(
    storage: &dyn SettingsStore,
    host: &dyn Host,
    state: &ToolkitState,
) -> Result<ReleaseCheck> {
    let key = latest_version_key(state)?;
    let current = state.version().ok_or(ToolkitError::NotBootstrapped)?;

    let Some(latest) = storage.get_key(&key).await? else {
        storage.set_key(&key, current).await?;
        return Ok(ReleaseCheck::FirstRun);
    };

    let (stored, running) = match (Version::parse(&latest), Version::parse(current)) {
        (Ok(stored), Ok(running)) => (stored, running),
        (stored, running) => {
            tracing::warn!(
                "Skipping release check, unparsable version (stored: {}, running: {}): {:?} / {:?}",
                latest,
                current,
                stored.err(),
                running.err()
            );
            return Ok(ReleaseCheck::Unparsable);
        }
    };

    if stored < running {
        storage.set_key(&key, current).await?;
        tracing::info!("Toolkit upgraded from {} to {}", stored, running);
        host.show_release_notice(current);
        return Ok(ReleaseCheck::Upgraded {
            from: latest,
            to: current.to_string(),
        });
    }

    Ok(ReleaseCheck::UpToDate)
}
