//! Profile store
//!
//! Reads and writes the Chrome preference document under the profile
//! directory. Two jobs: repair the crash marker left by an unclean shutdown
//! so Chrome starts without the restore bubble, and merge the preference
//! sections the harness relies on (download target, popup/credential/plugin/
//! print behavior) before launch.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value as JsonValue, json};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{BrowserError, Result};

/// Location of the preference document relative to the profile directory
const PREFS_RELATIVE: &str = "Default/Preferences";

/// Path of the preference document for a profile
pub fn prefs_path(profile_dir: &Path) -> PathBuf {
    profile_dir.join(PREFS_RELATIVE)
}

/// Repair the crash marker in the preference document
///
/// If `profile.exit_type` reads `"Crashed"`, rewrite it to `"Normal"` while
/// leaving every other key untouched. Best-effort: a missing or unreadable
/// document must never block a fresh launch, so all failures are logged and
/// swallowed.
pub async fn repair_crash_flag(profile_dir: &Path) {
    let path = prefs_path(profile_dir);

    let mut prefs = match read_prefs(&path).await {
        Ok(Some(prefs)) => prefs,
        Ok(None) => {
            debug!("No preference document at {}, skipping crash repair", path.display());
            return;
        }
        Err(e) => {
            warn!("Failed to read preferences for crash repair: {}", e);
            return;
        }
    };

    let crashed = prefs
        .get("profile")
        .and_then(|p| p.get("exit_type"))
        .and_then(|v| v.as_str())
        == Some("Crashed");
    if !crashed {
        return;
    }

    if let Some(JsonValue::Object(profile)) = prefs.get_mut("profile") {
        profile.insert("exit_type".to_string(), json!("Normal"));
    }

    match write_prefs(&path, &prefs).await {
        Ok(()) => debug!("Repaired crashed exit_type in {}", path.display()),
        Err(e) => warn!("Failed to rewrite crash flag: {}", e),
    }
}

/// The preference sections the harness requires at launch
///
/// Whole top-level keys; the merge replaces these wholesale.
fn required_prefs(download_dir: &Path) -> Map<String, JsonValue> {
    let download_dir: &str = &download_dir.to_string_lossy();
    let required = json!({
        "printing": {
            "print_preview_sticky_settings.appState": {
                "recentDestinations": [{"id": "Save as PDF", "origin": "local"}],
                "selectedDestinationId": "Save as PDF",
                "version": 2
            }
        },
        "savefile": {"default_directory": download_dir},
        "download": {
            "default_directory": download_dir,
            "prompt_for_download": false
        },
        "plugins": {
            "always_open_pdf_externally": true
        },
        "profile": {
            "default_content_setting_values": {"popups": 1},
            "password_manager_enabled": false
        },
        "credentials_enable_service": false
    });

    match required {
        JsonValue::Object(map) => map,
        _ => unreachable!("required prefs literal is an object"),
    }
}

/// Merge the required preference sections into the profile's document
///
/// Shallow merge at the top level: each required key replaces any existing
/// value wholesale, unrelated top-level keys are preserved. Nested structure
/// below a replaced key is NOT merged; downstream consumers depend on the
/// replaced sections being exactly the required values, so keep it shallow.
///
/// A missing document starts from empty. Unlike crash repair this step is
/// the contract Chrome reads at startup, so I/O and parse failures are fatal
/// and propagate.
pub async fn merge_preferences(profile_dir: &Path, download_dir: &Path) -> Result<()> {
    let path = prefs_path(profile_dir);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut prefs = read_prefs(&path).await?.unwrap_or_default();

    let required = required_prefs(download_dir);
    let section_count = required.len();
    for (key, value) in required {
        prefs.insert(key, value);
    }

    write_prefs(&path, &prefs).await?;
    debug!(
        "Merged {} required preference sections into {}",
        section_count,
        path.display()
    );
    Ok(())
}

/// Read the preference document, `None` if it does not exist
async fn read_prefs(path: &Path) -> Result<Option<Map<String, JsonValue>>> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str::<JsonValue>(&raw)? {
        JsonValue::Object(map) => Ok(Some(map)),
        other => Err(BrowserError::Preferences(format!(
            "preference document is not a JSON object (found {})",
            json_kind(&other)
        ))),
    }
}

/// Write the preference document atomically (write-then-rename)
///
/// A concurrent reader sees either the old or the new document, never a
/// half-written one.
async fn write_prefs(path: &Path, prefs: &Map<String, JsonValue>) -> Result<()> {
    let serialized = serde_json::to_string_pretty(prefs)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serialized).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
