//! `capacitor.config.json` merge.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

pub const CAPACITOR_CONFIG: &str = "capacitor.config.json";

/// Settings owned by the packager; everything else in the file is kept.
fn owned_settings(app_id: &str, app_name: &str) -> Value {
    json!({
        "appId": app_id,
        "appName": app_name,
        "webDir": "www",
        "bundledWebRuntime": false,
        "backgroundColor": "#ffffff",
        "android": {
            "allowMixedContent": true,
            "webContentsDebuggingEnabled": false,
            "appendUserAgent": "ARPackager"
        },
        "server": {
            "hostname": "localhost",
            "androidScheme": "http",
            "cleartext": true
        },
        "plugins": {
            "Camera": { "permissions": ["camera", "photos"] },
            "SplashScreen": { "launchShowDuration": 1500, "backgroundColor": "#ffffff" }
        }
    })
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Merge identity and runtime settings into the project's Capacitor config.
pub fn write_capacitor_config(project_root: &Path, app_id: &str, app_name: &str) -> Result<()> {
    let path = project_root.join(CAPACITOR_CONFIG);
    let mut config = if path.is_file() {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading '{}'", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing '{}'", path.display()))?
    } else {
        Value::Object(Map::new())
    };
    merge(&mut config, owned_settings(app_id, app_name));
    let text = serde_json::to_string_pretty(&config)?;
    crate::fsutil::write_file(&path, text + "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_merge_keeps_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CAPACITOR_CONFIG),
            r#"{"appId":"com.old","ios":{"scheme":"App"},"plugins":{"Keyboard":{"resize":"body"}}}"#,
        )
        .unwrap();

        write_capacitor_config(tmp.path(), "com.librosdar.libro", "libro").unwrap();
        let cfg: Value =
            serde_json::from_str(&fs::read_to_string(tmp.path().join(CAPACITOR_CONFIG)).unwrap())
                .unwrap();
        assert_eq!(cfg["appId"], "com.librosdar.libro");
        assert_eq!(cfg["webDir"], "www");
        assert_eq!(cfg["ios"]["scheme"], "App");
        assert_eq!(cfg["plugins"]["Keyboard"]["resize"], "body");
        assert_eq!(cfg["server"]["androidScheme"], "http");
    }

    #[test]
    fn test_creates_missing_file() {
        let tmp = TempDir::new().unwrap();
        write_capacitor_config(tmp.path(), "com.x.y", "y").unwrap();
        assert!(tmp.path().join(CAPACITOR_CONFIG).is_file());
    }
}
