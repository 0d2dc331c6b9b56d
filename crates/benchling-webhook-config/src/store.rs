//! Layered, namespaced profile persistence
//!
//! ```text
//! <root>/<profile>/config.json                     user layer (primary)
//! <root>/<profile>/config.backup-<timestamp>.json  previous primary, at most one
//! <root>/<profile>/derived/config.json             inferred values
//! <root>/<profile>/deploy/config.json              post-deployment outputs
//! <root>/<profile>/deployments.json                active record per stage
//! ```
//!
//! Writes are atomic (temp file in the same directory, fsync, rename). There is
//! no cross-process locking: concurrent writers race and the last one wins.

use crate::error::{ConfigError, Result};
use crate::merge::{deep_merge, merge_layers, LayerSet};
use crate::sources::{default_config_root, EnvSource};
use crate::types::{DeploymentRecord, Deployments, Layer, Profile};
use benchling_webhook_core::DEFAULT_PROFILE;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DOCUMENT_NAME: &str = "config.json";
const BACKUP_PREFIX: &str = "config.backup-";
const DEPLOYMENTS_NAME: &str = "deployments.json";
const INHERITS_KEY: &str = "_inherits";

/// The primary document of a profile and its single retained predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSlots {
    pub live: PathBuf,
    pub previous: Option<PathBuf>,
}

/// Profile persistence rooted at a config home directory.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    root: PathBuf,
}

impl ProfileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store at the default config home for this environment.
    pub fn from_env<E: EnvSource>(env: &E) -> Self {
        Self::new(default_config_root(env))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn profile_dir(&self, profile: &str) -> PathBuf {
        self.root.join(profile)
    }

    fn layer_path(&self, profile: &str, layer: Layer) -> PathBuf {
        let dir = self.profile_dir(profile);
        match layer.subdir() {
            Some(sub) => dir.join(sub).join(DOCUMENT_NAME),
            None => dir.join(DOCUMENT_NAME),
        }
    }

    /// Live primary document and its backup, if one exists.
    pub fn slots(&self, profile: &str) -> Result<DocumentSlots> {
        validate_profile_name(profile)?;
        let live = self.layer_path(profile, Layer::User);
        let mut backups = self.backup_files(profile)?;
        Ok(DocumentSlots {
            live,
            previous: backups.pop(),
        })
    }

    /// Backup files sorted oldest first.
    fn backup_files(&self, profile: &str) -> Result<Vec<PathBuf>> {
        let dir = self.profile_dir(profile);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ConfigError::io(&dir, e)),
        };

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::io(&dir, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(BACKUP_PREFIX) && name.ends_with(".json") {
                backups.push(entry.path());
            }
        }
        backups.sort();
        Ok(backups)
    }

    /// Copy the live document aside, then drop every older backup.
    fn rotate_backup(&self, profile: &str, live: &Path) -> Result<Option<PathBuf>> {
        if !live.is_file() {
            return Ok(None);
        }
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
        let backup = self
            .profile_dir(profile)
            .join(format!("{}{}.json", BACKUP_PREFIX, stamp));
        fs::copy(live, &backup).map_err(|e| ConfigError::io(&backup, e))?;

        for stale in self.backup_files(profile)? {
            if stale != backup {
                fs::remove_file(&stale).map_err(|e| ConfigError::io(&stale, e))?;
            }
        }
        debug!(profile, backup = %backup.display(), "Rotated profile backup");
        Ok(Some(backup))
    }

    /// Validate, back up the existing document, and atomically replace it.
    pub fn write_profile(&self, profile: &str, config: &Profile) -> Result<DocumentSlots> {
        validate_profile_name(profile)?;
        let mut config = config.clone();
        config.normalize();
        config.metadata.touch();

        let live = self.layer_path(profile, Layer::User);
        let value = serde_json::to_value(&config).map_err(|source| ConfigError::Parse {
            path: live.clone(),
            source,
        })?;
        check_schema(&value, &live.display().to_string())?;

        create_dir(&self.profile_dir(profile))?;
        let previous = self.rotate_backup(profile, &live)?;
        write_json_atomic(&live, &config)?;

        info!(profile, path = %live.display(), "Wrote profile");
        Ok(DocumentSlots { live, previous })
    }

    /// Merged profile across every present layer.
    pub fn read_profile(&self, profile: &str) -> Result<Profile> {
        let merged = self.read_merged_value(profile)?;
        into_profile(merged, &self.layer_path(profile, Layer::User))
    }

    fn read_layers(&self, profile: &str) -> Result<LayerSet> {
        validate_profile_name(profile)?;
        let user_path = self.layer_path(profile, Layer::User);
        let user = read_document(&user_path)?.ok_or_else(|| ConfigError::NotFound {
            profile: profile.to_string(),
            path: user_path.clone(),
        })?;

        let mut layers = LayerSet {
            user: Some(user),
            ..Default::default()
        };
        for layer in [Layer::Derived, Layer::Deploy] {
            if let Some(value) = read_document(&self.layer_path(profile, layer))? {
                layers.set(layer, value);
            }
        }
        Ok(layers)
    }

    fn read_merged_value(&self, profile: &str) -> Result<Value> {
        Ok(merge_layers(&self.read_layers(profile)?))
    }

    /// Raw document of a single layer; `None` when that layer was never written.
    pub fn read_layer(&self, profile: &str, layer: Layer) -> Result<Option<Value>> {
        validate_profile_name(profile)?;
        read_document(&self.layer_path(profile, layer))
    }

    /// Replace one layer. The user layer must be a complete profile.
    pub fn write_layer(&self, profile: &str, layer: Layer, value: &Value) -> Result<()> {
        validate_profile_name(profile)?;
        let path = self.layer_path(profile, layer);
        if !value.is_object() {
            return Err(ConfigError::schema(
                path.display(),
                format!("{} layer must be a JSON object", layer),
            ));
        }

        if layer == Layer::User {
            let config = into_profile(value.clone(), &path)?;
            self.write_profile(profile, &config)?;
            return Ok(());
        }

        if !self.profile_exists(profile) {
            return Err(ConfigError::NotFound {
                profile: profile.to_string(),
                path: self.layer_path(profile, Layer::User),
            });
        }
        if let Some(parent) = path.parent() {
            create_dir(parent)?;
        }
        write_json_atomic(&path, value)?;
        debug!(profile, %layer, "Wrote layer");
        Ok(())
    }

    /// Merged profile with its `_inherits` chain applied, ancestors first.
    pub fn read_profile_with_inheritance(&self, profile: &str) -> Result<Profile> {
        let mut chain: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        let mut current = profile.to_string();

        loop {
            if chain.contains(&current) {
                chain.push(current);
                return Err(ConfigError::schema(
                    profile,
                    format!("circular profile inheritance: {}", chain.join(" -> ")),
                ));
            }
            let value = self.read_merged_value(&current)?;
            let parent = value
                .get(INHERITS_KEY)
                .and_then(Value::as_str)
                .map(str::to_string);
            chain.push(current);
            values.push(value);
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        let mut merged = json!({});
        for value in values.iter().rev() {
            deep_merge(&mut merged, value);
        }
        if let Value::Object(map) = &mut merged {
            match values.first().and_then(|v| v.get(INHERITS_KEY)) {
                Some(own) => map.insert(INHERITS_KEY.to_string(), own.clone()),
                None => map.remove(INHERITS_KEY),
            };
        }
        into_profile(merged, &self.layer_path(profile, Layer::User))
    }

    /// Profile names with a primary document, sorted.
    pub fn list_profiles(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ConfigError::io(&self.root, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::io(&self.root, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().join(DOCUMENT_NAME).is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn profile_exists(&self, profile: &str) -> bool {
        validate_profile_name(profile).is_ok() && self.layer_path(profile, Layer::User).is_file()
    }

    /// Remove a profile and all its layers. The default profile is protected.
    pub fn delete_profile(&self, profile: &str) -> Result<()> {
        if profile == DEFAULT_PROFILE {
            return Err(ConfigError::ProfileProtected {
                profile: profile.to_string(),
            });
        }
        validate_profile_name(profile)?;
        if !self.profile_exists(profile) {
            return Err(ConfigError::NotFound {
                profile: profile.to_string(),
                path: self.layer_path(profile, Layer::User),
            });
        }
        let dir = self.profile_dir(profile);
        fs::remove_dir_all(&dir).map_err(|e| ConfigError::io(&dir, e))?;
        info!(profile, "Deleted profile");
        Ok(())
    }

    /// Active deployment records for a profile; empty when none recorded.
    pub fn deployments(&self, profile: &str) -> Result<Deployments> {
        validate_profile_name(profile)?;
        let path = self.profile_dir(profile).join(DEPLOYMENTS_NAME);
        match read_document(&path)? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ConfigError::schema(path.display(), e.to_string())),
            None => Ok(Deployments::default()),
        }
    }

    /// Replace the stage's active record and mirror it into the deploy layer.
    pub fn record_deployment(
        &self,
        profile: &str,
        stage: &str,
        record: DeploymentRecord,
    ) -> Result<()> {
        if !self.profile_exists(profile) {
            return Err(ConfigError::NotFound {
                profile: profile.to_string(),
                path: self.layer_path(profile, Layer::User),
            });
        }

        let mut deployments = self.deployments(profile)?;
        let deploy_patch = json!({
            "deployment": {
                "imageTag": record.image_tag,
                "stackName": record.stack_name,
            }
        });
        deployments.active.insert(stage.to_string(), record);
        let path = self.profile_dir(profile).join(DEPLOYMENTS_NAME);
        write_json_atomic(&path, &deployments)?;

        let mut deploy = self
            .read_layer(profile, Layer::Deploy)?
            .unwrap_or_else(|| json!({}));
        deep_merge(&mut deploy, &deploy_patch);
        self.write_layer(profile, Layer::Deploy, &deploy)?;

        info!(profile, stage, "Recorded deployment");
        Ok(())
    }
}

/// Profile names become directory names.
pub fn validate_profile_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidProfileName {
            name: name.to_string(),
        })
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| ConfigError::io(dir, e))
}

fn read_document(path: &Path) -> Result<Option<Value>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::io(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Required-field checks on a merged document; unknown top-level keys pass.
fn check_schema(value: &Value, location: &str) -> Result<()> {
    let Some(map) = value.as_object() else {
        return Err(ConfigError::schema(location, "profile must be a JSON object"));
    };

    let required = [
        ("_metadata", "version"),
        ("benchling", "tenant"),
        ("deployment", "region"),
    ];
    let mut missing = Vec::new();
    for (section, field) in required {
        let present = map
            .get(section)
            .and_then(|s| s.get(field))
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty());
        if !present {
            missing.push(format!("{}.{}", section, field));
        }
    }
    if !missing.is_empty() {
        return Err(ConfigError::schema(
            location,
            format!("missing required field(s): {}", missing.join(", ")),
        ));
    }
    Ok(())
}

fn into_profile(value: Value, path: &Path) -> Result<Profile> {
    let location = path.display().to_string();
    check_schema(&value, &location)?;
    serde_json::from_value(value).map_err(|e| ConfigError::schema(location, e.to_string()))
}

/// Serialize pretty-printed and atomically replace `path`.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut body = serde_json::to_string_pretty(value).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    body.push('\n');

    let parent = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| ConfigError::io(path, e))?;
    tmp.write_all(body.as_bytes())
        .map_err(|e| ConfigError::io(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| ConfigError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| ConfigError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::sample_profile;
    use benchling_webhook_core::Remediation;

    fn store() -> (tempfile::TempDir, ProfileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_missing_profile_names_expected_path() {
        let (_dir, store) = store();
        let err = store.read_profile("dev").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert!(err.to_string().contains("dev/config.json"));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let (_dir, store) = store();
        let dir = store.profile_dir("dev");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.json"), "{ not json").unwrap();
        let err = store.read_profile("dev").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_schema_violation() {
        let (_dir, store) = store();
        let dir = store.profile_dir("dev");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.json"), r#"{"benchling": {"tenant": ""}}"#).unwrap();
        let err = store.read_profile("dev").unwrap_err();
        assert!(matches!(err, ConfigError::Schema { .. }));
        assert!(err.to_string().contains("benchling.tenant"));
    }

    #[test]
    fn test_invalid_profile_name() {
        let (_dir, store) = store();
        let err = store
            .write_profile("../escape", &sample_profile())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProfileName { .. }));
    }

    #[test]
    fn test_catalog_scheme_stripped_on_write() {
        let (_dir, store) = store();
        let mut profile = sample_profile();
        profile.quilt.catalog = "https://quilt.example.com/".to_string();
        store.write_profile("dev", &profile).unwrap();
        assert_eq!(store.read_profile("dev").unwrap().quilt.catalog, "quilt.example.com");
    }

    #[test]
    fn test_layers_merge_on_read() {
        let (_dir, store) = store();
        store.write_profile("dev", &sample_profile()).unwrap();
        store
            .write_layer("dev", Layer::Derived, &json!({"quilt": {"database": "derived_db"}}))
            .unwrap();
        store
            .write_layer("dev", Layer::Deploy, &json!({"deployment": {"imageTag": "1.2.3"}}))
            .unwrap();

        let profile = store.read_profile("dev").unwrap();
        assert_eq!(profile.quilt.database, "derived_db");
        assert_eq!(profile.deployment.image_tag.as_deref(), Some("1.2.3"));
        assert_eq!(profile.quilt.catalog, "quilt.example.com");
    }

    #[test]
    fn test_layer_without_profile_fails() {
        let (_dir, store) = store();
        let err = store
            .write_layer("ghost", Layer::Derived, &json!({}))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_inheritance() {
        let (_dir, store) = store();
        store.write_profile("base", &sample_profile()).unwrap();

        let mut child = sample_profile();
        child.inherits = Some("base".to_string());
        child.quilt.database = "child_db".to_string();
        store.write_profile("child", &child).unwrap();
        store
            .write_layer("base", Layer::Derived, &json!({"deployment": {"account": "123456789012"}}))
            .unwrap();

        let resolved = store.read_profile_with_inheritance("child").unwrap();
        assert_eq!(resolved.quilt.database, "child_db");
        assert_eq!(resolved.deployment.account.as_deref(), Some("123456789012"));
        assert_eq!(resolved.inherits.as_deref(), Some("base"));
    }

    #[test]
    fn test_inheritance_cycle_detected() {
        let (_dir, store) = store();
        let mut a = sample_profile();
        a.inherits = Some("b".to_string());
        let mut b = sample_profile();
        b.inherits = Some("a".to_string());
        store.write_profile("a", &a).unwrap();
        store.write_profile("b", &b).unwrap();

        let err = store.read_profile_with_inheritance("a").unwrap_err();
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_record_deployment_replaces_stage() {
        let (_dir, store) = store();
        store.write_profile("dev", &sample_profile()).unwrap();

        let record = |tag: &str| DeploymentRecord {
            endpoint: "https://abc.execute-api.us-east-1.amazonaws.com/prod".to_string(),
            image_tag: tag.to_string(),
            stack_name: "BenchlingWebhookStack".to_string(),
            region: "us-east-1".to_string(),
            deployed_at: "2026-01-01T00:00:00Z".to_string(),
            deployed_by: None,
        };
        store.record_deployment("dev", "prod", record("0.1.0")).unwrap();
        store.record_deployment("dev", "prod", record("0.2.0")).unwrap();

        let deployments = store.deployments("dev").unwrap();
        assert_eq!(deployments.active.len(), 1);
        assert_eq!(deployments.active["prod"].image_tag, "0.2.0");

        let profile = store.read_profile("dev").unwrap();
        assert_eq!(profile.deployment.image_tag.as_deref(), Some("0.2.0"));
        assert_eq!(
            profile.deployment.stack_name.as_deref(),
            Some("BenchlingWebhookStack")
        );
    }

    #[test]
    fn test_protected_profile_code() {
        let (_dir, store) = store();
        let err = store.delete_profile(DEFAULT_PROFILE).unwrap_err();
        assert_eq!(err.code().as_str(), "E013");
    }
}
