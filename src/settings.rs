use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::SettingsError;
use crate::model::UserStatus;

pub const DEFAULT_SS_METHOD: &str = "chacha20-ietf-poly1305";

/// Subscription settings from the external settings source (YAML or JSON file).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
  pub profile_title: String,
  pub support_link: String,
  /// Hours.
  pub profile_update_interval: u32,
  pub profile_web_page_url: Option<String>,
  pub expired_user_remarks: Vec<String>,
  pub disabled_user_remarks: Vec<String>,
  pub limited_user_remarks: Vec<String>,
  pub mux_enabled: bool,
  pub ss_method: String,
  pub templates_dir: Option<PathBuf>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      profile_title: "Subscription".to_string(),
      support_link: String::new(),
      profile_update_interval: 12,
      profile_web_page_url: None,
      expired_user_remarks: vec![
        "Subscription expired".to_string(),
        "Contact support".to_string(),
      ],
      disabled_user_remarks: vec![
        "Subscription disabled".to_string(),
        "Contact support".to_string(),
      ],
      limited_user_remarks: vec![
        "Traffic limit reached".to_string(),
        "Contact support".to_string(),
      ],
      mux_enabled: false,
      ss_method: DEFAULT_SS_METHOD.to_string(),
      templates_dir: None,
    }
  }
}

impl Settings {
  pub fn parse(text: &str) -> Result<Self, SettingsError> {
    if text.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(text)?)
  }

  pub fn load(path: &Path) -> Result<Self, SettingsError> {
    let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&text)
  }

  /// Placeholder remarks for a non-active user; empty for active users.
  pub fn remarks_for(&self, status: UserStatus) -> &[String] {
    match status {
      UserStatus::Active => &[],
      UserStatus::Expired => &self.expired_user_remarks,
      UserStatus::Disabled => &self.disabled_user_remarks,
      UserStatus::Limited => &self.limited_user_remarks,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_partial_yaml_keeps_defaults() {
    let s = Settings::parse("profileTitle: Edge\nexpiredUserRemarks: [A, B]\n").unwrap();
    assert_eq!(s.profile_title, "Edge");
    assert_eq!(s.remarks_for(UserStatus::Expired), ["A", "B"]);
    assert_eq!(s.profile_update_interval, 12);
    assert_eq!(s.ss_method, DEFAULT_SS_METHOD);
  }

  #[test]
  fn test_json_is_accepted() {
    let s = Settings::parse(r#"{"muxEnabled": true, "profileUpdateInterval": 3}"#).unwrap();
    assert!(s.mux_enabled);
    assert_eq!(s.profile_update_interval, 3);
  }

  #[test]
  fn test_malformed_settings_is_error() {
    assert!(Settings::parse("profileUpdateInterval: [").is_err());
  }

  #[test]
  fn test_active_user_has_no_placeholders() {
    assert!(Settings::default().remarks_for(UserStatus::Active).is_empty());
  }
}
