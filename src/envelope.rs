//! Body, content type and subscription headers.

use base64::engine::general_purpose;
use base64::Engine;
use serde::Serialize;

use crate::model::UserSnapshot;
use crate::settings::Settings;

pub const OUTLINE_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
  pub body: String,
  pub content_type: String,
  /// Ordered; names are lowercase.
  pub headers: Vec<(String, String)>,
}

impl SubscriptionResponse {
  pub fn new(body: String, content_type: &str, user: &UserSnapshot, settings: &Settings) -> Self {
    Self {
      body,
      content_type: content_type.to_string(),
      headers: subscription_headers(user, settings),
    }
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  pub fn is_empty(&self) -> bool {
    self.body.is_empty()
  }
}

pub fn subscription_headers(user: &UserSnapshot, settings: &Settings) -> Vec<(String, String)> {
  let mut headers = vec![
    (
      "content-disposition".to_string(),
      format!("attachment; filename=\"{}\"", user.username),
    ),
    (
      "profile-title".to_string(),
      format!("base64:{}", general_purpose::STANDARD.encode(&settings.profile_title)),
    ),
    (
      "profile-update-interval".to_string(),
      settings.profile_update_interval.to_string(),
    ),
    ("subscription-userinfo".to_string(), userinfo(user)),
    ("support-url".to_string(), settings.support_link.clone()),
  ];
  if let Some(url) = settings.profile_web_page_url.as_deref().filter(|u| !u.is_empty()) {
    headers.push(("profile-web-page-url".to_string(), url.to_string()));
  }
  headers
}

/// `upload=0; download={used}; total={limit}; expire={unix seconds}`.
fn userinfo(user: &UserSnapshot) -> String {
  format!(
    "upload=0; download={}; total={}; expire={}",
    user.used_traffic_bytes,
    user.traffic_limit_bytes,
    user.expire_at.timestamp()
  )
}
