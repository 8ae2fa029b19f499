//! Remark placeholder substitution (`{{DAYS_LEFT}}` and friends).

use chrono::{DateTime, Utc};

use crate::model::UserSnapshot;

const SECONDS_PER_DAY: i64 = 86_400;
const UNLIMITED: &str = "∞";

/// Placeholder values computed once per request so every endpoint in a
/// response shows the same numbers.
#[derive(Debug, Clone)]
pub struct RemarkContext {
  values: Vec<(String, String)>,
}

impl RemarkContext {
  pub fn new(user: &UserSnapshot, now: DateTime<Utc>) -> Self {
    let remaining = (user.expire_at - now).num_seconds();
    let days_left = if remaining <= 0 {
      0
    } else {
      (remaining + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
    };

    let (traffic_left, total) = if user.traffic_limit_bytes == 0 {
      (UNLIMITED.to_string(), UNLIMITED.to_string())
    } else {
      (
        format_bytes(user.traffic_limit_bytes.saturating_sub(user.used_traffic_bytes)),
        format_bytes(user.traffic_limit_bytes),
      )
    };

    let values = [
      ("DAYS_LEFT", days_left.to_string()),
      ("TRAFFIC_USED", format_bytes(user.used_traffic_bytes)),
      ("TRAFFIC_LEFT", traffic_left),
      ("TOTAL_TRAFFIC", total),
      ("STATUS", user.status.as_str().to_string()),
      ("USERNAME", user.username.clone()),
    ]
    .into_iter()
    .map(|(k, v)| (format!("{{{{{k}}}}}"), v))
    .collect();

    Self { values }
  }

  pub fn apply(&self, template: &str) -> String {
    if !template.contains("{{") {
      return template.to_string();
    }
    let mut out = template.to_string();
    for (token, value) in &self.values {
      out = out.replace(token.as_str(), value);
    }
    out
  }
}

/// Humanized size in binary units, e.g. `1.50 GiB`.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
  if bytes < 1024 {
    return format!("{bytes} B");
  }
  let mut value = bytes as f64;
  let mut unit = 0;
  while value >= 1024.0 && unit < UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }
  format!("{value:.2} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::UserStatus;
  use chrono::{Duration, TimeZone};

  fn user(expire_in: Duration, used: u64, limit: u64) -> (UserSnapshot, DateTime<Utc>) {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let u = UserSnapshot {
      short_uuid: "abc".to_string(),
      username: "alice".to_string(),
      status: UserStatus::Active,
      expire_at: now + expire_in,
      used_traffic_bytes: used,
      traffic_limit_bytes: limit,
      trojan_password: "t".to_string(),
      vless_uuid: "v".to_string(),
      ss_password: "s".to_string(),
    };
    (u, now)
  }

  #[test]
  fn test_format_bytes() {
    assert_eq!(format_bytes(0), "0 B");
    assert_eq!(format_bytes(1023), "1023 B");
    assert_eq!(format_bytes(1536), "1.50 KiB");
    assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GiB");
  }

  #[test]
  fn test_days_left_rounds_up_and_floors_at_zero() {
    let (u, now) = user(Duration::hours(25), 0, 0);
    let ctx = RemarkContext::new(&u, now);
    assert_eq!(ctx.apply("{{DAYS_LEFT}}d"), "2d");

    let (u, now) = user(Duration::days(-3), 0, 0);
    let ctx = RemarkContext::new(&u, now);
    assert_eq!(ctx.apply("{{DAYS_LEFT}}"), "0");
  }

  #[test]
  fn test_traffic_placeholders() {
    let (u, now) = user(Duration::days(1), 1024, 4096);
    let ctx = RemarkContext::new(&u, now);
    assert_eq!(
      ctx.apply("{{TRAFFIC_USED}}/{{TOTAL_TRAFFIC}} left {{TRAFFIC_LEFT}} {{STATUS}}"),
      "1.00 KiB/4.00 KiB left 3.00 KiB ACTIVE"
    );
  }

  #[test]
  fn test_unlimited_traffic() {
    let (u, now) = user(Duration::days(1), 10, 0);
    let ctx = RemarkContext::new(&u, now);
    assert_eq!(ctx.apply("{{TRAFFIC_LEFT}} {{TOTAL_TRAFFIC}}"), "∞ ∞");
  }

  #[test]
  fn test_plain_remark_untouched() {
    let (u, now) = user(Duration::days(1), 0, 0);
    let ctx = RemarkContext::new(&u, now);
    assert_eq!(ctx.apply("Frankfurt {{UNKNOWN}}"), "Frankfurt {{UNKNOWN}}");
  }
}
