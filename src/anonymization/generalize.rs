//! Generalization transforms
//!
//! Pure, deterministic functions that coarsen field values into closed
//! category sets. Every function is total (always returns a value) and
//! idempotent: re-applying a function to its own output returns the same
//! output, which keeps re-processed records stable.

use crate::config::TemporalGranularity;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

/// Truncate a timestamp to the configured granularity
///
/// Day keeps the calendar date, Week snaps to the ISO week start (Monday),
/// Month snaps to the first of the month. Idempotent: a truncated timestamp
/// truncates to itself.
pub fn generalize_timestamp(ts: DateTime<Utc>, granularity: TemporalGranularity) -> DateTime<Utc> {
    let date = ts.date_naive();
    let truncated = match granularity {
        TemporalGranularity::Day => date,
        TemporalGranularity::Week => {
            let days_from_monday = date.weekday().num_days_from_monday() as i64;
            date - Duration::days(days_from_monday)
        }
        TemporalGranularity::Month => {
            // First of the month always exists
            NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
        }
    };
    Utc.from_utc_datetime(&truncated.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Format a generalized timestamp as a period label, e.g. `"2026-08-17"`
pub fn period_label(ts: DateTime<Utc>, granularity: TemporalGranularity) -> String {
    generalize_timestamp(ts, granularity)
        .format("%Y-%m-%d")
        .to_string()
}

/// Map a country code or name to a coarse region
///
/// Unknown inputs map to `"OTHER"`. Region names map to themselves so the
/// function is idempotent.
pub fn region(country: &str) -> &'static str {
    let c = country.trim().to_uppercase();
    match c.as_str() {
        // Already generalized
        "NORTH_AMERICA" | "SOUTH_AMERICA" | "EUROPE" | "ASIA_PACIFIC" | "MIDDLE_EAST_AFRICA"
        | "OTHER" => region_name(&c),
        "US" | "USA" | "UNITED STATES" | "CA" | "CANADA" | "MX" | "MEXICO" => "NORTH_AMERICA",
        "BR" | "BRAZIL" | "AR" | "ARGENTINA" | "CL" | "CHILE" | "CO" | "COLOMBIA" | "PE" => {
            "SOUTH_AMERICA"
        }
        "GB" | "UK" | "UNITED KINGDOM" | "DE" | "GERMANY" | "FR" | "FRANCE" | "ES" | "SPAIN"
        | "IT" | "ITALY" | "NL" | "NETHERLANDS" | "SE" | "SWEDEN" | "NO" | "NORWAY" | "DK"
        | "FI" | "PL" | "POLAND" | "IE" | "IRELAND" | "CH" | "SWITZERLAND" | "AT" | "BE"
        | "PT" | "CZ" | "UA" => "EUROPE",
        "CN" | "CHINA" | "JP" | "JAPAN" | "KR" | "SOUTH KOREA" | "IN" | "INDIA" | "AU"
        | "AUSTRALIA" | "NZ" | "NEW ZEALAND" | "SG" | "SINGAPORE" | "HK" | "TW" | "TH" | "VN"
        | "ID" | "MY" | "PH" => "ASIA_PACIFIC",
        "AE" | "SA" | "IL" | "ISRAEL" | "TR" | "TURKEY" | "EG" | "EGYPT" | "ZA"
        | "SOUTH AFRICA" | "NG" | "NIGERIA" | "KE" | "KENYA" | "MA" => "MIDDLE_EAST_AFRICA",
        _ => "OTHER",
    }
}

fn region_name(c: &str) -> &'static str {
    match c {
        "NORTH_AMERICA" => "NORTH_AMERICA",
        "SOUTH_AMERICA" => "SOUTH_AMERICA",
        "EUROPE" => "EUROPE",
        "ASIA_PACIFIC" => "ASIA_PACIFIC",
        "MIDDLE_EAST_AFRICA" => "MIDDLE_EAST_AFRICA",
        _ => "OTHER",
    }
}

/// Round a minute count to the nearest multiple of `round_to`, floor zero
pub fn round_minutes(minutes: u64, round_to: u32) -> u64 {
    let n = round_to.max(1) as u64;
    ((minutes + n / 2) / n) * n
}

/// Band an organization headcount
pub fn size_band(size: u64) -> &'static str {
    match size {
        0..=10 => "STARTUP",
        11..=50 => "SMALL",
        51..=250 => "MEDIUM",
        251..=1000 => "LARGE",
        _ => "ENTERPRISE",
    }
}

/// Map a free-form industry string to a closed category set
pub fn industry_category(industry: &str) -> &'static str {
    let s = industry.trim().to_lowercase();
    if s.is_empty() {
        return "OTHER";
    }
    if s.contains("tech") || s.contains("software") || s.contains("saas") || s.contains("internet")
    {
        "TECHNOLOGY"
    } else if s.contains("health") || s.contains("medical") || s.contains("pharma") {
        "HEALTHCARE"
    } else if s.contains("financ") || s.contains("bank") || s.contains("insur") {
        "FINANCE"
    } else if s.contains("edu") || s.contains("school") || s.contains("universit") {
        "EDUCATION"
    } else if s.contains("retail") || s.contains("commerce") || s.contains("consumer") {
        "RETAIL"
    } else if s.contains("manufactur") || s.contains("industrial") {
        "MANUFACTURING"
    } else if s.contains("gov") || s.contains("public sector") || s.contains("nonprofit") {
        "GOVERNMENT"
    } else {
        "OTHER"
    }
}

/// Map a job title to a role category
pub fn role_category(role: &str) -> &'static str {
    let s = role.trim().to_lowercase();
    if s.is_empty() {
        return "OTHER";
    }
    if s.contains("exec") || s.contains("chief") || s.contains("founder") || s.contains("vp")
        || s.contains("president")
    {
        "EXECUTIVE"
    } else if s.contains("manage") || s.contains("lead") || s.contains("head") {
        "MANAGEMENT"
    } else if s.contains("engineer") || s.contains("developer") || s.contains("architect") {
        "ENGINEERING"
    } else if s.contains("design") {
        "DESIGN"
    } else if s.contains("sales") || s.contains("account") {
        "SALES"
    } else if s.contains("market") {
        "MARKETING"
    } else if s.contains("hr") || s.contains("people") || s.contains("talent") {
        "HR"
    } else {
        "OTHER"
    }
}

/// Map a plan name to a plan category
pub fn plan_category(plan: &str) -> &'static str {
    let s = plan.trim().to_lowercase();
    if s.is_empty() {
        return "OTHER";
    }
    if s.contains("free") || s.contains("trial") {
        "FREE"
    } else if s.contains("enterprise") || s.contains("custom") {
        "ENTERPRISE"
    } else if s.contains("pro") || s.contains("premium") || s.contains("business") {
        "PROFESSIONAL"
    } else if s.contains("basic") || s.contains("starter") || s.contains("standard") {
        "BASIC"
    } else {
        "OTHER"
    }
}

/// Map a device string or user agent to a device category
pub fn device_category(device: &str) -> &'static str {
    let s = device.trim().to_lowercase();
    if s.is_empty() {
        return "OTHER";
    }
    if s.contains("mobile") || s.contains("iphone") || s.contains("android")
        || s.contains("phone")
    {
        "MOBILE"
    } else if s.contains("tablet") || s.contains("ipad") {
        "TABLET"
    } else if s.contains("desktop") || s.contains("windows") || s.contains("macintosh")
        || s.contains("mac os") || s.contains("linux") || s.contains("x11")
    {
        "DESKTOP"
    } else {
        "OTHER"
    }
}

/// Map a browser string or user agent to a browser category
///
/// Chrome is checked before Safari because Chrome user agents advertise
/// Safari compatibility.
pub fn browser_category(browser: &str) -> &'static str {
    let s = browser.trim().to_lowercase();
    if s.is_empty() {
        return "OTHER";
    }
    if s.contains("edg") {
        "EDGE"
    } else if s.contains("chrome") || s.contains("chromium") {
        "CHROME"
    } else if s.contains("firefox") {
        "FIREFOX"
    } else if s.contains("safari") {
        "SAFARI"
    } else {
        "OTHER"
    }
}
