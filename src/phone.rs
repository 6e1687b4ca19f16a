use rlibphonenumber::{region_code::RegionCode, PhoneNumberFormat, PHONE_NUMBER_UTIL};

pub const MISSING: &str = "N/A";

/// Render a stored phone number for display in the national format of
/// `region`. Numbers that do not parse are shown exactly as stored.
pub fn format_phone(value: Option<&str>, region: &str) -> String {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return MISSING.to_string();
    };

    let util = &*PHONE_NUMBER_UTIL;
    let region = if region.trim().is_empty() {
        RegionCode::get_unknown()
    } else {
        region.trim()
    };

    match util.parse(raw, region) {
        Ok(parsed) => util
            .format(&parsed, PhoneNumberFormat::National)
            .into_owned(),
        Err(_) => raw.to_string(),
    }
}
