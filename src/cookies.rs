//! Loads the browser session exported as JSON into a name -> value map.
//!
//! Three export layouts are understood, tried in this order:
//! - J2Team Cookies: `{"url": "...", "cookies": [{"name": .., "value": ..}]}`
//! - browser extension export: `[{"name": .., "value": .., "domain": ..}]`
//! - Cookie-Editor flat map: `{"name": "value"}`

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::{Result, SboError};

#[derive(Deserialize)]
struct CookieEntry {
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
struct J2TeamExport {
    #[serde(default)]
    cookies: Vec<CookieEntry>,
}

fn into_map(entries: Vec<CookieEntry>) -> HashMap<String, String> {
    entries.into_iter().map(|c| (c.name, c.value)).collect()
}

pub fn parse_cookies(data: &str) -> Result<HashMap<String, String>> {
    if let Ok(export) = serde_json::from_str::<J2TeamExport>(data) {
        if !export.cookies.is_empty() {
            debug!("Cookies are in J2Team format");
            return Ok(into_map(export.cookies));
        }
    }

    if let Ok(entries) = serde_json::from_str::<Vec<CookieEntry>>(data) {
        if !entries.is_empty() {
            debug!("Cookies are in browser export format");
            return Ok(into_map(entries));
        }
    }

    let cookies = serde_json::from_str::<HashMap<String, String>>(data).map_err(|_| {
        SboError::AuthenticationFailed(
            "unsupported cookie format: expected J2Team, browser export or Cookie-Editor json"
                .to_string(),
        )
    })?;

    if cookies.is_empty() {
        return Err(SboError::AuthenticationFailed(
            "cookies file is empty".to_string(),
        ));
    }

    Ok(cookies)
}

pub fn load_cookies<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|err| {
        SboError::AuthenticationFailed(format!(
            "unable to read cookies file {}: {}",
            path.display(),
            err
        ))
    })?;
    parse_cookies(&data)
}
