use std::path::Path;

use log::{debug, info, warn};
use tokio::fs;

use crate::client::{Authenticated, OreillyClient};

/// Size tokens of the cover CDN, checked in this order.
const SIZE_TOKENS: [&str; 11] = [
    "1200w", "800w", "600w", "600w-proxy", "500w", "400w", "200w", "large", "medium", "small",
    "thumb",
];
const PREFERRED_SIZE: &str = "600w";

/// Urls worth trying for a cover, best first.
pub fn cover_variants(url: &str) -> Vec<String> {
    let preferred = match SIZE_TOKENS.iter().find(|token| url.contains(*token)) {
        Some(token) => url.replace(token, PREFERRED_SIZE),
        None => format!("{}/{}/", url.trim_end_matches('/'), PREFERRED_SIZE),
    };

    if preferred == url {
        vec![preferred]
    } else {
        vec![preferred, url.to_string()]
    }
}

pub fn cover_filename(url: &str) -> &'static str {
    if url.contains(".png") {
        "cover.png"
    } else {
        "cover.jpg"
    }
}

/// Downloads the first variant of `url` that answers with success into
/// `images_dir`, returning the saved file name.
pub async fn download_cover(
    client: &OreillyClient<Authenticated>,
    url: &str,
    images_dir: &Path,
) -> Option<String> {
    for variant in cover_variants(url) {
        let response = match client.get(&variant).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                debug!("Cover variant {} returned {}", variant, response.status);
                continue;
            }
            Err(err) => {
                debug!("Cover variant {} failed: {}", variant, err);
                continue;
            }
        };

        let filename = cover_filename(&variant);
        if let Err(err) = fs::write(images_dir.join(filename), &response.body).await {
            warn!("Failed to save cover: {}", err);
            continue;
        }

        info!("Saved cover ({} KB): {}", response.body.len() / 1024, filename);
        return Some(filename.to_string());
    }

    warn!("Failed to download cover from any variant of {}", url);
    None
}
