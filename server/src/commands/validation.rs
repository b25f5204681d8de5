/// Longest image URL a record may carry.
pub const MAX_IMAGE_URL_LEN: usize = 2048;

const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

/// An `https://` URL to a jpg, jpeg, png or gif, compared case-insensitively.
pub fn is_valid_image_url(url: &str) -> bool {
    if url.is_empty() || url.len() > MAX_IMAGE_URL_LEN {
        return false;
    }

    let lower = url.to_ascii_lowercase();
    let Some(rest) = lower.strip_prefix("https://") else {
        return false;
    };

    IMAGE_EXTENSIONS.iter().any(|ext| rest.ends_with(ext))
}
