use url::Url;

const FALLBACK_FILE_NAME: &str = "data";

/// Name of the output file for `url`: its last path segment, or `data` when
/// the path ends with a slash.
pub fn file_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(url: &str) -> String {
        file_name_from_url(&Url::parse(url).unwrap())
    }

    #[test]
    fn should_take_last_segment() {
        assert_eq!(name("https://example.com/files/video.mkv"), "video.mkv");
        assert_eq!(name("https://example.com/files/video.mkv?token=1#t"), "video.mkv");
        assert_eq!(name("https://example.com/a%20b.iso"), "a%20b.iso");
    }

    #[test]
    fn should_fall_back_to_data() {
        assert_eq!(name("https://example.com/"), "data");
        assert_eq!(name("https://example.com"), "data");
        assert_eq!(name("https://example.com/files/"), "data");
    }
}
