use serde::{Deserialize, Serialize};

pub const OFFICIAL_API_BASE: &str = "https://go.dev/dl/?mode=json&include=all";
pub const OFFICIAL_DOWNLOAD_BASE: &str = "https://go.dev/dl/";
pub const REGIONAL_API_BASE: &str = "https://golang.google.cn/dl/?mode=json&include=all";
pub const REGIONAL_DOWNLOAD_BASE: &str = "https://studygolang.com/dl/golang/";

/// Country code served by the regional mirror.
const REGIONAL_COUNTRY: &str = "CN";

/// Where the release catalog and artifacts are fetched from.
///
/// Both canonical mirrors serve the catalog in the same JSON shape, so the
/// catalog client never needs mirror-specific parsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MirrorConfig {
    pub api_base: String,
    pub download_base: String,
}

impl MirrorConfig {
    pub fn new(api_base: impl Into<String>, download_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            download_base: download_base.into(),
        }
    }

    /// go.dev, used everywhere except the regional mirror's country.
    pub fn official() -> Self {
        Self::new(OFFICIAL_API_BASE, OFFICIAL_DOWNLOAD_BASE)
    }

    pub fn regional() -> Self {
        Self::new(REGIONAL_API_BASE, REGIONAL_DOWNLOAD_BASE)
    }

    /// Artifact URL: the download base and file name concatenated verbatim.
    pub fn download_url(&self, file_name: &str) -> String {
        format!("{}{}", self.download_base, file_name)
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self::official()
    }
}

/// Map a country code to a mirror. Empty input (a failed probe) gets the default.
pub fn select_mirror(country_code: &str) -> MirrorConfig {
    if country_code.trim().eq_ignore_ascii_case(REGIONAL_COUNTRY) {
        MirrorConfig::regional()
    } else {
        MirrorConfig::official()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_mirror() {
        for code in ["CN", "cn", "  cn  ", "\tCn\n"] {
            assert_eq!(select_mirror(code), MirrorConfig::regional(), "{:?}", code);
        }
        for code in ["US", "", "  ", "CNX", "DE"] {
            assert_eq!(select_mirror(code), MirrorConfig::official(), "{:?}", code);
        }
    }

    #[test]
    fn test_download_url_is_verbatim_concat() {
        let mirror = MirrorConfig::regional();
        assert_eq!(
            mirror.download_url("go1.21.0.linux-amd64.tar.gz"),
            "https://studygolang.com/dl/golang/go1.21.0.linux-amd64.tar.gz"
        );
    }
}
