use rand::Rng;

/// Fingerprint configuration for anti-detection.
///
/// Tuned for Japanese corporate sites: a desktop Chrome user agent with a
/// `ja-JP` language preference and the Tokyo timezone.
#[derive(Debug, Clone)]
pub struct FingerprintConfig {
    pub user_agent: String,
    pub language: String,
    pub timezone: String,
}

impl FingerprintConfig {
    /// Generate a randomized fingerprint for a Japanese desktop visitor
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();

        // Platform token varies, browser stays a current desktop Chrome
        let platforms = [
            "Windows NT 10.0; Win64; x64",
            "Macintosh; Intel Mac OS X 10_15_7",
            "X11; Linux x86_64",
        ];
        let platform = platforms[rng.gen_range(0..platforms.len())];

        Self {
            user_agent: format!(
                "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            ),
            language: "ja-JP".to_string(),
            timezone: "Asia/Tokyo".to_string(),
        }
    }
}
