//! Format checks for the credentials and account handles the dashboard collects.
//!
//! These are advisory: the store accepts any key, the settings panel calls
//! `/settings/validate` before saving to catch obvious paste mistakes.

use once_cell::sync::Lazy;
use regex::Regex;

static AYRSHARE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{8}-[A-Z0-9]{8}-[A-Z0-9]{8}-[A-Z0-9]{8}$").unwrap());
static INSTAGRAM_USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._]{1,30}$").unwrap());
static TWITTER_HANDLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@?[a-zA-Z0-9_]{1,15}$").unwrap());
static TIKTOK_USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@?[a-zA-Z0-9._]{2,24}$").unwrap());
static BLUESKY_HANDLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@?[a-zA-Z0-9.-]+$").unwrap());

/// Services whose "credential" is an account handle rather than an API key.
pub(crate) const SOCIAL_ACCOUNT_SERVICES: [&str; 6] = [
    "Instagram",
    "Facebook",
    "Twitter / X",
    "Threads",
    "TikTok",
    "Bluesky",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialFormatError {
    #[error("Invalid Claude key format (should start with sk-ant-)")]
    ClaudeKey,
    #[error("Invalid OpenAI key format (should start with sk-)")]
    OpenAiKey,
    #[error("Invalid Ayrshare key format (should be XXXXXXXX-XXXXXXXX-XXXXXXXX-XXXXXXXX)")]
    AyrshareKey,
    #[error("Invalid Instagram username format (letters, numbers, dots, underscores only)")]
    InstagramUsername,
    #[error("Facebook page name should be 2-50 characters")]
    FacebookPageName,
    #[error("Invalid Twitter handle format (@username, 1-15 characters)")]
    TwitterHandle,
    #[error("Invalid Threads username format (letters, numbers, dots, underscores only)")]
    ThreadsUsername,
    #[error("Invalid TikTok username format (@username, 2-24 characters)")]
    TikTokUsername,
    #[error("Invalid Bluesky handle format")]
    BlueskyHandle,
    #[error("Input seems too short")]
    TooShort,
}

pub(crate) fn is_social_account(service_name: &str) -> bool {
    SOCIAL_ACCOUNT_SERVICES.contains(&service_name)
}

fn char_count_between(input: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&input.chars().count())
}

pub fn validate_credential(service_name: &str, input: &str) -> Result<(), CredentialFormatError> {
    match service_name {
        "Claude AI" if !input.starts_with("sk-ant-") => Err(CredentialFormatError::ClaudeKey),
        "GPT-4" | "DALL-E 3" if !input.starts_with("sk-") => Err(CredentialFormatError::OpenAiKey),
        "Ayrshare" if !AYRSHARE_KEY.is_match(input) => Err(CredentialFormatError::AyrshareKey),
        "Instagram" if !INSTAGRAM_USERNAME.is_match(input) => {
            Err(CredentialFormatError::InstagramUsername)
        }
        "Facebook" if !char_count_between(input, 2, 50) => {
            Err(CredentialFormatError::FacebookPageName)
        }
        "Twitter / X" if !TWITTER_HANDLE.is_match(input) => Err(CredentialFormatError::TwitterHandle),
        "Threads" if !INSTAGRAM_USERNAME.is_match(input) => {
            Err(CredentialFormatError::ThreadsUsername)
        }
        "TikTok" if !TIKTOK_USERNAME.is_match(input) => Err(CredentialFormatError::TikTokUsername),
        "Bluesky" if !BLUESKY_HANDLE.is_match(input) || !char_count_between(input, 2, 50) => {
            Err(CredentialFormatError::BlueskyHandle)
        }
        "Claude AI" | "GPT-4" | "DALL-E 3" | "Ayrshare" | "Instagram" | "Facebook"
        | "Twitter / X" | "Threads" | "TikTok" | "Bluesky" => Ok(()),
        _ if input.chars().count() < 2 => Err(CredentialFormatError::TooShort),
        _ => Ok(()),
    }
}

/// Message shown when a credential passes [`validate_credential`].
pub(crate) fn success_message(service_name: &str) -> String {
    if is_social_account(service_name) {
        "Account info validated".to_string()
    } else {
        format!("Connection to {service_name} successful")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_provider_prefixes() {
        assert_eq!(validate_credential("Claude AI", "sk-ant-abc123"), Ok(()));
        assert_eq!(
            validate_credential("Claude AI", "sk-abc123"),
            Err(CredentialFormatError::ClaudeKey)
        );
        assert_eq!(validate_credential("GPT-4", "sk-proj-123"), Ok(()));
        assert_eq!(
            validate_credential("DALL-E 3", "pk-123"),
            Err(CredentialFormatError::OpenAiKey)
        );
    }

    #[test]
    fn ayrshare_key_shape() {
        assert_eq!(
            validate_credential("Ayrshare", "ABCD1234-EFGH5678-IJKL9012-MNOP3456"),
            Ok(())
        );
        assert_eq!(
            validate_credential("Ayrshare", "abcd1234-efgh5678-ijkl9012-mnop3456"),
            Err(CredentialFormatError::AyrshareKey)
        );
        assert_eq!(
            validate_credential("Ayrshare", "ABCD1234-EFGH5678-IJKL9012"),
            Err(CredentialFormatError::AyrshareKey)
        );
    }

    #[test]
    fn social_handles() {
        assert_eq!(validate_credential("Instagram", "author.books_1"), Ok(()));
        assert_eq!(
            validate_credential("Instagram", "author books"),
            Err(CredentialFormatError::InstagramUsername)
        );
        assert_eq!(validate_credential("Twitter / X", "@author_1"), Ok(()));
        assert_eq!(
            validate_credential("Twitter / X", "@a_handle_that_is_too_long"),
            Err(CredentialFormatError::TwitterHandle)
        );
        assert_eq!(
            validate_credential("Threads", ""),
            Err(CredentialFormatError::ThreadsUsername)
        );
        assert_eq!(
            validate_credential("TikTok", "@a"),
            Err(CredentialFormatError::TikTokUsername)
        );
        assert_eq!(validate_credential("Bluesky", "@author.bsky.social"), Ok(()));
        assert_eq!(
            validate_credential("Bluesky", "a"),
            Err(CredentialFormatError::BlueskyHandle)
        );
        assert_eq!(validate_credential("Facebook", "My Author Page"), Ok(()));
        assert_eq!(
            validate_credential("Facebook", "x"),
            Err(CredentialFormatError::FacebookPageName)
        );
    }

    #[test]
    fn unknown_services_only_need_two_chars() {
        assert_eq!(validate_credential("Mailchimp", "ab"), Ok(()));
        assert_eq!(
            validate_credential("Mailchimp", "a"),
            Err(CredentialFormatError::TooShort)
        );
    }

    #[test]
    fn success_message_depends_on_service_kind() {
        assert_eq!(success_message("Instagram"), "Account info validated");
        assert_eq!(
            success_message("Claude AI"),
            "Connection to Claude AI successful"
        );
    }
}
