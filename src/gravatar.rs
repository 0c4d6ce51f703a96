use anyhow::Context;
use sha2::{Digest, Sha256};

/// Hex digest Gravatar keys avatars by: SHA-256 of the trimmed,
/// lowercased address.
pub fn email_hash(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Look up a Gravatar image for the address. Returns the image URL only if
/// one actually exists (`d=404` makes Gravatar answer 404 for unknown
/// addresses). Callers treat failure as "no avatar", never as fatal.
pub async fn lookup(http: &reqwest::Client, email: &str) -> anyhow::Result<String> {
    let url = format!("https://www.gravatar.com/avatar/{}?d=404", email_hash(email));
    let response = http.get(&url).send().await.context("gravatar request")?;
    if !response.status().is_success() {
        anyhow::bail!("no gravatar for address (status {})", response.status());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_normalized() {
        assert_eq!(email_hash("Borys@Gmail.com "), email_hash("borys@gmail.com"));
    }

    #[test]
    fn hash_is_hex_sha256() {
        let hash = email_hash("bj@gmail.com");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
