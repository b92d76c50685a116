//! Origin guard: host allow-listing for dynamically obtained URLs.
//!
//! Caption-track and audio-stream URLs are taken from untrusted upstream
//! responses. Every one of them is checked against a small allow-list
//! before any request is made, so a tampered response cannot steer the
//! pipeline into fetching arbitrary origins.

use url::Url;

use crate::error::{PipelineError, PipelineResult};

/// Hosts the upstream provider legitimately serves captions and media from.
/// A host passes if it equals an entry or is a subdomain of one.
pub const ALLOWED_HOSTS: &[&str] = &[
    "youtube.com",
    "googlevideo.com",
    "ytimg.com",
    "googleapis.com",
];

/// Validate a URL obtained from an upstream response. Returns the parsed
/// URL on success so callers fetch exactly what was checked.
pub fn ensure_allowed(raw: &str) -> PipelineResult<Url> {
    let parsed = Url::parse(raw).map_err(|_| PipelineError::OriginRejected {
        host: raw.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PipelineError::OriginRejected {
            host: raw.to_string(),
        });
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| PipelineError::OriginRejected {
            host: raw.to_string(),
        })?;

    if ALLOWED_HOSTS
        .iter()
        .any(|allowed| host_matches(host, allowed))
    {
        Ok(parsed)
    } else {
        Err(PipelineError::OriginRejected {
            host: host.to_string(),
        })
    }
}

fn host_matches(host: &str, allowed: &str) -> bool {
    host == allowed || host.ends_with(&format!(".{allowed}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exact_and_subdomain_hosts() {
        assert!(ensure_allowed("https://youtube.com/watch?v=abc").is_ok());
        assert!(ensure_allowed("https://www.youtube.com/api/timedtext?v=abc").is_ok());
        assert!(ensure_allowed("https://rr3---sn-abc.googlevideo.com/videoplayback?x=1").is_ok());
    }

    #[test]
    fn rejects_untrusted_hosts() {
        // Shape-identical URL on a hostile host must still fail.
        assert!(ensure_allowed("https://evil.example.com/api/timedtext?v=abc").is_err());
        // Suffix tricks are not subdomains.
        assert!(ensure_allowed("https://notyoutube.com/watch").is_err());
        assert!(ensure_allowed("https://youtube.com.evil.example/watch").is_err());
    }

    #[test]
    fn rejects_non_http_schemes_and_garbage() {
        assert!(ensure_allowed("file:///etc/passwd").is_err());
        assert!(ensure_allowed("not a url").is_err());
    }
}
