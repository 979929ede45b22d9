/// Domains of throwaway mailbox providers. Matched as substrings of the
/// email's domain, so subdomains and regional variants are caught too.
pub const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "guerrillamail.com",
    "guerrillamail.net",
    "sharklasers.com",
    "mailinator.com",
    "tempmail.org",
    "temp-mail.org",
    "tempmail.com",
    "throwaway.email",
    "yopmail.com",
    "maildrop.cc",
    "getnada.com",
    "trashmail.com",
    "fakeinbox.com",
    "dispostable.com",
    "mintemail.com",
    "mohmal.com",
    "emailondeck.com",
];

/// Whether the email's domain belongs to a known disposable provider.
///
/// The domain is everything after the last `@`, compared case-insensitively.
/// An address with no `@` is never disposable.
pub fn is_disposable_email(email: &str) -> bool {
    let Some((_, domain)) = email.rsplit_once('@') else {
        return false;
    };
    let domain = domain.trim().to_lowercase();
    if domain.is_empty() {
        return false;
    }

    DISPOSABLE_DOMAINS.iter().any(|d| domain.contains(d))
}
