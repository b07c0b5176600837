//! C-line credential records: extraction from pasted text and test-order
//! arrangement.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

// Anchored, case-insensitive `C: host port user pass`. Fields are runs of
// non-whitespace; anything after the password is ignored.
static CLINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[Cc]:[ \t]+([^ \t]+)[ \t]+([0-9]+)[ \t]+([^ \t]+)[ \t]+([^ \t]+)")
        .expect("cline regex")
});

/// One relay-server credential. Identity is the full 4-tuple; the same
/// (host, port) may appear with several username/password pairs and each
/// entry is tested on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Credential {
    /// Parses a single line of text. Returns `None` for anything that is not
    /// a C-line, including ports outside 1–65535.
    pub fn parse_line(line: &str) -> Option<Credential> {
        let caps = CLINE_RE.captures(line.trim())?;
        let port: u16 = caps[2].parse().ok()?;
        if port == 0 {
            return None;
        }
        Some(Credential {
            host: caps[1].to_string(),
            port,
            username: caps[3].to_string(),
            password: caps[4].to_string(),
        })
    }

    /// Structural gate run before any socket is opened.
    pub(crate) fn well_formed(&self) -> Result<(), &'static str> {
        if self.host.trim().is_empty() {
            return Err("empty host");
        }
        if self.port == 0 {
            return Err("port out of range");
        }
        if self.username.is_empty() {
            return Err("empty username");
        }
        Ok(())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C: {} {} {} {}",
            self.host, self.port, self.username, self.password
        )
    }
}

/// Result of scanning pasted text for C-lines.
pub struct ParsedInput {
    pub credentials: Vec<Credential>,
    /// Non-empty lines that did not yield a credential.
    pub skipped: usize,
}

/// Scans text line by line, keeping every recognized C-line and counting the
/// junk (comments, prose, malformed lines) that was passed over.
pub fn parse_text(text: &str) -> ParsedInput {
    let mut credentials = Vec::new();
    let mut skipped = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match Credential::parse_line(line) {
            Some(credential) => credentials.push(credential),
            None => skipped += 1,
        }
    }
    ParsedInput {
        credentials,
        skipped,
    }
}

/// Sorts credentials and keeps entries for the same (host, port) contiguous.
/// With `shuffle` the candidates within each server group are randomized,
/// which varies the username/password order when a list was scraped off a
/// website.
pub fn order_credentials(mut credentials: Vec<Credential>, shuffle: bool) -> Vec<Credential> {
    credentials.sort_by(|a, b| {
        (&a.host, a.port, &a.username, &a.password).cmp(&(
            &b.host,
            b.port,
            &b.username,
            &b.password,
        ))
    });
    if shuffle {
        use rand::seq::SliceRandom;

        let mut rng = rand::rng();
        let mut start = 0;
        while start < credentials.len() {
            let mut end = start + 1;
            while end < credentials.len()
                && credentials[end].host == credentials[start].host
                && credentials[end].port == credentials[start].port
            {
                end += 1;
            }
            credentials[start..end].shuffle(&mut rng);
            start = end;
        }
    }
    credentials
}
