//! Rendering tested C-lines as Hadu `[Serv]` blocks. Failed lines are kept
//! but commented out with `;`, so the generated file documents what was
//! tried.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::cline::Credential;

static SLUG_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("slug strip regex"));
static SLUG_COLLAPSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-\s]+").expect("slug collapse regex"));

/// Lowercase ASCII slug: keeps alphanumerics and underscores, folds runs of
/// spaces/hyphens into a single hyphen, drops everything else.
pub fn slugify(value: &str) -> String {
    let ascii: String = value.chars().filter(char::is_ascii).collect();
    let stripped = SLUG_STRIP_RE.replace_all(&ascii, "");
    let trimmed = stripped.trim().to_lowercase();
    SLUG_COLLAPSE_RE.replace_all(&trimmed, "-").into_owned()
}

/// One `[Serv]` block. `n` is the 0-based position of the credential in the
/// batch; `active` controls the `;` comment prefix.
pub fn render_entry(n: usize, credential: &Credential, active: bool) -> String {
    let comment = if active { "" } else { ";" };
    format!(
        "{comment}[Serv_{n}_{slug}]\n\
         {comment}Server=CCCam:{host}:{port}:0:{user}:{pw}\n\
         {comment}Active=1\n",
        comment = comment,
        n = n,
        slug = slugify(&credential.host),
        host = credential.host,
        port = credential.port,
        user = credential.username,
        pw = credential.password,
    )
}

/// Renders the whole batch, one blank line between blocks.
pub fn render<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a Credential, bool)>,
{
    let blocks: Vec<String> = entries
        .into_iter()
        .enumerate()
        .map(|(n, (credential, active))| render_entry(n, credential, active))
        .collect();
    blocks.join("\n")
}
