use std::collections::BTreeMap;
use std::future::Future;
use tracing::{info, warn};

use crate::commands::api::{RobloxClient, UsernameMatch};
use crate::error::{DownloaderError, Result};

/// The username endpoint accepts at most this many names per request.
const LOOKUP_BATCH: usize = 10;

/// Anything that can turn one username into a user ID.
pub trait UsernameLookup {
    fn lookup_username(&self, name: &str) -> impl Future<Output = Result<Option<u64>>>;
}

impl UsernameLookup for RobloxClient {
    async fn lookup_username(&self, name: &str) -> Result<Option<u64>> {
        let hits = self.lookup_usernames(&[name.to_string()]).await?;
        Ok(hits.first().map(|hit| hit.id))
    }
}

fn is_numeric(input: &str) -> bool {
    !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit())
}

/// A bare run of ASCII digits is taken as a user ID without asking the API.
pub fn parse_user_id(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if !is_numeric(trimmed) {
        return None;
    }
    trimmed.parse().ok()
}

/// Splits CLI arguments on commas: `a,b c` → `["a", "b", "c"]`.
pub fn split_user_args(args: &[String]) -> Vec<String> {
    args.iter()
        .flat_map(|arg| arg.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Numeric inputs resolve locally; anything else costs exactly one lookup.
pub async fn resolve_user_input<L: UsernameLookup>(lookup: &L, input: &str) -> Result<u64> {
    let trimmed = input.trim();
    if let Some(id) = parse_user_id(trimmed) {
        return Ok(id);
    }
    if trimmed.is_empty() {
        return Err(DownloaderError::UserNotFound(String::new()));
    }
    if is_numeric(trimmed) {
        return Err(DownloaderError::Custom(format!(
            "User ID {trimmed} is out of range"
        )));
    }

    match lookup.lookup_username(trimmed).await? {
        Some(id) => {
            info!("Resolved '{trimmed}' to user ID {id}");
            Ok(id)
        }
        None => Err(DownloaderError::UserNotFound(trimmed.to_string())),
    }
}

#[derive(Debug, Default)]
pub struct BatchResolution {
    /// `(input, user_id)` in input order.
    pub resolved: Vec<(String, u64)>,
    /// Inputs that could not be resolved, with the reason.
    pub skipped: Vec<(String, String)>,
}

/// Resolves every input independently. Failures are logged and skipped.
pub async fn resolve_batch<L: UsernameLookup>(lookup: &L, inputs: &[String]) -> BatchResolution {
    let mut out = BatchResolution::default();
    for input in inputs {
        match resolve_user_input(lookup, input).await {
            Ok(id) => out.resolved.push((input.clone(), id)),
            Err(e) => {
                warn!("Skipping '{input}': {e}");
                out.skipped.push((input.clone(), e.to_string()));
            }
        }
    }
    out
}

/// Looks up many usernames, 10 per request. Keys are the names as given;
/// `None` marks a name the API did not return.
pub async fn lookup_many(
    client: &RobloxClient,
    names: &[String],
) -> BTreeMap<String, Option<UsernameMatch>> {
    let mut out = BTreeMap::new();
    for chunk in names.chunks(LOOKUP_BATCH) {
        let hits = match client.lookup_usernames(chunk).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Username lookup failed for {chunk:?}: {e}");
                Vec::new()
            }
        };
        for name in chunk {
            out.insert(name.clone(), match_requested(&hits, name));
        }
    }
    out
}

fn match_requested(hits: &[UsernameMatch], name: &str) -> Option<UsernameMatch> {
    hits.iter()
        .find(|hit| {
            hit.requested_username.eq_ignore_ascii_case(name) || hit.name.eq_ignore_ascii_case(name)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct CountingLookup {
        known: HashMap<String, u64>,
        calls: RefCell<Vec<String>>,
    }

    impl CountingLookup {
        fn new(known: &[(&str, u64)]) -> Self {
            Self {
                known: known.iter().map(|(n, id)| (n.to_string(), *id)).collect(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl UsernameLookup for CountingLookup {
        async fn lookup_username(&self, name: &str) -> Result<Option<u64>> {
            self.calls.borrow_mut().push(name.to_string());
            Ok(self.known.get(name).copied())
        }
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id("156"), Some(156));
        assert_eq!(parse_user_id("  42 "), Some(42));
        assert_eq!(parse_user_id(""), None);
        assert_eq!(parse_user_id("builderman"), None);
        assert_eq!(parse_user_id("-5"), None);
        assert_eq!(parse_user_id("12a"), None);
    }

    #[test]
    fn test_split_user_args() {
        let args = vec!["156, builderman".to_string(), ",,roblox".to_string()];
        assert_eq!(split_user_args(&args), vec!["156", "builderman", "roblox"]);
    }

    #[tokio::test]
    async fn test_numeric_input_skips_lookup() {
        let lookup = CountingLookup::new(&[]);
        assert_eq!(resolve_user_input(&lookup, "156").await.unwrap(), 156);
        assert!(lookup.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_id_skips_lookup() {
        let lookup = CountingLookup::new(&[("99999999999999999999", 1)]);
        assert_eq!(parse_user_id("99999999999999999999"), None);

        let err = resolve_user_input(&lookup, "99999999999999999999")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloaderError::Custom(ref m) if m.contains("out of range")));
        assert!(lookup.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_username() {
        let lookup = CountingLookup::new(&[]);
        let err = resolve_user_input(&lookup, "nobody").await.unwrap_err();
        assert!(matches!(err, DownloaderError::UserNotFound(ref n) if n == "nobody"));
    }

    #[tokio::test]
    async fn test_batch_one_lookup_per_username() {
        let lookup = CountingLookup::new(&[("builderman", 156), ("roblox", 1)]);
        let inputs: Vec<String> = ["156", "builderman", "ghost", "2", "roblox"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let result = resolve_batch(&lookup, &inputs).await;

        assert_eq!(
            result.resolved,
            vec![
                ("156".to_string(), 156),
                ("builderman".to_string(), 156),
                ("2".to_string(), 2),
                ("roblox".to_string(), 1),
            ]
        );
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].0, "ghost");
        assert_eq!(*lookup.calls.borrow(), vec!["builderman", "ghost", "roblox"]);
    }

    #[test]
    fn test_match_requested_ignores_case() {
        let hits = vec![UsernameMatch {
            requested_username: "BuilderMan".into(),
            id: 156,
            name: "builderman".into(),
            display_name: "Builderman".into(),
        }];
        assert_eq!(match_requested(&hits, "builderman").map(|h| h.id), Some(156));
        assert_eq!(match_requested(&hits, "BUILDERMAN").map(|h| h.id), Some(156));
        assert!(match_requested(&hits, "roblox").is_none());
    }
}
