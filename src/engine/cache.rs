//! Process-wide handler-info cache: across a `reload`, a handler whose
//! config text is byte-for-byte unchanged keeps its already-parsed
//! [`Params`] instead of re-parsing, and (in `group.rs`) keeps its already
//! built instance instead of being recreated.

use std::collections::HashMap;

use crate::config::{HandlerConfig, RootConfig};
use crate::handlers::Params;

/// One handler's cached parse result, keyed by `(group name, handler name)`.
///
/// `raw_description_2` covers state a handler's own config text cannot
/// express: `BandResampler`'s `freqList` option names a top-level
/// `FreqList-<N>` entry, so the *referenced* text must also be compared —
/// otherwise editing a shared frequency list without touching the handler
/// that uses it would silently keep the stale band layout.
#[derive(Debug, Clone)]
pub struct HandlerInfo {
    pub raw_description: String,
    pub raw_description_2: String,
    pub params: Params,
}

#[derive(Debug, Clone, Default)]
pub struct InfoCache {
    entries: HashMap<(String, String), HandlerInfo>,
}

impl InfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the parsed [`Params`] for `handler` within `group`, reusing
    /// the cached parse when both raw descriptions match, else parsing
    /// fresh and replacing the cache entry.
    pub fn resolve(
        &mut self,
        group: &str,
        handler: &HandlerConfig,
        freq_lists: &HashMap<String, String>,
    ) -> crate::error::HandlerResult<Params> {
        let key = (group.to_string(), handler.name.clone());
        let raw_description = handler.raw_description();
        let raw_description_2 = resolve_freq_list_text(handler, freq_lists).unwrap_or_default();

        if let Some(cached) = self.entries.get(&key) {
            if cached.raw_description == raw_description && cached.raw_description_2 == raw_description_2 {
                return Ok(cached.params.clone());
            }
        }

        let effective = effective_config(handler, freq_lists);
        let params = Params::parse(&handler.kind, &handler.name, &effective)?;
        self.entries.insert(
            key,
            HandlerInfo {
                raw_description,
                raw_description_2,
                params: params.clone(),
            },
        );
        Ok(params)
    }

    /// Drops cache entries for groups no longer present in `config`, so a
    /// removed-then-re-added group starts clean rather than inheriting a
    /// stale handler's cached params under a name it happens to reuse.
    pub fn retain_groups(&mut self, config: &RootConfig) {
        let live: std::collections::HashSet<&str> = config.processing.iter().map(|g| g.name.as_str()).collect();
        self.entries.retain(|(group, _), _| live.contains(group.as_str()));
    }
}

fn resolve_freq_list_text(handler: &HandlerConfig, freq_lists: &HashMap<String, String>) -> Option<String> {
    let name = handler.get_str("freqList")?;
    freq_lists.get(name).cloned()
}

/// Clones `handler` and, if it names a `freqList` but has no inline `bands`
/// option, patches in the referenced text as `bands` so the rest of the
/// handler layer never has to know about the indirection.
fn effective_config(handler: &HandlerConfig, freq_lists: &HashMap<String, String>) -> HandlerConfig {
    let mut effective = handler.clone();
    if effective.get_str("bands").is_none() {
        if let Some(text) = resolve_freq_list_text(handler, freq_lists) {
            effective.options.insert("bands".to_string(), toml::Value::String(text));
        }
    }
    effective
}
