//! A single `Processing-<N>` group: one channel set, one handler graph
//! topology (shared across every channel in the set, instantiated once per
//! channel so no state is shared), and the per-tick driving logic described
//! by the handler-graph construction rules.

use std::collections::HashMap;
use std::time::Instant;

use crate::channel::{Channel, ChannelSet};
use crate::config::{HandlerConfig, ProcessingGroupConfig};
use crate::dsp::biquad::BiquadCascade;
use crate::dsp::interpolation;
use crate::engine::cache::InfoCache;
use crate::error::{GraphError, GraphResult, HandlerError};
use crate::handlers::{find_node, process_nodes, purge_nodes, Handler, HandlerNode, Params};
use crate::logging::{ComponentLogger, LogContext};

/// Used when a group config omits `granularity`: a 50 ms batch is small
/// enough for responsive metering without driving the handler graph on
/// every single incoming frame.
const DEFAULT_GRANULARITY_SECS: f32 = 0.05;

struct ChannelState {
    nodes: Vec<HandlerNode>,
    filter: BiquadCascade,
    pending: Vec<f32>,
    resample_pos: f32,
    resample_prev: f32,
}

impl ChannelState {
    fn empty(filter: BiquadCascade) -> Self {
        Self {
            nodes: Vec::new(),
            filter,
            pending: Vec::new(),
            resample_pos: 0.0,
            resample_prev: 0.0,
        }
    }
}

/// One named handler entry resolved against the process-wide [`InfoCache`]:
/// its declared name, its declared source name (`None` for root handlers),
/// and its parsed [`Params`].
type ResolvedEntry = (String, Option<String>, Params);

pub struct ProcessingGroup {
    name: String,
    channel_set: ChannelSet,
    target_rate: u32,
    granularity_secs: f32,
    filter_desc: String,
    block_size: usize,
    entries: Vec<ResolvedEntry>,
    channels: HashMap<Channel, ChannelState>,
    log: LogContext,
}

impl ComponentLogger for ProcessingGroup {
    fn log_context(&self) -> LogContext {
        self.log.clone().with_group(self.name.clone())
    }
}

impl ProcessingGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds (or rebuilds, reusing `previous`'s live handler instances
    /// where their params and topology are unchanged) one processing group
    /// from its config section. Individual handler failures are logged and
    /// that handler — and anything sourcing from it — is simply left out of
    /// the graph; only a structurally invalid group (bad channel set,
    /// duplicate handler name) is rejected outright.
    pub fn build(
        config: &ProcessingGroupConfig,
        default_target_rate: u32,
        info_cache: &mut InfoCache,
        freq_lists: &HashMap<String, String>,
        previous: Option<ProcessingGroup>,
    ) -> GraphResult<ProcessingGroup> {
        let channel_set = ChannelSet::parse(&config.channels)
            .ok_or_else(|| GraphError::InvalidChannelSet { group: config.name.clone() })?;

        check_no_duplicates(config)?;

        let target_rate = config.target_rate.unwrap_or(default_target_rate).max(1);
        let granularity_secs = config.granularity.unwrap_or(DEFAULT_GRANULARITY_SECS).max(0.001);
        let filter_desc = config.filter.clone().unwrap_or_default();
        let block_size = (granularity_secs * target_rate as f32).round().max(1.0) as usize;

        let entries = resolve_entries(&config.name, &config.handlers, info_cache, freq_lists);

        // The filter chain keeps its running IIR state across a reload only
        // when its descriptor and effective sample rate are unchanged —
        // otherwise the old coefficients would be meaningless against the
        // new ones' state buffer.
        let reuse_filter = previous
            .as_ref()
            .is_some_and(|p| p.filter_desc == filter_desc && p.target_rate == target_rate);
        let mut old_channels = previous.map(|p| p.channels).unwrap_or_default();

        let mut channels = HashMap::new();
        for declared in channel_set.iter().copied() {
            let old_state = old_channels.remove(&declared);
            let (old_nodes, old_filter) = match old_state {
                Some(state) => (state.nodes, Some(state.filter)),
                None => (Vec::new(), None),
            };

            let nodes = build_channel_nodes(&config.name, &entries, target_rate, old_nodes);
            let filter = match (reuse_filter, old_filter) {
                (true, Some(filter)) => filter,
                _ => BiquadCascade::parse(&filter_desc, target_rate),
            };
            let mut state = ChannelState::empty(filter);
            state.nodes = nodes;
            channels.insert(declared, state);
        }

        let group = ProcessingGroup {
            name: config.name.clone(),
            channel_set,
            target_rate,
            granularity_secs,
            filter_desc,
            block_size,
            entries,
            channels,
            log: LogContext::new("ProcessingGroup", config.name.clone()),
        };
        group.info(&format!(
            "built with {} handler(s) across {} channel(s), target_rate={}, granularity={}s",
            group.entries.len(),
            group.channels.len(),
            group.target_rate,
            group.granularity_secs
        ));
        Ok(group)
    }

    /// Runs one external tick: de-interleaves `frames` for every channel
    /// this group is bound to, resamples to `target_rate` if needed, runs
    /// the group's filter chain, then drives the handler graph once per
    /// complete granularity block that has accumulated.
    pub fn update(&mut self, frames: &[f32], layout: &[Channel], sample_rate: u32, deadline: Instant) {
        if layout.is_empty() || sample_rate == 0 {
            return;
        }
        let frame_channels = layout.len();
        let declared_channels: Vec<Channel> = self.channel_set.iter().copied().collect();

        for declared in declared_channels {
            let actual = if declared == Channel::Auto { layout[0] } else { declared };
            let Some(pos) = layout.iter().position(|c| *c == actual) else {
                continue;
            };
            let Some(state) = self.channels.get_mut(&declared) else {
                continue;
            };

            let n = frames.len() / frame_channels;
            let raw: Vec<f32> = (0..n).map(|i| frames[i * frame_channels + pos]).collect();

            let mut samples = if self.target_rate != sample_rate {
                resample_linear(&raw, sample_rate, self.target_rate, &mut state.resample_pos, &mut state.resample_prev)
            } else {
                raw
            };
            state.filter.process(&mut samples);
            state.pending.extend_from_slice(&samples);

            purge_nodes(&mut state.nodes);
            while state.pending.len() >= self.block_size {
                let chunk: Vec<f32> = state.pending.drain(..self.block_size).collect();
                process_nodes(&mut state.nodes, &chunk, &chunk, deadline);
            }
        }
    }

    pub fn find_channel(&self, channel: Channel) -> Option<&[HandlerNode]> {
        self.channels.get(&channel).map(|s| s.nodes.as_slice())
    }

    pub fn find_handler(&self, channel: Channel, handler: &str) -> Option<&Handler> {
        let nodes = self.find_channel(channel)?;
        find_node(nodes, handler).map(|n| &n.handler)
    }
}

fn check_no_duplicates(config: &ProcessingGroupConfig) -> GraphResult<()> {
    let mut seen = std::collections::HashSet::new();
    for h in &config.handlers {
        if !seen.insert(h.name.as_str()) {
            return Err(GraphError::DuplicateHandler { group: config.name.clone(), handler: h.name.clone() });
        }
    }
    Ok(())
}

/// Parses every handler's options against the process-wide cache. A handler
/// whose options fail to parse is logged and dropped from the list; it
/// never appears as a valid source for a later handler, which (since
/// `build_channel_nodes` resolves sources purely from this list) means
/// anything depending on it drops out too.
fn resolve_entries(
    group: &str,
    handlers: &[HandlerConfig],
    info_cache: &mut InfoCache,
    freq_lists: &HashMap<String, String>,
) -> Vec<ResolvedEntry> {
    let mut entries = Vec::with_capacity(handlers.len());
    for h in handlers {
        match info_cache.resolve(group, h, freq_lists) {
            Ok(params) => entries.push((h.name.clone(), h.source.clone(), params)),
            Err(err) => {
                log::warn!("processing group '{group}': {err}");
            }
        }
    }
    entries
}

fn build_channel_nodes(
    group: &str,
    entries: &[ResolvedEntry],
    sample_rate: u32,
    mut old_nodes: Vec<HandlerNode>,
) -> Vec<HandlerNode> {
    let mut nodes: Vec<HandlerNode> = Vec::with_capacity(entries.len());
    let mut name_to_index: HashMap<&str, usize> = HashMap::new();

    for (name, source_name, params) in entries {
        let source_index = match source_name {
            None => {
                if !params.is_root() {
                    log::warn!(
                        "{}",
                        HandlerError::UnknownSource { handler: name.clone(), source_name: String::new() }
                    );
                    continue;
                }
                None
            }
            Some(src) => match name_to_index.get(src.as_str()) {
                Some(&ix) => Some(ix),
                None => {
                    let err = if entries.iter().any(|(n, _, _)| n == src) {
                        HandlerError::ForwardReference { handler: name.clone(), source_name: src.clone() }
                    } else {
                        HandlerError::UnknownSource { handler: name.clone(), source_name: src.clone() }
                    };
                    log::warn!("processing group '{group}': {err}");
                    continue;
                }
            },
        };

        let source_handler = source_index.map(|ix| &nodes[ix].handler);
        let reused = find_and_take(&mut old_nodes, name)
            .filter(|node| node.handler.check_same_params(params) && node.source == source_index);

        let handler = match reused {
            Some(mut node) => {
                if let Err(err) = node.handler.configure(name, sample_rate, source_handler) {
                    log::warn!("processing group '{group}': {err}");
                    continue;
                }
                node.handler
            }
            None => match Handler::new(name, params, sample_rate, source_handler) {
                Ok(h) => h,
                Err(err) => {
                    log::warn!("processing group '{group}': {err}");
                    continue;
                }
            },
        };

        let index = nodes.len();
        name_to_index.insert(name.as_str(), index);
        nodes.push(HandlerNode::new(name.clone(), source_index, handler));
    }
    nodes
}

fn find_and_take(nodes: &mut Vec<HandlerNode>, name: &str) -> Option<HandlerNode> {
    let ix = nodes.iter().position(|n| n.name == name)?;
    Some(nodes.remove(ix))
}

/// Streaming linear resampler. `pos`/`prev` persist across calls so a group
/// whose `target_rate` differs from the host's sample rate stays
/// phase-continuous from one `update` tick to the next instead of
/// re-deriving a fresh phase (and an audible click) every tick.
fn resample_linear(input: &[f32], in_rate: u32, out_rate: u32, pos: &mut f32, prev: &mut f32) -> Vec<f32> {
    if input.is_empty() || in_rate == 0 || out_rate == 0 {
        return Vec::new();
    }
    let ratio = in_rate as f32 / out_rate as f32;
    let mut virtual_wave = Vec::with_capacity(input.len() + 1);
    virtual_wave.push(*prev);
    virtual_wave.extend_from_slice(input);
    let max_index = (virtual_wave.len() - 1) as f32;

    let mut out = Vec::new();
    let mut p = *pos;
    while p <= max_index - 1.0 {
        out.push(interpolation::linear(&virtual_wave, p));
        p += ratio;
    }
    *pos = p - max_index;
    *prev = *input.last().unwrap();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RootConfig;

    fn far_deadline() -> Instant {
        Instant::now() + std::time::Duration::from_secs(10)
    }

    fn minimal_config() -> RootConfig {
        crate::config::parse(
            r#"
            target_rate = 48000

            [[processing]]
            name = "main"
            channels = "mono"

            [[processing.handlers]]
            name = "rms"
            type = "rms"
            updateRate = 60.0
            "#,
        )
        .unwrap()
    }

    #[test]
    fn builds_and_drives_a_single_root_handler() {
        let cfg = minimal_config();
        let mut cache = InfoCache::new();
        let freq_lists = HashMap::new();
        let mut group =
            ProcessingGroup::build(&cfg.processing[0], 48000, &mut cache, &freq_lists, None).unwrap();

        let frames = vec![0.5f32; 48000];
        group.update(&frames, &[Channel::Mono], 48000, far_deadline());

        let handler = group.find_handler(Channel::Mono, "rms").unwrap();
        assert!(!handler.get_chunks(0).is_empty());
    }

    #[test]
    fn duplicate_handler_name_is_rejected() {
        let cfg = crate::config::parse(
            r#"
            [[processing]]
            name = "main"
            channels = "mono"

            [[processing.handlers]]
            name = "dup"
            type = "rms"

            [[processing.handlers]]
            name = "dup"
            type = "peak"
            "#,
        )
        .unwrap();
        let mut cache = InfoCache::new();
        let freq_lists = HashMap::new();
        let err = ProcessingGroup::build(&cfg.processing[0], 48000, &mut cache, &freq_lists, None);
        assert!(err.is_err());
    }

    #[test]
    fn invalid_channel_set_is_rejected() {
        let cfg = crate::config::parse(
            r#"
            [[processing]]
            name = "main"
            channels = ""
            "#,
        )
        .unwrap();
        let mut cache = InfoCache::new();
        let freq_lists = HashMap::new();
        let err = ProcessingGroup::build(&cfg.processing[0], 48000, &mut cache, &freq_lists, None);
        assert!(err.is_err());
    }

    #[test]
    fn reload_with_identical_config_reuses_handler_instance_state() {
        let cfg = minimal_config();
        let mut cache = InfoCache::new();
        let freq_lists = HashMap::new();
        let mut group =
            ProcessingGroup::build(&cfg.processing[0], 48000, &mut cache, &freq_lists, None).unwrap();
        let frames = vec![0.5f32; 48000];
        group.update(&frames, &[Channel::Mono], 48000, far_deadline());
        let before = group
            .find_handler(Channel::Mono, "rms")
            .unwrap()
            .get_last_data(0)
            .map(|v| v.to_vec());

        let group = ProcessingGroup::build(&cfg.processing[0], 48000, &mut cache, &freq_lists, Some(group)).unwrap();
        let after = group
            .find_handler(Channel::Mono, "rms")
            .unwrap()
            .get_last_data(0)
            .map(|v| v.to_vec());
        assert_eq!(before, after, "identical reload must not reset handler state");
    }

    #[test]
    fn forward_reference_is_rejected_without_panicking() {
        let cfg = crate::config::parse(
            r#"
            [[processing]]
            name = "main"
            channels = "mono"

            [[processing.handlers]]
            name = "bands"
            type = "BandResampler"
            source = "fft"
            bands = "linear 4 0 20000"

            [[processing.handlers]]
            name = "fft"
            type = "fft"
            binWidth = 50.0
            "#,
        )
        .unwrap();
        let mut cache = InfoCache::new();
        let freq_lists = HashMap::new();
        let group = ProcessingGroup::build(&cfg.processing[0], 48000, &mut cache, &freq_lists, None).unwrap();
        assert!(group.find_handler(Channel::Mono, "bands").is_none());
        assert!(group.find_handler(Channel::Mono, "fft").is_some());
    }
}
