//! The host-facing engine: owns every processing group, drives them from
//! interleaved PCM on `update`, and answers the host's read-back and
//! lifecycle calls. This is the one object a plugin host actually holds.

pub mod cache;
pub mod group;

use std::fs::File;
use std::io::BufWriter;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::channel::Channel;
use crate::config::RootConfig;
pub use crate::error::Status;
use crate::logging::{ComponentLogger, LogContext};
use cache::InfoCache;
use group::ProcessingGroup;

/// Summary of a `reload` call, mainly useful to tests and diagnostics.
/// `groups_loaded` and `groups_rejected` count this reload's outcome only —
/// they say nothing about whether any group actually changed. A reload of
/// byte-identical config reuses every handler's running state unchanged
/// (see [`InfoCache`]) but still reports the same `groups_loaded` count as
/// any other successful reload.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReloadReport {
    pub groups_loaded: usize,
    pub groups_rejected: usize,
}

/// Host-opaque transport state toggled by [`Engine::command`]. The DSP core
/// does not interpret these beyond bookkeeping — a paused engine still
/// accepts `update` calls but its groups do not advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Stopped,
}

pub struct Engine {
    groups: Vec<ProcessingGroup>,
    info_cache: InfoCache,
    default_target_rate: u32,
    version: u32,
    run_state: RunState,
    index_offset: i64,
    status: Status,
    log: LogContext,
}

impl ComponentLogger for Engine {
    fn log_context(&self) -> LogContext {
        self.log.clone()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            info_cache: InfoCache::new(),
            default_target_rate: 48000,
            version: 0,
            run_state: RunState::Running,
            index_offset: 0,
            status: Status::NoData,
            log: LogContext::new("Engine", "core"),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// (Re)builds every processing group from `config`. A malformed group is
    /// logged and dropped; the rest of the engine keeps running on whatever
    /// groups did load, matching the "never take the whole pipeline down
    /// over one bad group" contract in the component design.
    pub fn reload(&mut self, config: &RootConfig, version: u32) -> Result<ReloadReport> {
        self.default_target_rate = config.target_rate.unwrap_or(self.default_target_rate).max(1);
        self.info_cache.retain_groups(config);

        let mut previous: std::collections::HashMap<String, ProcessingGroup> =
            std::mem::take(&mut self.groups).into_iter().map(|g| (g.name().to_string(), g)).collect();

        let mut groups = Vec::with_capacity(config.processing.len());
        let mut rejected = 0usize;
        for group_config in &config.processing {
            let prev = previous.remove(&group_config.name);
            match ProcessingGroup::build(
                group_config,
                self.default_target_rate,
                &mut self.info_cache,
                &config.freq_lists,
                prev,
            ) {
                Ok(group) => groups.push(group),
                Err(err) => {
                    rejected += 1;
                    self.error(&format!("dropping processing group '{}': {err}", group_config.name));
                }
            }
        }

        let report = ReloadReport { groups_loaded: groups.len(), groups_rejected: rejected };
        self.groups = groups;
        self.version = version;
        self.info(&format!(
            "reload v{version}: {} group(s) loaded, {} rejected",
            report.groups_loaded, report.groups_rejected
        ));
        Ok(report)
    }

    /// Feeds one block of interleaved PCM (`frames.len() == layout.len() *
    /// samples_per_channel`) through every processing group, each honoring
    /// `deadline` for its own handler graph. Returns the status the host
    /// should surface for this tick.
    pub fn update(&mut self, frames: &[f32], layout: &[Channel], sample_rate: u32, deadline: Instant) -> Status {
        if self.run_state == RunState::Stopped {
            self.status = Status::NoData;
            return self.status;
        }
        if layout.is_empty() || sample_rate == 0 || frames.len() % layout.len() != 0 {
            self.status = Status::FetchError;
            return self.status;
        }
        if frames.is_empty() {
            self.status = Status::NoData;
            return self.status;
        }
        for group in self.groups.iter_mut() {
            group.update(frames, layout, sample_rate, deadline);
        }
        self.status = Status::Ok;
        self.status
    }

    pub fn read_number(&self, group: &str, channel: Channel, handler: &str, ix: usize) -> Option<f64> {
        let handler = self.groups.iter().find(|g| g.name() == group)?.find_handler(channel, handler)?;
        handler.get_last_data(0)?.get(ix).map(|&v| v as f64)
    }

    pub fn read_string(&self, group: &str, channel: Channel, handler: &str, prop: &str) -> Option<String> {
        let handler = self.groups.iter().find(|g| g.name() == group)?.find_handler(channel, handler)?;
        handler.get_prop(prop)
    }

    /// Renders an image handler's current frame to `{file_prefix}.bmp`.
    /// Invoked synchronously; never called from `update`'s own hot path.
    pub fn finish(&self, group: &str, channel: Channel, handler: &str, file_prefix: &str) -> Result<()> {
        let group_ref = self
            .groups
            .iter()
            .find(|g| g.name() == group)
            .with_context(|| format!("no such processing group '{group}'"))?;
        let handler_ref = group_ref
            .find_handler(channel, handler)
            .with_context(|| format!("no such handler '{handler}' in group '{group}'"))?;
        let (width, height, pixels) = handler_ref
            .render_image()
            .with_context(|| format!("handler '{handler}' is not an image handler"))?;

        let path = format!("{file_prefix}.bmp");
        let file = File::create(&path).with_context(|| format!("creating '{path}'"))?;
        let mut writer = BufWriter::new(file);
        crate::io::bmp::write(&mut writer, width as u32, height as u32, &pixels)
            .with_context(|| format!("writing BMP to '{path}'"))?;
        Ok(())
    }

    /// Handles an opaque host command. Unknown commands are logged and
    /// ignored rather than treated as errors, the way a plugin ABI that
    /// evolves over time tolerates a newer host talking to an older core.
    pub fn command(&mut self, bang: &str) {
        let mut parts = bang.split_whitespace();
        match parts.next() {
            Some("stop") => {
                self.run_state = RunState::Stopped;
                self.info("stopped");
            }
            Some("resume") => {
                self.run_state = RunState::Running;
                self.info("resumed");
            }
            Some("set_index_offset") => match parts.next().and_then(|v| v.parse::<i64>().ok()) {
                Some(offset) => {
                    self.index_offset = offset;
                    self.info(&format!("index offset set to {offset}"));
                }
                None => self.warn(&format!("malformed command: '{bang}'")),
            },
            _ => self.warn(&format!("unknown command: '{bang}'")),
        }
    }

    pub fn index_offset(&self) -> i64 {
        self.index_offset
    }
}
