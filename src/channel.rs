//! Channel identifiers, the known VENUS channel catalog, and export requests.

use std::collections::HashSet;
use std::fmt;

use crate::error::{ExportError, Result};
use crate::timestamp::TimeWindow;

/// Display group of a channel. Presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelGroup {
    Vacuum,
    Superconductor,
    HighVoltage,
    Rf,
    Oven,
    Misc,
}

impl ChannelGroup {
    pub const ALL: [ChannelGroup; 6] = [
        ChannelGroup::Vacuum,
        ChannelGroup::Superconductor,
        ChannelGroup::HighVoltage,
        ChannelGroup::Rf,
        ChannelGroup::Oven,
        ChannelGroup::Misc,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChannelGroup::Vacuum => "Vacuum",
            ChannelGroup::Superconductor => "Superconductor",
            ChannelGroup::HighVoltage => "High voltage",
            ChannelGroup::Rf => "RF",
            ChannelGroup::Oven => "Oven",
            ChannelGroup::Misc => "Misc",
        }
    }
}

impl fmt::Display for ChannelGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub group: ChannelGroup,
}

const fn info(id: &'static str, label: &'static str, group: ChannelGroup) -> ChannelInfo {
    ChannelInfo { id, label, group }
}

/// Channels offered by the export form, in form order.
pub const KNOWN_CHANNELS: &[ChannelInfo] = &[
    info("inj_mbar", "Vacuum, injection", ChannelGroup::Vacuum),
    info("ext_mbar", "Vacuum, extraction", ChannelGroup::Vacuum),
    info("bl_mig2_torr", "Vacuum, beamline", ChannelGroup::Vacuum),
    info("inj_i", "Superconductor, inj i", ChannelGroup::Superconductor),
    info("ext_i", "Superconductor, ext i", ChannelGroup::Superconductor),
    info("mid_i", "Superconductor, mid i", ChannelGroup::Superconductor),
    info("sext_i", "Superconductor, sext i", ChannelGroup::Superconductor),
    info("extraction_v", "High voltage, extraction V", ChannelGroup::HighVoltage),
    info("extraction_i", "High voltage, extraction I", ChannelGroup::HighVoltage),
    info("puller_v", "High voltage, puller V", ChannelGroup::HighVoltage),
    info("puller_i", "High voltage, puller I", ChannelGroup::HighVoltage),
    info("bias_v", "High voltage, biased disk V", ChannelGroup::HighVoltage),
    info("bias_i", "High voltage, biased disk I", ChannelGroup::HighVoltage),
    info("glaser_1", "Glaser", ChannelGroup::Misc),
    info("g28_fw", "RF, 28 GHz, forward", ChannelGroup::Rf),
    info("k18_fw", "RF, 18 GHz(1), forward", ChannelGroup::Rf),
    info("k18_2_fw", "RF, 18 GHz(2), forward", ChannelGroup::Rf),
    info("k18_ref", "RF, 18 GHz(1), reflected", ChannelGroup::Rf),
    info("k18_2_ref", "RF, 18 GHz(2), reflected", ChannelGroup::Rf),
    info("lt_oven_1_sp", "Low temperature oven 1 set point", ChannelGroup::Oven),
    info("lt_oven_2_sp", "Low temperature oven 2 set point", ChannelGroup::Oven),
    info("lt_oven_1_temp", "Low temperature oven 1 temperature", ChannelGroup::Oven),
    info("lt_oven_2_temp", "Low temperature oven 2 temperature", ChannelGroup::Oven),
];

pub fn lookup(id: &str) -> Option<&'static ChannelInfo> {
    KNOWN_CHANNELS.iter().find(|c| c.id == id)
}

pub fn channels_in(group: ChannelGroup) -> impl Iterator<Item = &'static ChannelInfo> {
    KNOWN_CHANNELS.iter().filter(move |c| c.group == group)
}

/// Validated channel identifier (`[A-Za-z0-9_]+`).
///
/// Membership in [`KNOWN_CHANNELS`] is not required; the store's schema
/// decides whether a channel exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(ExportError::InvalidChannel {
                channel: id,
                reason: "empty identifier",
            });
        }
        if !id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(ExportError::InvalidChannel {
                channel: id,
                reason: "only ASCII letters, digits and '_' are allowed",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One user submission: distinct channels in request order plus a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    channels: Vec<ChannelId>,
    window: TimeWindow,
}

impl ExportRequest {
    pub fn new<I, S>(channels: I, window: TimeWindow) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for raw in channels {
            let id = ChannelId::new(raw)?;
            if !seen.insert(id.clone()) {
                return Err(ExportError::InvalidChannel {
                    channel: id.0,
                    reason: "requested more than once",
                });
            }
            ids.push(id);
        }
        if ids.is_empty() {
            return Err(ExportError::EmptySelection);
        }
        Ok(Self {
            channels: ids,
            window,
        })
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }
}
