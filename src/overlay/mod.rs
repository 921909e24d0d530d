//! Overlay host interface and an in-memory, file-persistable host.
//!
//! The real map overlay lives outside this crate. `OverlayHost` is the
//! subset of its API the pipeline needs; `MemoryOverlay` implements it for
//! the command line tool and for tests.

pub mod grouping;

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{OverlayError, OverlayResult};
use crate::line_codec::ParsedWaypoint;

pub use grouping::{GroupingEngine, GroupingResult};

/// Light blue, applied to every waypoint the pipeline creates.
pub const DEFAULT_WAYPOINT_COLOR: u32 = 0x00FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaypointId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for WaypointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wp-{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayEntry {
    pub id: WaypointId,
    pub owner: String,
    pub name: String,
    pub dimension: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub color: u32,
    pub enabled: bool,
    pub group: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaypointGroup {
    pub id: GroupId,
    pub owner: String,
    pub name: String,
    pub members: BTreeSet<WaypointId>,
    pub visible: bool,
    pub color_override: bool,
}

/// Parameters for a group the host should create.
#[derive(Debug, Clone)]
pub struct NewGroup<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub visible: bool,
    pub color_override: bool,
}

pub trait OverlayHost {
    fn create_waypoint(&mut self, owner: &str, waypoint: &ParsedWaypoint)
        -> OverlayResult<WaypointId>;

    fn list_entries(&self, owner: &str) -> Vec<OverlayEntry>;

    fn list_groups(&self, owner: &str) -> Vec<WaypointGroup>;

    fn create_group(&mut self, group: NewGroup<'_>) -> OverlayResult<GroupId>;

    /// Moves `entry` into `group`, leaving whatever group it was in.
    fn add_to_group(&mut self, group: GroupId, entry: WaypointId) -> OverlayResult<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryOverlay {
    entries: Vec<OverlayEntry>,
    groups: Vec<WaypointGroup>,
    next_id: u64,
}

impl MemoryOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a previously saved overlay, or starts empty when `path` is absent.
    pub fn load(path: &Path) -> OverlayResult<Self> {
        if !path.exists() {
            debug!("No overlay store at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> OverlayResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn entries(&self) -> &[OverlayEntry] {
        &self.entries
    }

    pub fn groups(&self) -> &[WaypointGroup] {
        &self.groups
    }

    pub fn entry(&self, id: WaypointId) -> Option<&OverlayEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn group(&self, id: GroupId) -> Option<&WaypointGroup> {
        self.groups.iter().find(|group| group.id == id)
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl OverlayHost for MemoryOverlay {
    fn create_waypoint(
        &mut self,
        owner: &str,
        waypoint: &ParsedWaypoint,
    ) -> OverlayResult<WaypointId> {
        let id = WaypointId(self.next_id());
        self.entries.push(OverlayEntry {
            id,
            owner: owner.to_string(),
            name: waypoint.name.clone(),
            dimension: waypoint.dimension.clone(),
            x: waypoint.x,
            y: waypoint.y,
            z: waypoint.z,
            color: DEFAULT_WAYPOINT_COLOR,
            enabled: true,
            group: None,
        });
        Ok(id)
    }

    fn list_entries(&self, owner: &str) -> Vec<OverlayEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.owner == owner)
            .cloned()
            .collect()
    }

    fn list_groups(&self, owner: &str) -> Vec<WaypointGroup> {
        self.groups
            .iter()
            .filter(|group| group.owner == owner)
            .cloned()
            .collect()
    }

    fn create_group(&mut self, group: NewGroup<'_>) -> OverlayResult<GroupId> {
        let id = GroupId(self.next_id());
        self.groups.push(WaypointGroup {
            id,
            owner: group.owner.to_string(),
            name: group.name.to_string(),
            members: BTreeSet::new(),
            visible: group.visible,
            color_override: group.color_override,
        });
        Ok(id)
    }

    fn add_to_group(&mut self, group: GroupId, entry: WaypointId) -> OverlayResult<()> {
        if self.group(group).is_none() {
            return Err(OverlayError::UnknownGroup(group));
        }
        let record = self
            .entries
            .iter_mut()
            .find(|e| e.id == entry)
            .ok_or(OverlayError::UnknownEntry(entry))?;
        let previous = record.group.replace(group);

        for g in self.groups.iter_mut() {
            if Some(g.id) == previous {
                g.members.remove(&entry);
            }
            if g.id == group {
                g.members.insert(entry);
            }
        }
        Ok(())
    }
}
