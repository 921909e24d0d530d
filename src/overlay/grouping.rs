//! Groups overlay entries that share a display name.
//!
//! Only entries owned by the engine's owner id are considered, and only
//! those not yet in one of that owner's groups. Re-running over an unchanged
//! overlay creates nothing and moves nothing.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, info};

use super::{GroupId, NewGroup, OverlayEntry, OverlayHost, WaypointGroup};
use crate::errors::OverlayResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupingResult {
    pub groups_created: usize,
    pub entries_moved: usize,
}

#[derive(Debug, Clone)]
pub struct GroupingEngine {
    owner: String,
    visible: bool,
    color_override: bool,
}

impl GroupingEngine {
    /// New groups start hidden with colour override on.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            visible: false,
            color_override: true,
        }
    }

    pub fn with_presentation(mut self, visible: bool, color_override: bool) -> Self {
        self.visible = visible;
        self.color_override = color_override;
        self
    }

    pub fn group_duplicates<H>(&self, host: &mut H) -> OverlayResult<GroupingResult>
    where
        H: OverlayHost + ?Sized,
    {
        let owned_groups = host.list_groups(&self.owner);
        let mut groups_by_name: HashMap<String, GroupId> = HashMap::new();
        for group in &owned_groups {
            groups_by_name.entry(group.name.clone()).or_insert(group.id);
        }

        let ungrouped = host
            .list_entries(&self.owner)
            .into_iter()
            .filter(|entry| !is_in_owned_group(entry, &owned_groups));

        let mut by_name: IndexMap<String, Vec<OverlayEntry>> = IndexMap::new();
        for entry in ungrouped {
            by_name.entry(entry.name.clone()).or_default().push(entry);
        }

        let mut result = GroupingResult::default();
        for (name, entries) in by_name {
            if entries.len() < 2 {
                continue;
            }

            let group = match groups_by_name.get(&name) {
                Some(id) => *id,
                None => {
                    let id = host.create_group(NewGroup {
                        owner: &self.owner,
                        name: &name,
                        visible: self.visible,
                        color_override: self.color_override,
                    })?;
                    groups_by_name.insert(name.clone(), id);
                    result.groups_created += 1;
                    id
                }
            };

            for entry in &entries {
                host.add_to_group(group, entry.id)?;
                result.entries_moved += 1;
            }
            debug!("Grouped {} waypoints named '{}'", entries.len(), name);
        }

        info!(
            "Created {} groups, moved {} waypoints",
            result.groups_created, result.entries_moved
        );
        Ok(result)
    }
}

fn is_in_owned_group(entry: &OverlayEntry, owned_groups: &[WaypointGroup]) -> bool {
    entry
        .group
        .is_some_and(|id| owned_groups.iter().any(|group| group.id == id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_codec::ParsedWaypoint;
    use crate::overlay::MemoryOverlay;

    const OWNER: &str = "waymark";

    fn overlay_with(names: &[&str]) -> MemoryOverlay {
        let mut overlay = MemoryOverlay::new();
        for (i, name) in names.iter().enumerate() {
            overlay
                .create_waypoint(
                    OWNER,
                    &ParsedWaypoint::new(*name, "minecraft:overworld", i as i32, 64, 0),
                )
                .unwrap();
        }
        overlay
    }

    #[test]
    fn test_duplicates_are_grouped_singletons_left_alone() {
        let mut overlay = overlay_with(&["A", "A", "B"]);
        let engine = GroupingEngine::new(OWNER);

        let result = engine.group_duplicates(&mut overlay).unwrap();

        assert_eq!(
            result,
            GroupingResult {
                groups_created: 1,
                entries_moved: 2
            }
        );
        let groups = overlay.list_groups(OWNER);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "A");
        assert_eq!(groups[0].members.len(), 2);
        assert!(!groups[0].visible);
        assert!(groups[0].color_override);

        let b = overlay.entries().iter().find(|e| e.name == "B").unwrap();
        assert_eq!(b.group, None);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let mut overlay = overlay_with(&["A", "A", "B", "C", "C", "C"]);
        let engine = GroupingEngine::new(OWNER);

        let first = engine.group_duplicates(&mut overlay).unwrap();
        let snapshot = overlay.groups().to_vec();
        let second = engine.group_duplicates(&mut overlay).unwrap();

        assert_eq!(first.groups_created, 2);
        assert_eq!(first.entries_moved, 5);
        assert_eq!(second, GroupingResult::default());
        assert_eq!(overlay.groups(), snapshot.as_slice());
    }

    #[test]
    fn test_existing_group_is_reused_for_new_duplicates() {
        let mut overlay = overlay_with(&["A", "A"]);
        let engine = GroupingEngine::new(OWNER);
        engine.group_duplicates(&mut overlay).unwrap();

        for x in [10, 11] {
            overlay
                .create_waypoint(OWNER, &ParsedWaypoint::new("A", "minecraft:overworld", x, 64, 0))
                .unwrap();
        }
        let result = engine.group_duplicates(&mut overlay).unwrap();

        assert_eq!(result.groups_created, 0);
        assert_eq!(result.entries_moved, 2);
        assert_eq!(overlay.list_groups(OWNER)[0].members.len(), 4);
    }

    #[test]
    fn test_entries_in_foreign_groups_are_still_candidates() {
        let mut overlay = overlay_with(&["A", "A"]);
        let foreign = overlay
            .create_group(NewGroup {
                owner: "host",
                name: "Default",
                visible: true,
                color_override: false,
            })
            .unwrap();
        let ids: Vec<_> = overlay.entries().iter().map(|e| e.id).collect();
        for id in ids {
            overlay.add_to_group(foreign, id).unwrap();
        }

        let result = GroupingEngine::new(OWNER)
            .group_duplicates(&mut overlay)
            .unwrap();

        assert_eq!(result.entries_moved, 2);
        assert!(overlay.group(foreign).unwrap().members.is_empty());
    }

    #[test]
    fn test_other_owners_entries_are_ignored() {
        let mut overlay = overlay_with(&["A"]);
        overlay
            .create_waypoint("someone-else", &ParsedWaypoint::new("A", "minecraft:overworld", 0, 0, 0))
            .unwrap();

        let result = GroupingEngine::new(OWNER)
            .group_duplicates(&mut overlay)
            .unwrap();
        assert_eq!(result, GroupingResult::default());
    }

    #[test]
    fn test_presentation_defaults_can_be_changed() {
        let mut overlay = overlay_with(&["A", "A"]);
        GroupingEngine::new(OWNER)
            .with_presentation(true, false)
            .group_duplicates(&mut overlay)
            .unwrap();

        let group = &overlay.list_groups(OWNER)[0];
        assert!(group.visible);
        assert!(!group.color_override);
    }
}
