//! Read-only run configuration: map list, category list, translation table
//! and fetch tunables. Loaded once and passed by reference to each stage.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{PipelineError, PipelineResult};

pub const DEFAULT_BASE_URL: &str = "https://mineboxmaps.com/assets/geo";
pub const DEFAULT_USER_AGENT: &str = "MinecraftMod/1.0";

/// A source map on the remote service and the dimension its points live in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDefinition {
    pub id: String,
    #[serde(alias = "mcDimension")]
    pub dimension: String,
}

impl MapDefinition {
    pub fn new(id: impl Into<String>, dimension: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dimension: dimension.into(),
        }
    }
}

/// Tunables for the fetch stage. Pacing is best effort and never affects
/// which documents end up on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub base_url: String,
    pub user_agent: String,
    /// Time allowed to establish a connection.
    pub timeout_secs: u64,
    /// Time allowed for a whole request, body included.
    pub request_timeout_secs: u64,
    /// Delay between launching two (map, marker) tasks.
    pub launch_delay_ms: u64,
    /// Delay before each category attempt inside a task.
    pub category_delay_ms: u64,
    pub max_concurrent_fetches: usize,
    /// Skip features whose content is already present in the dataset.
    pub dedupe_features: bool,
}

impl FetchSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn launch_delay(&self) -> Duration {
        Duration::from_millis(self.launch_delay_ms)
    }

    pub fn category_delay(&self) -> Duration {
        Duration::from_millis(self.category_delay_ms)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            request_timeout_secs: 30,
            launch_delay_ms: 20,
            category_delay_ms: 100,
            max_concurrent_fetches: (cpus * 4).min(64),
            dedupe_features: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub maps: Vec<MapDefinition>,
    pub categories: Vec<String>,
    /// Marker id -> display name. The keys double as the marker list.
    pub translations: IndexMap<String, String>,
    #[serde(default)]
    pub fetch: FetchSettings,
}

impl PipelineConfig {
    /// Loads the config at `path`, writing the defaults there first when the
    /// file does not exist. An unreadable file falls back to the defaults.
    pub fn load_or_init(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        match Self::parse(path, &content) {
            Ok(config) => Ok(config),
            Err(err) => {
                warn!(
                    "Error loading config {}, using defaults: {}",
                    path.display(),
                    err
                );
                Ok(Self::default())
            }
        }
    }

    fn parse(path: &Path, content: &str) -> PipelineResult<Self> {
        let config: Self = if is_yaml(path) {
            serde_yaml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?
        } else {
            serde_json::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::setup(parent.display(), e))?;
        }
        let serialized = if is_yaml(path) {
            serde_yaml::to_string(self).map_err(|e| PipelineError::Config(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))?
        };
        std::fs::write(path, serialized)?;
        Ok(())
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.maps.iter().any(|map| map.id.is_empty()) {
            return Err(PipelineError::Config("map id must not be empty".into()));
        }
        if self.fetch.max_concurrent_fetches == 0 {
            return Err(PipelineError::Config(
                "max_concurrent_fetches must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn markers(&self) -> Vec<String> {
        self.translations.keys().cloned().collect()
    }

    /// Display name for a marker id, or the id itself when untranslated.
    pub fn translate<'a>(&'a self, id: &'a str) -> &'a str {
        self.translations.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn dimension_for(&self, map_id: &str) -> Option<&str> {
        self.maps
            .iter()
            .find(|map| map.id == map_id)
            .map(|map| map.dimension.as_str())
    }

    /// Removes the longest `<mapId>_` prefix from a marker id.
    pub fn strip_map_prefix<'a>(&self, marker_id: &'a str) -> &'a str {
        self.maps
            .iter()
            .filter_map(|map| {
                marker_id
                    .strip_prefix(map.id.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| (map.id.len(), rest))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, rest)| rest)
            .unwrap_or(marker_id)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            maps: DEFAULT_MAPS
                .iter()
                .map(|(id, dimension)| MapDefinition::new(*id, *dimension))
                .collect(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            translations: DEFAULT_TRANSLATIONS
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
            fetch: FetchSettings::default(),
        }
    }
}

/// Where each stage reads and writes inside the working directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.root.join("geojson_data")
    }

    pub fn waypoints_file(&self) -> PathBuf {
        self.root.join("waypoints.txt")
    }

    pub fn overlay_file(&self) -> PathBuf {
        self.root.join("overlay.json")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("geojson_config.json")
    }
}

const DEFAULT_MAPS: &[(&str, &str)] = &[
    ("home_island", "minecraft:youruuid/main"),
    ("spawn", "minecraft:overworld"),
    ("kokoko", "minecraft:island_tropical"),
    ("quadra_plains", "minecraft:island_plain"),
    ("bamboo_peak", "minecraft:island_bamboo"),
    ("frostbite_fortress", "minecraft:island_snow"),
    ("sandwhisper_dunes", "minecraft:island_desert"),
];

const DEFAULT_CATEGORIES: &[&str] = &["tree", "flower", "ore", "monster", ""];

const DEFAULT_TRANSLATIONS: &[(&str, &str)] = &[
    // Plants
    ("belladonna", "☘belladonna"),
    ("chamomille", "☘chamomille"),
    ("clover", "☘clover"),
    ("echinacea", "☘echinacea"),
    ("five_leaf_clover", "☘five leaf clover"),
    ("foxglove", "☘foxglove"),
    ("ginger_root", "☘ginger root"),
    ("hemlock", "☘hemlock"),
    ("henbane", "☘henbane"),
    ("lily", "☘lily"),
    ("mandrake", "☘mandrake"),
    ("mullein", "☘mullein"),
    ("origami", "☘origami"),
    ("peppermint", "☘peppermint"),
    ("snowdrop", "☘snowdrop"),
    ("st_john_wort", "☘st john's wort"),
    ("yarrow", "☘yarrow"),
    // Ores
    ("ore_ashstone", "⛏ashstone"),
    ("ore_bauxite", "⛏bauxite"),
    ("ore_coal", "⛏coal"),
    ("ore_cobalt", "⛏cobalt"),
    ("ore_copper", "⛏copper"),
    ("ore_diamond", "⛏diamond"),
    ("ore_dolomite", "⛏dolomite"),
    ("ore_iron", "⛏iron"),
    ("ore_lapis_lazuli", "⛏lapis"),
    ("ore_liquid_diamond", "⛏liquid diamond"),
    ("ore_manganese", "⛏manganese"),
    ("ore_opale", "⛏opal"),
    ("ore_rainbow", "⛏rainbow"),
    ("ore_raw_obsidian", "⛏raw obsidian"),
    ("ore_redstone", "⛏redstone"),
    ("ore_seafoam", "⛏seafoam"),
    ("ore_silicate", "⛏silicate"),
    ("ore_silver", "⛏silver"),
    ("ore_tin", "⛏tin"),
    ("ore_topaz", "⛏topaz"),
    // Logs
    ("log_banana", "🌲banana"),
    ("log_chestnut", "🌲chestnut"),
    ("log_coconut", "🌲coconut"),
    ("log_dark_coconut", "🌲dark coconut"),
    ("log_ecalyptus", "🌲eucalyptus"),
    ("log_elm", "🌲elm"),
    ("log_hazel", "🌲hazel"),
    ("log_laughing", "🌲laughing"),
    ("log_mahogany", "🌲mahogany"),
    ("log_maple", "🌲maple"),
    ("log_mystic_horbeam", "🌲mystic hornbeam"),
    ("log_olive", "🌲olive"),
    ("log_sacred_coconut", "🌲sacred coconut"),
    ("log_walnut", "🌲walnut"),
    ("log_yew", "🌲yew"),
    // Treasures
    ("treasure_common", "🗝common"),
    ("treasure_uncommon", "🗝uncommon"),
    ("treasure_rare", "🗝rare"),
    ("treasure_epic", "🗝epic"),
    ("treasure_legendary", "🗝legendary"),
    ("treasure_mythic", "🗝mythic"),
    // Fish
    ("bamboo_peak_fish", "🐠fish"),
    ("frostbite_fortress_fish", "🐠fish"),
    ("kokoko_fish", "🐠fish"),
    ("quadra_plains_fish", "🐠fish"),
    ("sandwhisper_dunes_fish", "🐠fish"),
    ("spawn_fish", "🐠fish"),
    // Bloon
    ("bamboo_peak_bloon", "🎈bloon"),
    ("frostbite_fortress_bloon", "🎈bloon"),
    ("kokoko_bloon", "🎈bloon"),
    ("quadra_plains_bloon", "🎈bloon"),
    ("sandwhisper_dunes_bloon", "🎈bloon"),
    ("spawn_bloon", "🎈bloon"),
    // Viewpoints
    ("bamboo_peak_viewPoint", "👁viewpoint"),
    ("frostbite_fortress_viewPoint", "👁viewpoint"),
    ("kokoko_viewPoint", "👁viewpoint"),
    ("quadra_plains_viewPoint", "👁viewpoint"),
    ("sandwhisper_dunes_viewPoint", "👁viewpoint"),
    ("spawn_viewPoint", "👁viewpoint"),
    // Coins
    ("bamboo_peak_coin", "🪙coin"),
    ("frostbite_fortress_coin", "🪙coin"),
    ("kokoko_coin", "🪙coin"),
    ("quadra_plains_coin", "🪙coin"),
    ("sandwhisper_dunes_coin", "🪙coin"),
    ("spawn_coin", "🪙coin"),
    // NPCs and monsters
    ("bambooboo", "♥bambooboo"),
    ("bloomboo", "♥bloomboo"),
    ("cat_goofish", "♥cat goofish"),
    ("chillolith", "♥chillolith"),
    ("clown_goofish", "♥clown goofish"),
    ("coconut_magician", "♥coconut magician"),
    ("coconut_warrior", "♥coconut warrior"),
    ("crabician", "♥crabician"),
    ("craboxer", "♥craboxer"),
    ("debris_golem", "♥debris golem"),
    ("hammershark_goofish", "♥hammershark goofish"),
    ("monkey", "♥monkey"),
    ("monkey_banana", "♥banana monkey"),
    ("monkey_barrel", "♥barrel monkey"),
    ("monkey_ghost", "♥ghost monkey"),
    ("monkey_mage", "♥mage monkey"),
    ("moskitoko", "♥moskitoko"),
    ("old_pirate_farmer", "♥old pirate farmer"),
    ("orange_starfish", "♥orange starfish"),
    ("pandaboo_warrior", "♥pandaboo warrior"),
    ("pandaboo_wizard", "♥pandaboo wizard"),
    ("pirate_farmer", "♥pirate farmer"),
    ("scavenger_vulture", "♥scavenger vulture"),
    ("scarecrow", "♥scarecrow"),
    ("spawn_npc", "♥npc"),
    ("spicy_lava_bucket", "♥spicy lava bucket"),
    ("spidey", "♥spidey"),
    ("venomous_spidey", "♥venomous spidey"),
];
