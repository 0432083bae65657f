use std::collections::{BTreeMap, HashMap};

use camino::Utf8Path;
use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigFlowError;

/// Unique id shared by every entry that only carries aggregate sensors.
pub const GLOBAL_SENSORS_UNIQUE_ID: &str = "rwfc_global_sensors";

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct HassConfig {
    #[serde(flatten)]
    pub servers: BTreeMap<String, HassServer>,
}

/// One Home Assistant instance to push sensor states into.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct HassServer {
    pub url: Url,
    pub token_env: Option<String>,
}

/// One configured entry: a tracked player, a set of aggregate sensors,
/// or both.
#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct EntryConfig {
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub friend_code: Option<String>,
    #[serde(default)]
    pub enable_retro_vs: bool,
    #[serde(default)]
    pub enable_custom_vs: bool,
}

impl EntryConfig {
    /// The friend code, if one is set. Blank strings count as unset.
    #[must_use]
    pub fn friend_code(&self) -> Option<&str> {
        self.friend_code
            .as_deref()
            .map(str::trim)
            .filter(|fc| !fc.is_empty())
    }

    #[must_use]
    pub fn player_name(&self) -> Option<&str> {
        self.player_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    #[must_use]
    pub const fn wants_aggregates(&self) -> bool {
        self.enable_retro_vs || self.enable_custom_vs
    }

    /// An entry must select something: a friend code, aggregate sensors,
    /// or both.
    pub fn validate(&self, entry_id: &str) -> Result<(), ConfigFlowError> {
        if self.friend_code().is_none() && !self.wants_aggregates() {
            return Err(ConfigFlowError::NoOptionSelected(entry_id.to_string()));
        }
        Ok(())
    }

    /// Player entries are identified by their friend code; entries that
    /// only carry aggregate sensors all share one fixed id, which is what
    /// keeps a second aggregate-only entry from being created.
    #[must_use]
    pub fn unique_id(&self) -> String {
        self.friend_code()
            .map_or_else(|| GLOBAL_SENSORS_UNIQUE_ID.to_string(), str::to_string)
    }

    #[must_use]
    pub fn title(&self) -> String {
        if let Some(name) = self.player_name() {
            return name.to_string();
        }
        self.friend_code().map_or_else(
            || "RWFC Global Sensors".to_string(),
            |fc| format!("RWFC Player ({fc})"),
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub hass: HassConfig,
    #[serde(default)]
    pub entries: BTreeMap<String, EntryConfig>,
}

impl AppConfig {
    #[must_use]
    pub fn has_sinks(&self) -> bool {
        !self.hass.servers.is_empty()
    }

    /// Validate every entry and reject unique id collisions up front, so
    /// a bad config file fails at startup instead of half-registering.
    pub fn validate_entries(&self) -> Result<(), ConfigFlowError> {
        let mut seen: HashMap<String, &str> = HashMap::new();

        for (entry_id, entry) in &self.entries {
            entry.validate(entry_id)?;

            let unique_id = entry.unique_id();
            if let Some(previous) = seen.insert(unique_id.clone(), entry_id) {
                return Err(ConfigFlowError::DuplicateUniqueId(
                    previous.to_string(),
                    entry_id.clone(),
                    unique_id,
                ));
            }
        }

        Ok(())
    }
}

pub fn parse(filename: &Utf8Path) -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        .add_source(config::File::with_name(filename.as_str()))
        .build()?;

    settings.try_deserialize()
}
