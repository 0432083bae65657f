use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::DOMAIN;
use crate::config::EntryConfig;
use crate::metrics::{self, RoomType};
use crate::model::PollSnapshot;

pub const ATTRIBUTION: &str = "Data provided by rwfc.net";
const STATUS_PAGE_URL: &str = "https://status.rwfc.net/";
const MANUFACTURER: &str = "🗿 Bitte ein Git!";
const PLAYER_DEVICE_MODEL: &str = "RetroWFC Player 🏎️";
const GLOBAL_DEVICE_NAME: &str = "Retro Rewind Status";
const GLOBAL_DEVICE_MODEL: &str = "🌎RetroWFC Status";

#[derive(Clone, Copy, Debug, Serialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SensorDeviceClass {
    Enum,
}

#[derive(Clone, Copy, Debug, Serialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SensorStateClass {
    Measurement,
}

/// Static display metadata for one sensor kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SensorDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub unit: Option<&'static str>,
    pub device_class: Option<SensorDeviceClass>,
    pub state_class: Option<SensorStateClass>,
}

/// The four sensors every tracked player gets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlayerMetric {
    Status,
    RoomType,
    VrPoints,
    PlayerCount,
}

impl PlayerMetric {
    pub const ALL: [Self; 4] = [
        Self::Status,
        Self::RoomType,
        Self::VrPoints,
        Self::PlayerCount,
    ];

    #[must_use]
    pub const fn description(self) -> &'static SensorDescription {
        match self {
            Self::Status => &SensorDescription {
                key: "status",
                name: "Status",
                icon: "mdi:information-outline",
                unit: None,
                device_class: None,
                state_class: None,
            },
            Self::RoomType => &SensorDescription {
                key: "room_type",
                name: "Room type",
                icon: "mdi:application-cog-outline",
                unit: None,
                device_class: Some(SensorDeviceClass::Enum),
                state_class: None,
            },
            Self::VrPoints => &SensorDescription {
                key: "vr_pts",
                name: "VR points",
                icon: "mdi:counter",
                unit: Some("VR"),
                device_class: None,
                state_class: Some(SensorStateClass::Measurement),
            },
            Self::PlayerCount => &SensorDescription {
                key: "player_count",
                name: "Room Player Count",
                icon: "mdi:google-classroom",
                unit: Some("Players"),
                device_class: None,
                state_class: Some(SensorStateClass::Measurement),
            },
        }
    }
}

/// Which aggregate pair a sensor belongs to. Each group filters the
/// snapshot by one room kind code.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum AggregateGroup {
    RetroVs,
    CustomVs,
}

impl AggregateGroup {
    #[must_use]
    pub const fn rk_filter(self) -> &'static str {
        match self {
            Self::RetroVs => "vs_10",
            Self::CustomVs => "vs_20",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::RetroVs => "🕹️Retro VS",
            Self::CustomVs => "🚧Custom VS",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggregateMetric {
    Rooms,
    Players,
}

/// Device identity a group of sensors registers under.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub configuration_url: &'static str,
}

impl DeviceInfo {
    #[must_use]
    pub fn player(friend_code: &str, player_name: Option<&str>) -> Self {
        let display = player_name.map_or_else(
            || format!("Player {friend_code}"),
            str::to_string,
        );
        Self {
            identifier: friend_code.to_string(),
            name: format!("{display} ({friend_code})"),
            manufacturer: MANUFACTURER,
            model: PLAYER_DEVICE_MODEL,
            configuration_url: STATUS_PAGE_URL,
        }
    }

    #[must_use]
    pub fn global() -> Self {
        Self {
            identifier: "global".to_string(),
            name: GLOBAL_DEVICE_NAME.to_string(),
            manufacturer: MANUFACTURER,
            model: GLOBAL_DEVICE_MODEL,
            configuration_url: STATUS_PAGE_URL,
        }
    }

    fn as_value(&self) -> Value {
        json!({
            "identifiers": [[DOMAIN, self.identifier]],
            "name": self.name,
            "manufacturer": self.manufacturer,
            "model": self.model,
            "configuration_url": self.configuration_url,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PlayerSensor {
    pub friend_code: String,
    pub metric: PlayerMetric,
    pub device: DeviceInfo,
}

#[derive(Clone, Debug)]
pub struct AggregateSensor {
    pub group: AggregateGroup,
    pub metric: AggregateMetric,
    pub device: DeviceInfo,
}

/// One registered entity: identity, display metadata and the derivation
/// it reports.
#[derive(Clone, Debug)]
pub enum Sensor {
    Player(PlayerSensor),
    Aggregate(AggregateSensor),
}

/// A computed sensor reading. `value: None` means the reading is unknown
/// (no snapshot yet, or a rating the player does not have).
#[derive(Clone, Debug, Serialize, Eq, PartialEq)]
pub struct SensorState {
    pub value: Option<String>,
    pub attributes: Map<String, Value>,
}

impl AggregateSensor {
    #[must_use]
    pub const fn description(&self) -> &'static SensorDescription {
        match (self.group, self.metric) {
            (AggregateGroup::RetroVs, AggregateMetric::Rooms) => &SensorDescription {
                key: "rwfc_vsrooms",
                name: "Rooms",
                icon: "mdi:controller-classic-outline",
                unit: Some("Rooms"),
                device_class: None,
                state_class: Some(SensorStateClass::Measurement),
            },
            (AggregateGroup::RetroVs, AggregateMetric::Players) => &SensorDescription {
                key: "rwfc_vsplayers",
                name: "Players",
                icon: "mdi:account-group",
                unit: Some("Players"),
                device_class: None,
                state_class: Some(SensorStateClass::Measurement),
            },
            (AggregateGroup::CustomVs, AggregateMetric::Rooms) => &SensorDescription {
                key: "rwfc_cvsrooms",
                name: "Rooms",
                icon: "mdi:hammer-wrench",
                unit: Some("Rooms"),
                device_class: None,
                state_class: Some(SensorStateClass::Measurement),
            },
            (AggregateGroup::CustomVs, AggregateMetric::Players) => &SensorDescription {
                key: "rwfc_cvsplayers",
                name: "Players",
                icon: "mdi:account-group",
                unit: Some("Players"),
                device_class: None,
                state_class: Some(SensorStateClass::Measurement),
            },
        }
    }

    #[must_use]
    pub const fn unique_id(&self) -> &'static str {
        self.description().key
    }

    /// Display name, `{group label}: {metric}`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}: {}", self.group.label(), self.description().name)
    }
}

impl Sensor {
    #[must_use]
    pub fn unique_id(&self) -> String {
        match self {
            Self::Player(sensor) => {
                format!("{}_{}", sensor.friend_code, sensor.metric.description().key)
            }
            Self::Aggregate(sensor) => sensor.unique_id().to_string(),
        }
    }

    /// The Home Assistant object id, i.e. the part after `sensor.`.
    /// Aggregate ids already carry the domain prefix; player ids gain it
    /// so friend codes stay namespaced.
    #[must_use]
    pub fn object_id(&self) -> String {
        match self {
            Self::Player(_) => sanitize_object_id(&format!("{DOMAIN}_{}", self.unique_id())),
            Self::Aggregate(sensor) => sanitize_object_id(sensor.unique_id()),
        }
    }

    /// Compute the current reading. With no snapshot at hand every value
    /// is unknown, but display attributes are still emitted so entities
    /// look right from the first push.
    #[must_use]
    pub fn evaluate(&self, snapshot: Option<&PollSnapshot>) -> SensorState {
        match self {
            Self::Player(sensor) => Self::evaluate_player(sensor, snapshot),
            Self::Aggregate(sensor) => Self::evaluate_aggregate(sensor, snapshot),
        }
    }

    fn evaluate_player(sensor: &PlayerSensor, snapshot: Option<&PollSnapshot>) -> SensorState {
        let desc = sensor.metric.description();
        let found = snapshot.and_then(|snap| snap.find_player(&sensor.friend_code));
        let session = found.map(|(session, _)| session);
        let player = found.map(|(_, player)| player);

        let value = match sensor.metric {
            PlayerMetric::Status => snapshot.map(|_| metrics::player_status(session).to_string()),
            PlayerMetric::RoomType => snapshot.map(|_| metrics::room_type(session).to_string()),
            PlayerMetric::VrPoints => metrics::points(player).map(|ev| ev.to_string()),
            PlayerMetric::PlayerCount => {
                snapshot.map(|_| metrics::player_count(session).to_string())
            }
        };

        let friendly_name = format!("{} {}", sensor.device.name, desc.name);
        let mut attributes = base_attributes(desc, &friendly_name, &sensor.device);

        if sensor.metric == PlayerMetric::RoomType {
            let options = RoomType::OPTIONS
                .iter()
                .map(|option| Value::String(option.as_str().to_string()))
                .collect();
            attributes.insert("options".to_string(), Value::Array(options));
        }

        if sensor.metric == PlayerMetric::Status && snapshot.is_some() {
            attributes.insert(
                "player_count".to_string(),
                Value::from(metrics::player_count(session)),
            );
        }

        SensorState { value, attributes }
    }

    fn evaluate_aggregate(
        sensor: &AggregateSensor,
        snapshot: Option<&PollSnapshot>,
    ) -> SensorState {
        let value = snapshot.map(|snap| {
            let count = match sensor.metric {
                AggregateMetric::Rooms => metrics::aggregate_rooms(snap, sensor.group.rk_filter()),
                AggregateMetric::Players => {
                    metrics::aggregate_players(snap, sensor.group.rk_filter())
                }
            };
            count.to_string()
        });

        let attributes = base_attributes(sensor.description(), &sensor.name(), &sensor.device);

        SensorState { value, attributes }
    }
}

fn base_attributes(
    desc: &SensorDescription,
    friendly_name: &str,
    device: &DeviceInfo,
) -> Map<String, Value> {
    let mut attributes = Map::new();
    attributes.insert(
        "friendly_name".to_string(),
        Value::String(friendly_name.to_string()),
    );
    attributes.insert("icon".to_string(), Value::String(desc.icon.to_string()));
    attributes.insert(
        "attribution".to_string(),
        Value::String(ATTRIBUTION.to_string()),
    );
    attributes.insert("device".to_string(), device.as_value());

    if let Some(unit) = desc.unit {
        attributes.insert(
            "unit_of_measurement".to_string(),
            Value::String(unit.to_string()),
        );
    }
    if let Some(device_class) = desc.device_class {
        attributes.insert("device_class".to_string(), json!(device_class));
    }
    if let Some(state_class) = desc.state_class {
        attributes.insert("state_class".to_string(), json!(state_class));
    }

    attributes
}

/// Lowercase the text and squash every non-alphanumeric run into one
/// underscore, the shape Home Assistant expects for object ids.
#[must_use]
pub fn sanitize_object_id(text: &str) -> String {
    let mut out = String::new();
    let mut last_sep = false;
    for ch in text.chars() {
        let low = ch.to_ascii_lowercase();
        if low.is_ascii_alphanumeric() {
            out.push(low);
            last_sep = false;
        } else if !last_sep && !out.is_empty() {
            out.push('_');
            last_sep = true;
        }
    }
    out.trim_end_matches('_').to_string()
}

/// The four player sensors for one friend code, sharing a device.
#[must_use]
pub fn player_sensors(friend_code: &str, player_name: Option<&str>) -> Vec<Sensor> {
    let device = DeviceInfo::player(friend_code, player_name);
    PlayerMetric::ALL
        .into_iter()
        .map(|metric| {
            Sensor::Player(PlayerSensor {
                friend_code: friend_code.to_string(),
                metric,
                device: device.clone(),
            })
        })
        .collect()
}

/// The rooms/players pair for one aggregate group, on the global device.
#[must_use]
pub fn aggregate_sensors(group: AggregateGroup) -> Vec<Sensor> {
    [AggregateMetric::Rooms, AggregateMetric::Players]
        .into_iter()
        .map(|metric| {
            Sensor::Aggregate(AggregateSensor {
                group,
                metric,
                device: DeviceInfo::global(),
            })
        })
        .collect()
}

/// The aggregate groups an entry's toggles select, in registration order.
#[must_use]
pub fn enabled_groups(entry: &EntryConfig) -> Vec<AggregateGroup> {
    let mut groups = Vec::new();
    if entry.enable_retro_vs {
        groups.push(AggregateGroup::RetroVs);
    }
    if entry.enable_custom_vs {
        groups.push(AggregateGroup::CustomVs);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Session;

    fn sample_snapshot() -> PollSnapshot {
        let body = r#"[{"rk":"vs_10","suspend":0,"players":{"1":{"fc":"1234","ev":5000}}}]"#;
        let sessions: Vec<Session> = serde_json::from_str(body).unwrap();
        PollSnapshot::from_sessions(sessions)
    }

    fn states_for(friend_code: &str, snapshot: &PollSnapshot) -> Vec<(String, SensorState)> {
        player_sensors(friend_code, None)
            .iter()
            .map(|sensor| (sensor.unique_id(), sensor.evaluate(Some(snapshot))))
            .collect()
    }

    fn value_of(states: &[(String, SensorState)], unique_id: &str) -> Option<String> {
        states
            .iter()
            .find(|(id, _)| id == unique_id)
            .map(|(_, state)| state.value.clone())
            .unwrap()
    }

    #[test]
    fn player_sensor_identity() {
        let sensors = player_sensors("1234-5678-9012", Some("Olli"));

        let ids: Vec<String> = sensors.iter().map(Sensor::unique_id).collect();
        assert_eq!(
            ids,
            vec![
                "1234-5678-9012_status",
                "1234-5678-9012_room_type",
                "1234-5678-9012_vr_pts",
                "1234-5678-9012_player_count",
            ]
        );

        assert_eq!(sensors[0].object_id(), "rwfc_1234_5678_9012_status");
    }

    #[test]
    fn aggregate_sensor_identity() {
        let retro = aggregate_sensors(AggregateGroup::RetroVs);
        let custom = aggregate_sensors(AggregateGroup::CustomVs);

        assert_eq!(retro[0].unique_id(), "rwfc_vsrooms");
        assert_eq!(retro[1].unique_id(), "rwfc_vsplayers");
        assert_eq!(custom[0].unique_id(), "rwfc_cvsrooms");
        assert_eq!(custom[1].unique_id(), "rwfc_cvsplayers");

        assert_eq!(retro[0].object_id(), "rwfc_vsrooms");
    }

    #[test]
    fn sanitize_object_id_squashes_separators() {
        assert_eq!(sanitize_object_id("1234-5678-9012"), "1234_5678_9012");
        assert_eq!(sanitize_object_id("Already_fine"), "already_fine");
        assert_eq!(sanitize_object_id("--weird  id!!"), "weird_id");
        assert_eq!(sanitize_object_id("rwfc_vsrooms"), "rwfc_vsrooms");
    }

    #[test]
    fn tracked_player_values_follow_the_session() {
        let snapshot = sample_snapshot();
        let states = states_for("1234", &snapshot);

        assert_eq!(
            value_of(&states, "1234_status"),
            Some("ongoing_race".to_string())
        );
        assert_eq!(
            value_of(&states, "1234_room_type"),
            Some("retro_vs".to_string())
        );
        assert_eq!(value_of(&states, "1234_vr_pts"), Some("5000".to_string()));
        assert_eq!(value_of(&states, "1234_player_count"), Some("1".to_string()));
    }

    #[test]
    fn absent_player_reports_offline_defaults() {
        let snapshot = sample_snapshot();
        let states = states_for("9999", &snapshot);

        assert_eq!(value_of(&states, "9999_status"), Some("offline".to_string()));
        assert_eq!(value_of(&states, "9999_room_type"), Some("none".to_string()));
        // no rating: unknown, never zero
        assert_eq!(value_of(&states, "9999_vr_pts"), None);
        assert_eq!(value_of(&states, "9999_player_count"), Some("0".to_string()));
    }

    #[test]
    fn aggregate_values_follow_the_filter() {
        let snapshot = sample_snapshot();

        for sensor in aggregate_sensors(AggregateGroup::RetroVs) {
            assert_eq!(sensor.evaluate(Some(&snapshot)).value, Some("1".to_string()));
        }
        for sensor in aggregate_sensors(AggregateGroup::CustomVs) {
            assert_eq!(sensor.evaluate(Some(&snapshot)).value, Some("0".to_string()));
        }
    }

    #[test]
    fn no_snapshot_means_unknown_values_with_full_attributes() {
        let sensors = player_sensors("1234", Some("Olli"));

        for sensor in &sensors {
            let state = sensor.evaluate(None);
            assert_eq!(state.value, None);
            assert!(state.attributes.contains_key("friendly_name"));
            assert!(state.attributes.contains_key("icon"));
        }
    }

    #[test]
    fn status_sensor_carries_player_count_attribute() {
        let snapshot = sample_snapshot();
        let status = &player_sensors("1234", None)[0];

        let state = status.evaluate(Some(&snapshot));
        assert_eq!(state.attributes["player_count"], Value::from(1));

        // without a snapshot the attribute is omitted
        let state = status.evaluate(None);
        assert!(!state.attributes.contains_key("player_count"));
    }

    #[test]
    fn room_type_sensor_lists_every_option() {
        let snapshot = sample_snapshot();
        let room_type = &player_sensors("1234", None)[1];

        let state = room_type.evaluate(Some(&snapshot));
        let options = state.attributes["options"].as_array().unwrap();
        assert_eq!(options.len(), 8);
        assert!(options.contains(&Value::String("retro_200cc".to_string())));
        assert!(options.contains(&Value::String("none".to_string())));
        assert_eq!(state.attributes["device_class"], Value::String("enum".to_string()));
    }

    #[test]
    fn device_identity_is_shared_per_friend_code() {
        let sensors = player_sensors("1234", Some("Olli"));

        let devices: Vec<&DeviceInfo> = sensors
            .iter()
            .map(|sensor| match sensor {
                Sensor::Player(player) => &player.device,
                Sensor::Aggregate(_) => unreachable!(),
            })
            .collect();

        assert!(devices.iter().all(|device| **device == *devices[0]));
        assert_eq!(devices[0].name, "Olli (1234)");
        assert_eq!(devices[0].identifier, "1234");

        // without a configured name the friend code doubles as the display
        let device = DeviceInfo::player("1234", None);
        assert_eq!(device.name, "Player 1234 (1234)");
    }

    #[test]
    fn aggregate_metadata_matches_the_group() {
        let retro_rooms = AggregateSensor {
            group: AggregateGroup::RetroVs,
            metric: AggregateMetric::Rooms,
            device: DeviceInfo::global(),
        };
        let custom_rooms = AggregateSensor {
            group: AggregateGroup::CustomVs,
            metric: AggregateMetric::Rooms,
            device: DeviceInfo::global(),
        };

        assert_eq!(retro_rooms.description().icon, "mdi:controller-classic-outline");
        assert_eq!(custom_rooms.description().icon, "mdi:hammer-wrench");
        assert_eq!(retro_rooms.name(), "🕹️Retro VS: Rooms");
        assert_eq!(custom_rooms.name(), "🚧Custom VS: Rooms");
        assert_eq!(retro_rooms.description().unit, Some("Rooms"));

        // the description flows through to the pushed attributes as-is
        let state = Sensor::Aggregate(retro_rooms).evaluate(None);
        assert_eq!(state.attributes["friendly_name"], "🕹️Retro VS: Rooms");
        assert_eq!(state.attributes["icon"], "mdi:controller-classic-outline");
        assert_eq!(state.attributes["unit_of_measurement"], "Rooms");
        assert_eq!(state.attributes["state_class"], "measurement");
        assert!(!state.attributes.contains_key("device_class"));
    }

    #[test]
    fn enabled_groups_follow_entry_toggles() {
        let entry = EntryConfig {
            enable_retro_vs: true,
            enable_custom_vs: true,
            ..EntryConfig::default()
        };
        assert_eq!(
            enabled_groups(&entry),
            vec![AggregateGroup::RetroVs, AggregateGroup::CustomVs]
        );

        assert!(enabled_groups(&EntryConfig::default()).is_empty());
    }
}
