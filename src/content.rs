//! XML content pack: engine tunables, quest templates, jobs, shop stock,
//! park placards and the props of the headless town.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use roxmltree::{Document, Node};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::input::KeyCode;
use crate::quest::{Job, ObjectiveTemplate, QuestTemplate};
use crate::scene::{
    optional_text, parse_color, parse_f32, parse_prop, required_text, PropSpec,
};

pub const BUNDLED_CONTENT: &str = include_str!("../assets/lifebot_town.xml");

/// Authoring mistakes found after a pack parsed successfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },
    #[error("quest `{0}` has no title")]
    MissingTitle(String),
    #[error("quest `{0}` has no objectives")]
    NoObjectives(String),
    #[error("job `{0}` pays no reward")]
    ZeroRewardJob(String),
    #[error("prop `{prop}` references unknown parent `{parent}`")]
    UnknownParent { prop: String, parent: String },
    #[error("shop item `{item}` references unknown prop `{prop}`")]
    UnknownShopProp { item: String, prop: String },
    #[error("landmark `{landmark}` references unknown prop `{prop}`")]
    UnknownLandmarkProp { landmark: String, prop: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShopItem {
    pub id: String,
    pub name: String,
    pub price: u32,
    pub item_type: Option<String>,
    pub description: String,
    /// Prop used as the item's hitbox.
    pub prop: String,
}

/// A park placard that can be read for a short blurb.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmark {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Shown as `title: message` when the placard is read.
    pub message: String,
    pub prop: String,
}

#[derive(Debug, Clone, Default)]
pub struct ContentPack {
    pub config: EngineConfig,
    pub quests: Vec<QuestTemplate>,
    pub jobs: Vec<Job>,
    pub shop: Vec<ShopItem>,
    pub landmarks: Vec<Landmark>,
    pub props: Vec<PropSpec>,
}

impl ContentPack {
    pub fn bundled() -> Result<Self> {
        Self::from_xml(BUNDLED_CONTENT).context("bundled content is invalid")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let xml = fs::read_to_string(path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        Self::from_xml(&xml).with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid content XML")?;
        let mut pack = ContentPack::default();
        for node in document.root_element().children().filter(Node::is_element) {
            match node.tag_name().name() {
                "config" => pack.config = parse_config(&node).context("invalid <config>")?,
                "quest" => pack.quests.push(parse_quest(&node)?),
                "job" => pack.jobs.push(parse_job(&node)?),
                "shop-item" => pack.shop.push(parse_shop_item(&node)?),
                "landmark" => pack.landmarks.push(parse_landmark(&node)?),
                "prop" => pack.props.push(parse_prop(&node)?),
                _ => {}
            }
        }
        pack.validate()?;
        Ok(pack)
    }

    pub fn validate(&self) -> Result<(), ContentError> {
        unique("quest", self.quests.iter().map(|quest| quest.id.as_str()))?;
        unique("job", self.jobs.iter().map(|job| job.id.as_str()))?;
        unique("shop item", self.shop.iter().map(|item| item.id.as_str()))?;
        unique("landmark", self.landmarks.iter().map(|mark| mark.id.as_str()))?;
        unique("prop", self.props.iter().map(|prop| prop.name.as_str()))?;

        for quest in &self.quests {
            if quest.title.trim().is_empty() {
                return Err(ContentError::MissingTitle(quest.id.clone()));
            }
            if quest.objectives.is_empty() {
                return Err(ContentError::NoObjectives(quest.id.clone()));
            }
            unique("objective", quest.objectives.iter().map(|o| o.id.as_str()))?;
        }
        if let Some(job) = self.jobs.iter().find(|job| job.reward == 0) {
            return Err(ContentError::ZeroRewardJob(job.id.clone()));
        }

        let mut seen = HashSet::new();
        for prop in &self.props {
            if let Some(parent) = &prop.parent {
                if !seen.contains(parent.as_str()) {
                    return Err(ContentError::UnknownParent {
                        prop: prop.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
            seen.insert(prop.name.as_str());
        }
        if let Some(item) = self.shop.iter().find(|item| !seen.contains(item.prop.as_str())) {
            return Err(ContentError::UnknownShopProp {
                item: item.id.clone(),
                prop: item.prop.clone(),
            });
        }
        if let Some(mark) = self
            .landmarks
            .iter()
            .find(|mark| !seen.contains(mark.prop.as_str()))
        {
            return Err(ContentError::UnknownLandmarkProp {
                landmark: mark.id.clone(),
                prop: mark.prop.clone(),
            });
        }
        Ok(())
    }

    pub fn quest(&self, quest_id: &str) -> Option<&QuestTemplate> {
        self.quests.iter().find(|quest| quest.id == quest_id)
    }

    pub fn shop_item(&self, item_id: &str) -> Option<&ShopItem> {
        self.shop.iter().find(|item| item.id == item_id)
    }
}

fn unique<'a>(kind: &'static str, ids: impl Iterator<Item = &'a str>) -> Result<(), ContentError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ContentError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn required_attr(node: &Node<'_, '_>, name: &str) -> Result<String> {
    node.attribute(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("<{}> is missing the `{name}` attribute", node.tag_name().name()))
}

fn parse_u32(value: Option<String>, default: u32) -> Result<u32> {
    match value {
        Some(value) => value
            .parse::<u32>()
            .map_err(|err| anyhow!("failed to parse integer {value}: {err}")),
        None => Ok(default),
    }
}

fn parse_key(value: Option<String>, default: KeyCode) -> Result<KeyCode> {
    match value {
        Some(value) => KeyCode::from_code(&value).ok_or_else(|| anyhow!("unknown key {value}")),
        None => Ok(default),
    }
}

fn parse_config(node: &Node<'_, '_>) -> Result<EngineConfig> {
    let defaults = EngineConfig::default();
    let interaction_range = parse_f32(
        optional_text(node, "interaction-range"),
        defaults.interaction_range,
    )?;
    Ok(EngineConfig {
        starting_coins: parse_u32(optional_text(node, "starting-coins"), defaults.starting_coins)?,
        key_history_limit: parse_u32(
            optional_text(node, "key-history"),
            defaults.key_history_limit as u32,
        )? as usize,
        interaction_range,
        probe_length: parse_f32(optional_text(node, "probe-length"), interaction_range)?,
        default_prompt: optional_text(node, "default-prompt").unwrap_or(defaults.default_prompt),
        highlight_color: parse_color(
            optional_text(node, "highlight-color"),
            defaults.highlight_color,
        )?,
        action_key: parse_key(optional_text(node, "action-key"), defaults.action_key)?,
        secret_key: parse_key(optional_text(node, "secret-key"), defaults.secret_key)?,
        secret_presses: parse_u32(
            optional_text(node, "secret-presses"),
            defaults.secret_presses as u32,
        )? as usize,
        secret_window_ms: f64::from(parse_f32(
            optional_text(node, "secret-window-ms"),
            defaults.secret_window_ms as f32,
        )?),
        harvest_cooldown_ms: f64::from(parse_f32(
            optional_text(node, "harvest-cooldown-ms"),
            defaults.harvest_cooldown_ms as f32,
        )?),
        quest_toast_ms: u64::from(parse_u32(
            optional_text(node, "quest-toast-ms"),
            defaults.quest_toast_ms as u32,
        )?),
    })
}

fn parse_quest(node: &Node<'_, '_>) -> Result<QuestTemplate> {
    let id = required_attr(node, "id")?;
    let objectives = node
        .children()
        .filter(|child| child.has_tag_name("objective"))
        .map(|child| {
            let objective_id = required_attr(&child, "id")?;
            let label = child.text().map(str::trim).unwrap_or_default();
            Ok(ObjectiveTemplate::new(objective_id, label))
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("invalid objective in quest {id}"))?;
    Ok(QuestTemplate {
        title: optional_text(node, "title").unwrap_or_default(),
        description: optional_text(node, "description").unwrap_or_default(),
        completion_text: optional_text(node, "completion-text").unwrap_or_default(),
        reward_text: optional_text(node, "reward-text").unwrap_or_default(),
        reward_coins: parse_u32(optional_text(node, "reward-coins"), 0)
            .with_context(|| format!("invalid reward in quest {id}"))?,
        reward_flag: optional_text(node, "reward-flag"),
        objectives,
        id,
    })
}

fn parse_job(node: &Node<'_, '_>) -> Result<Job> {
    let id = required_attr(node, "id")?;
    let reward = parse_u32(node.attribute("reward").map(str::to_string), 0)
        .with_context(|| format!("invalid reward for job {id}"))?;
    let label = node
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| anyhow!("job {id} has no label"))?
        .to_string();
    Ok(Job { id, label, reward })
}

fn parse_shop_item(node: &Node<'_, '_>) -> Result<ShopItem> {
    let id = required_attr(node, "id")?;
    let price = parse_u32(node.attribute("price").map(str::to_string), 0)
        .with_context(|| format!("invalid price for {id}"))?;
    Ok(ShopItem {
        name: required_text(node, "name").with_context(|| format!("shop item {id}"))?,
        item_type: optional_text(node, "type"),
        description: optional_text(node, "description").unwrap_or_default(),
        prop: node
            .attribute("prop")
            .map(str::to_string)
            .unwrap_or_else(|| format!("shop-item-{id}")),
        price,
        id,
    })
}

fn parse_landmark(node: &Node<'_, '_>) -> Result<Landmark> {
    let id = required_attr(node, "id")?;
    Ok(Landmark {
        title: required_text(node, "title").with_context(|| format!("landmark {id}"))?,
        description: optional_text(node, "description").unwrap_or_default(),
        message: optional_text(node, "message").unwrap_or_default(),
        prop: node
            .attribute("prop")
            .map(str::to_string)
            .unwrap_or_else(|| format!("placard-{id}")),
        id,
    })
}

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;

    use super::*;
    use crate::quest::storyline::{FIRST_STEPS, HARBOR_BRIEFING, SPY_INITIATIVE, SUIT_UP};

    static BUNDLED: Lazy<ContentPack> =
        Lazy::new(|| ContentPack::bundled().expect("bundled content parses"));

    #[test]
    fn bundled_pack_has_the_story() {
        for id in [FIRST_STEPS, HARBOR_BRIEFING, SUIT_UP, SPY_INITIATIVE] {
            assert!(BUNDLED.quest(id).is_some(), "missing quest {id}");
        }
        let harbor = BUNDLED.quest(HARBOR_BRIEFING).expect("harbor");
        assert_eq!(harbor.reward_coins, 12);
        assert_eq!(harbor.reward_flag.as_deref(), Some("bridge-authorized"));
        let jobs: Vec<&str> = BUNDLED.jobs.iter().map(|job| job.id.as_str()).collect();
        assert_eq!(jobs, vec!["deliver-energy", "stadium-cheer", "bridge-patrol"]);
        assert_eq!(BUNDLED.shop_item("spy-pass").map(|item| item.price), Some(14));
        assert_eq!(BUNDLED.landmarks.len(), 11);
        assert_eq!(BUNDLED.config.starting_coins, 25);
        assert_eq!(BUNDLED.config.action_key, KeyCode::Character('E'));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let xml = r#"<town>
            <job id="a" reward="1">One</job>
            <job id="a" reward="2">Two</job>
        </town>"#;
        let err = ContentPack::from_xml(xml).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ContentError>(),
            Some(&ContentError::DuplicateId {
                kind: "job",
                id: "a".into()
            })
        );
    }

    #[test]
    fn quests_need_titles_and_objectives() {
        let untitled = r#"<town><quest id="q"><objective id="a">A</objective></quest></town>"#;
        let err = ContentPack::from_xml(untitled).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ContentError>(),
            Some(&ContentError::MissingTitle("q".into()))
        );

        let empty = r#"<town><quest id="q"><title>Q</title></quest></town>"#;
        let err = ContentPack::from_xml(empty).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ContentError>(),
            Some(&ContentError::NoObjectives("q".into()))
        );
    }

    #[test]
    fn shop_items_must_point_at_props() {
        let xml = r#"<town>
            <shop-item id="hat" price="3"><name>Hat</name></shop-item>
        </town>"#;
        let err = ContentPack::from_xml(xml).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ContentError>(),
            Some(&ContentError::UnknownShopProp {
                item: "hat".into(),
                prop: "shop-item-hat".into()
            })
        );
    }

    #[test]
    fn landmarks_default_to_placard_props() {
        let xml = r#"<town>
            <landmark id="aviary"><title>Aviary</title></landmark>
        </town>"#;
        let err = ContentPack::from_xml(xml).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ContentError>(),
            Some(&ContentError::UnknownLandmarkProp {
                landmark: "aviary".into(),
                prop: "placard-aviary".into()
            })
        );

        let untitled = r#"<town><landmark id="aviary"/></town>"#;
        assert!(ContentPack::from_xml(untitled).is_err());
    }

    #[test]
    fn config_overrides_defaults() {
        let xml = r#"<town><config>
            <starting-coins>3</starting-coins>
            <interaction-range>4</interaction-range>
            <action-key>KeyF</action-key>
            <highlight-color>#ff0000</highlight-color>
        </config></town>"#;
        let pack = ContentPack::from_xml(xml).expect("parses");
        assert_eq!(pack.config.starting_coins, 3);
        assert_eq!(pack.config.interaction_range, 4.0);
        assert_eq!(pack.config.probe_length, 4.0);
        assert_eq!(pack.config.action_key, KeyCode::Character('F'));
        assert_eq!(pack.config.highlight_color.x, 1.0);
        assert_eq!(pack.config.default_prompt, "Press E to interact");
    }

    #[test]
    fn load_reads_files() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(br#"<town><job id="x" reward="2">Sweep</job></town>"#)
            .expect("write");
        let pack = ContentPack::load(file.path()).expect("loads");
        assert_eq!(pack.jobs.len(), 1);
        assert!(ContentPack::load(Path::new("/definitely/not/here.xml")).is_err());
    }
}
