use std::collections::BTreeMap;

use crate::errors::{Result, StoreError};
use crate::kv::{K_SETTINGS, KvStore};
use crate::models::{
    Checklist, ChecklistItem, ChecklistItemType, JobTemplate, PipelineStage, ReminderSetting,
    Settings, Tag, new_id,
};

/// Partial settings update; every helper below funnels through `update`.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub default_lead_share: Option<f64>,
    pub tags: Option<Vec<Tag>>,
    pub pipeline_stages: Option<Vec<PipelineStage>>,
    pub job_templates: Option<Vec<JobTemplate>>,
    pub checklists: Option<Vec<Checklist>>,
    pub reminders: Option<BTreeMap<String, ReminderSetting>>,
}

/// Platform configuration singleton: one `appSettings` blob.
pub struct SettingsStore<'a> {
    kv: &'a KvStore,
}

impl<'a> SettingsStore<'a> {
    pub fn new(kv: &'a KvStore) -> Self {
        Self { kv }
    }

    pub fn get(&self) -> Settings {
        self.kv.get_as(K_SETTINGS).unwrap_or_default()
    }

    /// Merges the patch into the current settings and persists the whole
    /// object. Parsing already defaults missing `isRequired` flags, so a
    /// pre-migration checklist gains the field on its next pass through
    /// here.
    pub fn update(&self, patch: SettingsPatch) -> Result<Settings> {
        let mut settings = self.get();
        if let Some(share) = patch.default_lead_share {
            settings.default_lead_share = share;
        }
        if let Some(tags) = patch.tags {
            settings.tags = tags;
        }
        if let Some(stages) = patch.pipeline_stages {
            settings.pipeline_stages = stages;
        }
        if let Some(templates) = patch.job_templates {
            settings.job_templates = templates;
        }
        if let Some(checklists) = patch.checklists {
            settings.checklists = checklists;
        }
        if let Some(reminders) = patch.reminders {
            settings.reminders = reminders;
        }
        self.kv.set_as(K_SETTINGS, &settings)?;
        Ok(settings)
    }

    pub fn set_default_lead_share(&self, share: f64) -> Result<Settings> {
        self.update(SettingsPatch {
            default_lead_share: Some(share),
            ..Default::default()
        })
    }

    // --- Tags ---

    pub fn add_tag(&self, name: &str, color: &str) -> Result<Tag> {
        let tag = Tag {
            id: new_id(),
            name: name.to_string(),
            color: color.to_string(),
        };
        let mut tags = self.get().tags;
        tags.push(tag.clone());
        self.update(SettingsPatch {
            tags: Some(tags),
            ..Default::default()
        })?;
        Ok(tag)
    }

    pub fn update_tag(&self, id: &str, name: Option<&str>, color: Option<&str>) -> Result<Tag> {
        let tags: Vec<Tag> = self
            .get()
            .tags
            .into_iter()
            .map(|mut t| {
                if t.id == id {
                    if let Some(name) = name {
                        t.name = name.to_string();
                    }
                    if let Some(color) = color {
                        t.color = color.to_string();
                    }
                }
                t
            })
            .collect();
        let updated = tags
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("tag", id))?;
        self.update(SettingsPatch {
            tags: Some(tags),
            ..Default::default()
        })?;
        Ok(updated)
    }

    pub fn remove_tag(&self, id: &str) -> Result<()> {
        let tags: Vec<Tag> = self.get().tags.into_iter().filter(|t| t.id != id).collect();
        self.update(SettingsPatch {
            tags: Some(tags),
            ..Default::default()
        })?;
        Ok(())
    }

    // --- Pipeline stages ---

    pub fn add_stage(&self, name: &str, color: &str) -> Result<PipelineStage> {
        let stage = PipelineStage {
            id: new_id(),
            name: name.to_string(),
            color: color.to_string(),
        };
        let mut stages = self.get().pipeline_stages;
        stages.push(stage.clone());
        self.update(SettingsPatch {
            pipeline_stages: Some(stages),
            ..Default::default()
        })?;
        Ok(stage)
    }

    pub fn rename_stage(&self, id: &str, name: &str) -> Result<()> {
        let mut stages = self.get().pipeline_stages;
        let stage = stages
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found("stage", id))?;
        stage.name = name.to_string();
        self.update(SettingsPatch {
            pipeline_stages: Some(stages),
            ..Default::default()
        })?;
        Ok(())
    }

    /// The 2-stage floor is the caller's concern; the store removes
    /// unconditionally.
    pub fn remove_stage(&self, id: &str) -> Result<()> {
        let stages: Vec<PipelineStage> = self
            .get()
            .pipeline_stages
            .into_iter()
            .filter(|s| s.id != id)
            .collect();
        self.update(SettingsPatch {
            pipeline_stages: Some(stages),
            ..Default::default()
        })?;
        Ok(())
    }

    /// Moves a stage left (negative) or right (positive) in the ordering,
    /// clamped at the ends.
    pub fn move_stage(&self, id: &str, delta: i32) -> Result<Vec<PipelineStage>> {
        let mut stages = self.get().pipeline_stages;
        let from = stages
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found("stage", id))?;
        let to = (from as i64 + i64::from(delta)).clamp(0, stages.len() as i64 - 1) as usize;
        let stage = stages.remove(from);
        stages.insert(to, stage);
        self.update(SettingsPatch {
            pipeline_stages: Some(stages.clone()),
            ..Default::default()
        })?;
        Ok(stages)
    }

    // --- Job templates ---

    pub fn add_template(
        &self,
        name: &str,
        title: &str,
        description: &str,
        category: &str,
    ) -> Result<JobTemplate> {
        let template = JobTemplate {
            id: new_id(),
            name: name.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: category.to_string(),
        };
        let mut templates = self.get().job_templates;
        templates.push(template.clone());
        self.update(SettingsPatch {
            job_templates: Some(templates),
            ..Default::default()
        })?;
        Ok(template)
    }

    pub fn remove_template(&self, id: &str) -> Result<()> {
        let templates: Vec<JobTemplate> = self
            .get()
            .job_templates
            .into_iter()
            .filter(|t| t.id != id)
            .collect();
        self.update(SettingsPatch {
            job_templates: Some(templates),
            ..Default::default()
        })?;
        Ok(())
    }

    // --- Checklists ---

    pub fn add_checklist(&self, name: &str) -> Result<Checklist> {
        let checklist = Checklist {
            id: new_id(),
            name: name.to_string(),
            items: Vec::new(),
        };
        let mut checklists = self.get().checklists;
        checklists.push(checklist.clone());
        self.update(SettingsPatch {
            checklists: Some(checklists),
            ..Default::default()
        })?;
        Ok(checklist)
    }

    pub fn add_checklist_item(
        &self,
        checklist_id: &str,
        item_type: ChecklistItemType,
        label: &str,
        is_required: bool,
        options: Option<Vec<String>>,
    ) -> Result<ChecklistItem> {
        let item = ChecklistItem {
            id: new_id(),
            item_type,
            label: label.to_string(),
            is_required,
            options,
        };
        let mut checklists = self.get().checklists;
        let checklist = checklists
            .iter_mut()
            .find(|c| c.id == checklist_id)
            .ok_or_else(|| StoreError::not_found("checklist", checklist_id))?;
        checklist.items.push(item.clone());
        self.update(SettingsPatch {
            checklists: Some(checklists),
            ..Default::default()
        })?;
        Ok(item)
    }

    pub fn remove_checklist_item(&self, checklist_id: &str, item_id: &str) -> Result<()> {
        let mut checklists = self.get().checklists;
        let checklist = checklists
            .iter_mut()
            .find(|c| c.id == checklist_id)
            .ok_or_else(|| StoreError::not_found("checklist", checklist_id))?;
        checklist.items.retain(|i| i.id != item_id);
        self.update(SettingsPatch {
            checklists: Some(checklists),
            ..Default::default()
        })?;
        Ok(())
    }

    pub fn remove_checklist(&self, id: &str) -> Result<()> {
        let checklists: Vec<Checklist> = self
            .get()
            .checklists
            .into_iter()
            .filter(|c| c.id != id)
            .collect();
        self.update(SettingsPatch {
            checklists: Some(checklists),
            ..Default::default()
        })?;
        Ok(())
    }

    // --- Reminders ---

    pub fn set_reminder(&self, key: &str, enabled: bool, timing: &str) -> Result<()> {
        let mut reminders = self.get().reminders;
        reminders.insert(
            key.to_string(),
            ReminderSetting {
                enabled,
                timing: timing.to_string(),
            },
        );
        self.update(SettingsPatch {
            reminders: Some(reminders),
            ..Default::default()
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::testutil::temp_store;
    use serde_json::json;

    #[test]
    fn defaults_when_absent() {
        let (_dir, kv) = temp_store();
        let settings = SettingsStore::new(&kv).get();
        assert_eq!(settings.default_lead_share, 50.0);
        assert_eq!(settings.pipeline_stages.len(), 3);
    }

    #[test]
    fn tag_crud_round_trips() {
        let (_dir, kv) = temp_store();
        let store = SettingsStore::new(&kv);
        let tag = store.add_tag("urgent", "#ef4444").unwrap();
        store.update_tag(&tag.id, Some("rush"), None).unwrap();
        assert_eq!(store.get().tags[0].name, "rush");
        assert_eq!(store.get().tags[0].color, "#ef4444");
        store.remove_tag(&tag.id).unwrap();
        assert!(store.get().tags.is_empty());
    }

    #[test]
    fn stage_reorder_clamps_at_ends() {
        let (_dir, kv) = temp_store();
        let store = SettingsStore::new(&kv);
        let first = store.get().pipeline_stages[0].id.clone();
        let stages = store.move_stage(&first, -1).unwrap();
        assert_eq!(stages[0].id, first);
        let stages = store.move_stage(&first, 2).unwrap();
        assert_eq!(stages[2].id, first);
    }

    #[test]
    fn update_only_touches_patched_fields() {
        let (_dir, kv) = temp_store();
        let store = SettingsStore::new(&kv);
        store.add_tag("roofing", "#888888").unwrap();
        store.set_default_lead_share(35.0).unwrap();
        let settings = store.get();
        assert_eq!(settings.default_lead_share, 35.0);
        assert_eq!(settings.tags.len(), 1);
    }

    #[test]
    fn legacy_checklist_items_gain_is_required_on_reload() {
        let (_dir, kv) = temp_store();
        // A blob written before the isRequired field existed.
        kv.set(
            crate::kv::K_SETTINGS,
            &json!({
                "checklists": [{
                    "id": "c1",
                    "name": "Install",
                    "items": [{"id": "i1", "type": "checkbox", "label": "Shut off water"}]
                }]
            }),
        )
        .unwrap();

        let store = SettingsStore::new(&kv);
        let settings = store.get();
        assert!(!settings.checklists[0].items[0].is_required);

        // After the next write the stored JSON carries the field explicitly.
        store.update(SettingsPatch::default()).unwrap();
        let raw = kv.get(crate::kv::K_SETTINGS).unwrap();
        assert_eq!(
            raw["checklists"][0]["items"][0]["isRequired"],
            json!(false)
        );
    }

    #[test]
    fn reminder_settings_persist() {
        let (_dir, kv) = temp_store();
        let store = SettingsStore::new(&kv);
        store.set_reminder("followUp", true, "2d").unwrap();
        let reminders = store.get().reminders;
        assert!(reminders["followUp"].enabled);
        assert_eq!(reminders["followUp"].timing, "2d");
    }
}
