use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Completion status shared by quests and side-quests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Todo,
    InProgress,
    Blocked,
    Done,
}

impl Status {
    pub fn is_done(self) -> bool {
        self == Status::Done
    }

    /// The Space/Enter toggle: done ↔ in_progress
    pub fn toggled(self) -> Status {
        if self == Status::Done {
            Status::InProgress
        } else {
            Status::Done
        }
    }
}

/// Quest priority; also used as a fallback weight source for side-quests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Cycle: low → medium → high → low
    pub fn cycled(self) -> Priority {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Low,
        }
    }
}

pub const MIN_TASK_LEVEL: u8 = 1;
pub const MAX_TASK_LEVEL: u8 = 5;

/// Cycle task level: 1 → 2 → 3 → 4 → 5 → 1
pub fn cycled_level(level: u8) -> u8 {
    if level >= MAX_TASK_LEVEL {
        MIN_TASK_LEVEL
    } else {
        level + 1
    }
}

/// A subtask owned by exactly one quest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideQuest {
    pub id: String,
    pub description: String,
    pub status: Status,
    /// Progress weight; absence falls back to priority-derived weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// True while a speculative insert awaits the server's authoritative copy
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optimistic: bool,
}

impl SideQuest {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        SideQuest {
            id: id.into(),
            description: description.into(),
            status: Status::Todo,
            weight: None,
            priority: None,
            optimistic: false,
        }
    }

    /// Synthesize a speculative side-quest with a synthetic id.
    /// Replaced (success) or removed (failure) when the service resolves.
    pub fn optimistic(quest_id: &str, description: &str, stamp_millis: i64) -> Self {
        SideQuest {
            id: format!("optimistic-{}-{}", quest_id, stamp_millis),
            description: description.to_string(),
            status: Status::Todo,
            weight: None,
            priority: None,
            optimistic: true,
        }
    }
}

/// Top-level work item; side_quests is ordered, ids unique within the quest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub description: String,
    pub priority: Priority,
    pub task_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    pub status: Status,
    #[serde(default)]
    pub side_quests: Vec<SideQuest>,
}

impl Quest {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Quest {
            id: id.into(),
            description: description.into(),
            priority: Priority::Medium,
            task_level: MIN_TASK_LEVEL,
            due_date: None,
            campaign_id: None,
            status: Status::Todo,
            side_quests: Vec::new(),
        }
    }

    pub fn side_quest(&self, sub_id: &str) -> Option<&SideQuest> {
        self.side_quests.iter().find(|s| s.id == sub_id)
    }

    pub fn side_quest_mut(&mut self, sub_id: &str) -> Option<&mut SideQuest> {
        self.side_quests.iter_mut().find(|s| s.id == sub_id)
    }
}

/// Partial update for a quest; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
}

impl QuestPatch {
    pub fn description(text: impl Into<String>) -> Self {
        QuestPatch {
            description: Some(text.into()),
            ..QuestPatch::default()
        }
    }

    pub fn priority(priority: Priority) -> Self {
        QuestPatch {
            priority: Some(priority),
            ..QuestPatch::default()
        }
    }

    pub fn task_level(level: u8) -> Self {
        QuestPatch {
            task_level: Some(level),
            ..QuestPatch::default()
        }
    }

    /// Apply the patch in place
    pub fn apply_to(&self, quest: &mut Quest) {
        if let Some(text) = &self.description {
            quest.description = text.clone();
        }
        if let Some(priority) = self.priority {
            quest.priority = priority;
        }
        if let Some(level) = self.task_level {
            quest.task_level = level;
        }
        if let Some(date) = self.due_date {
            quest.due_date = Some(date);
        }
        if let Some(campaign) = &self.campaign_id {
            quest.campaign_id = Some(campaign.clone());
        }
    }
}

/// Partial update for a side-quest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideQuestPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl SideQuestPatch {
    pub fn description(text: impl Into<String>) -> Self {
        SideQuestPatch {
            description: Some(text.into()),
            ..SideQuestPatch::default()
        }
    }

    /// Apply the patch in place
    pub fn apply_to(&self, sub: &mut SideQuest) {
        if let Some(text) = &self.description {
            sub.description = text.clone();
        }
        if let Some(weight) = self.weight {
            sub.weight = Some(weight);
        }
        if let Some(priority) = self.priority {
            sub.priority = Some(priority);
        }
    }
}
