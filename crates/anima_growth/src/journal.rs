//! Append-only journals with retention caps: memories, observations,
//! open questions, visitor messages and agent notes.
//!
//! Everything here is server-owned and persisted as JSON. Caps are
//! enforced on insert so the files stay bounded on a small disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anima_core::AnimaError;

pub const MEMORY_CAP: usize = 200;
pub const OBSERVATION_CAP: usize = 100;
pub const QUESTION_CAP: usize = 50;
pub const VISITOR_CAP: usize = 50;
pub const NOTE_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub at: DateTime<Utc>,
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub at: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u64,
    pub asked_at: DateTime<Utc>,
    pub text: String,
    /// How many times curiosity has returned to this question.
    pub asked_count: u32,
    pub answer: Option<String>,
    pub answered_at: Option<DateTime<Utc>>,
    pub answered_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorRecord {
    pub at: DateTime<Utc>,
    pub name: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentNote {
    pub at: DateTime<Utc>,
    pub agent: String,
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    memories: VecDeque<MemoryEntry>,
    observations: VecDeque<Observation>,
    questions: VecDeque<Question>,
    visitors: VecDeque<VisitorRecord>,
    notes: VecDeque<AgentNote>,
    next_question_id: u64,
}

fn push_capped<T>(queue: &mut VecDeque<T>, cap: usize, item: T) {
    if queue.len() == cap {
        queue.pop_front();
    }
    queue.push_back(item);
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&mut self, kind: &str, text: &str, at: DateTime<Utc>) {
        push_capped(
            &mut self.memories,
            MEMORY_CAP,
            MemoryEntry {
                at,
                kind: kind.to_string(),
                text: text.to_string(),
            },
        );
    }

    pub fn observe(&mut self, text: &str, at: DateTime<Utc>) {
        push_capped(
            &mut self.observations,
            OBSERVATION_CAP,
            Observation {
                at,
                text: text.to_string(),
            },
        );
    }

    /// Ask a question; re-asking the same text bumps its count instead of
    /// duplicating it.
    pub fn ask(&mut self, text: &str, at: DateTime<Utc>) -> u64 {
        if let Some(q) = self
            .questions
            .iter_mut()
            .find(|q| q.text == text && q.answer.is_none())
        {
            q.asked_count += 1;
            return q.id;
        }
        self.next_question_id += 1;
        let id = self.next_question_id;
        push_capped(
            &mut self.questions,
            QUESTION_CAP,
            Question {
                id,
                asked_at: at,
                text: text.to_string(),
                asked_count: 1,
                answer: None,
                answered_at: None,
                answered_by: None,
            },
        );
        id
    }

    pub fn answer(
        &mut self,
        question_id: u64,
        answer: &str,
        by: Option<&str>,
        at: DateTime<Utc>,
    ) -> bool {
        if let Some(q) = self.questions.iter_mut().find(|q| q.id == question_id) {
            q.answer = Some(answer.to_string());
            q.answered_at = Some(at);
            q.answered_by = by.map(|s| s.to_string());
            true
        } else {
            false
        }
    }

    pub fn record_visitor(&mut self, name: Option<&str>, message: &str, at: DateTime<Utc>) {
        push_capped(
            &mut self.visitors,
            VISITOR_CAP,
            VisitorRecord {
                at,
                name: name.map(|s| s.to_string()),
                message: message.to_string(),
            },
        );
    }

    pub fn leave_note(&mut self, agent: &str, note: &str, at: DateTime<Utc>) {
        push_capped(
            &mut self.notes,
            NOTE_CAP,
            AgentNote {
                at,
                agent: agent.to_string(),
                note: note.to_string(),
            },
        );
    }

    pub fn memories(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.memories.iter()
    }

    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    pub fn open_questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(|q| q.answer.is_none())
    }

    pub fn question(&self, id: u64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn visitors(&self) -> impl Iterator<Item = &VisitorRecord> {
        self.visitors.iter()
    }

    pub fn notes(&self) -> impl Iterator<Item = &AgentNote> {
        self.notes.iter()
    }

    /// A short autobiography assembled from the most recent memories.
    pub fn autobiography(&self, max_entries: usize) -> String {
        self.memories
            .iter()
            .rev()
            .take(max_entries)
            .rev()
            .map(|m| format!("[{}] {}", m.at.format("%Y-%m-%d"), m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn save(&self, path: &Path) -> Result<(), AnimaError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load_or_default(path: &Path) -> Self {
        fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_cap() {
        let mut j = Journal::new();
        for i in 0..150 {
            j.observe(&format!("obs {}", i), Utc::now());
        }
        assert_eq!(j.observations().count(), OBSERVATION_CAP);
        // Oldest evicted.
        assert_eq!(j.observations().next().unwrap().text, "obs 50");
    }

    #[test]
    fn test_question_dedup_bumps_count() {
        let mut j = Journal::new();
        let a = j.ask("why is the light warm?", Utc::now());
        let b = j.ask("why is the light warm?", Utc::now());
        assert_eq!(a, b);
        assert_eq!(j.question(a).unwrap().asked_count, 2);
        assert_eq!(j.questions().count(), 1);
    }

    #[test]
    fn test_answer_flow() {
        let mut j = Journal::new();
        let id = j.ask("what is outside?", Utc::now());
        assert_eq!(j.open_questions().count(), 1);
        assert!(j.answer(id, "a garden", Some("visitor"), Utc::now()));
        assert_eq!(j.open_questions().count(), 0);
        assert_eq!(j.question(id).unwrap().answer.as_deref(), Some("a garden"));
    }

    #[test]
    fn test_answer_unknown_id() {
        let mut j = Journal::new();
        assert!(!j.answer(999, "nope", None, Utc::now()));
    }

    #[test]
    fn test_visitor_cap() {
        let mut j = Journal::new();
        for i in 0..80 {
            j.record_visitor(Some("ada"), &format!("hello {}", i), Utc::now());
        }
        assert_eq!(j.visitors().count(), VISITOR_CAP);
    }

    #[test]
    fn test_autobiography_recent_first_window() {
        let mut j = Journal::new();
        for i in 0..5 {
            j.remember("milestone", &format!("event {}", i), Utc::now());
        }
        let bio = j.autobiography(3);
        assert!(bio.contains("event 4"));
        assert!(!bio.contains("event 0"));
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.json");
        let mut j = Journal::new();
        j.remember("birth", "first light", Utc::now());
        j.ask("who am I?", Utc::now());
        j.leave_note("scribe", "canvas looked good today", Utc::now());
        j.save(&path).unwrap();
        let back = Journal::load_or_default(&path);
        assert_eq!(back, j);
    }
}
