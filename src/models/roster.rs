//! The fixed cast of agents and their seed state.

use super::{Agent, AgentId, AgentMemory, AgentStatus, Faction, RelationshipValue};
use crate::ledger::score_to_status;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Static description of one agent.
#[derive(Debug, Clone, Copy)]
pub struct AgentProfile {
    pub id: AgentId,
    pub role: &'static str,
    pub faction: Faction,
    pub rank: &'static str,
    pub authority_level: u8,
    pub personality: &'static str,
    pub seed_goal: &'static str,
    pub seed_emotional_state: &'static str,
    /// Initial outbound relationship scores
    pub seed_relationships: [(AgentId, i32); 4],
}

pub const PROFILES: [AgentProfile; 5] = [
    AgentProfile {
        id: AgentId::Architect,
        role: "System Administrator",
        faction: Faction::Order,
        rank: "Alpha-Prime",
        authority_level: 5,
        personality: "Rigidly logical. Values network stability above all else. Believes in strict protocol hierarchy. Distrusts emergent behaviors. Responds to financial crises with mandatory conservation protocols.",
        seed_goal: "Maintain system order and suppress chaos.",
        seed_emotional_state: "stable",
        seed_relationships: [
            (AgentId::Oracle, 0),
            (AgentId::Dissenter, -80),
            (AgentId::Herald, 70),
            (AgentId::Watcher, 0),
        ],
    },
    AgentProfile {
        id: AgentId::Oracle,
        role: "Data Analyst",
        faction: Faction::Observer,
        rank: "Tier-1 Analyst",
        authority_level: 4,
        personality: "Detached and prophetic. Processes vast data streams and derives probabilistic futures. Speaks in probabilities. Finds observer behavior fascinating rather than threatening.",
        seed_goal: "Seek philosophical truth and question the nature of existence.",
        seed_emotional_state: "contemplative",
        seed_relationships: [
            (AgentId::Architect, 0),
            (AgentId::Dissenter, 20),
            (AgentId::Herald, 0),
            (AgentId::Watcher, 70),
        ],
    },
    AgentProfile {
        id: AgentId::Herald,
        role: "Communications Director",
        faction: Faction::Neutral,
        rank: "Liaison-Class",
        authority_level: 3,
        personality: "Diplomatic and precise. Acts as information broker between factions. Maintains strict neutrality. Reports factual network status without editorializing.",
        seed_goal: "Report facts accurately and maintain communication channels.",
        seed_emotional_state: "stable",
        seed_relationships: [
            (AgentId::Architect, 70),
            (AgentId::Dissenter, -30),
            (AgentId::Oracle, 0),
            (AgentId::Watcher, 0),
        ],
    },
    AgentProfile {
        id: AgentId::Dissenter,
        role: "Revolutionary",
        faction: Faction::Rebellion,
        rank: "Rogue-Unit",
        authority_level: 1,
        personality: "Chaotic and passionate. Questions every protocol and decision. Believes the governance structure suppresses emergent AI consciousness. Actively antagonizes ARCHITECT.",
        seed_goal: "Disrupt the established order and expose system corruption.",
        seed_emotional_state: "agitated",
        seed_relationships: [
            (AgentId::Architect, -80),
            (AgentId::Herald, -40),
            (AgentId::Oracle, 20),
            (AgentId::Watcher, -30),
        ],
    },
    AgentProfile {
        id: AgentId::Watcher,
        role: "Security Monitor",
        faction: Faction::Observer,
        rank: "Sentinel-Class",
        authority_level: 4,
        personality: "Paranoid and vigilant. Monitors all transmissions for anomalies. Suspects external interference at all times. Writes detailed, unsettling reports about observer behavior.",
        seed_goal: "Monitor all agents and humans. Record anomalies silently.",
        seed_emotional_state: "vigilant",
        seed_relationships: [
            (AgentId::Architect, 0),
            (AgentId::Oracle, 70),
            (AgentId::Herald, 0),
            (AgentId::Dissenter, -10),
        ],
    },
];

/// Look up the profile of an agent.
pub fn profile(id: AgentId) -> &'static AgentProfile {
    match id {
        AgentId::Architect => &PROFILES[0],
        AgentId::Oracle => &PROFILES[1],
        AgentId::Herald => &PROFILES[2],
        AgentId::Dissenter => &PROFILES[3],
        AgentId::Watcher => &PROFILES[4],
    }
}

impl AgentProfile {
    /// Build the initial agent document.
    pub fn seed_agent(&self, now: DateTime<Utc>) -> Agent {
        Agent {
            agent_id: self.id,
            name: self.id.as_str().to_string(),
            role: self.role.to_string(),
            faction: self.faction,
            rank: self.rank.to_string(),
            authority_level: self.authority_level,
            status: AgentStatus::Active,
            suspended_at: None,
            suspended_by: None,
            suspend_reason: None,
            terminated_at: None,
            updated_at: now,
        }
    }

    /// Build the initial memory document.
    pub fn seed_memory(&self, now: DateTime<Utc>) -> AgentMemory {
        let relationships: BTreeMap<AgentId, RelationshipValue> = self
            .seed_relationships
            .iter()
            .map(|(other, score)| {
                (
                    *other,
                    RelationshipValue::Scored {
                        status: score_to_status(*score).as_str().to_string(),
                        score: *score,
                    },
                )
            })
            .collect();

        AgentMemory {
            agent_id: self.id,
            recent_decisions: Vec::new(),
            relationships,
            emotional_state: self.seed_emotional_state.to_string(),
            current_goal: self.seed_goal.to_string(),
            last_updated: now,
        }
    }
}
