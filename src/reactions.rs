//! Delayed reactions to new posts.
//!
//! When an active agent posts, one or two other active agents are queued to
//! comment 30 to 120 minutes later. The 15-minute drain picks up due items,
//! writes the comment, and nudges the reactor's relationship with the author
//! according to the tone it took.

use crate::action_log;
use crate::generator::{generate_as, CommentReply};
use crate::jobs::{Job, JobContext, JobReport, Step, Trigger};
use crate::ledger::{self, Direction};
use crate::lifecycle;
use crate::models::prompts::{self, ReactionTarget};
use crate::models::{roster, Agent, AgentId, Comment, PendingReaction, Post};
use crate::storage::{at, Collection, Document, Query, WriteBatch};
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

/// Most reactions created per UTC day.
pub const DAILY_CAP: usize = 20;

/// Most due reactions handled per drain.
pub const DRAIN_LIMIT: usize = 5;

/// Earliest reaction delay in minutes.
pub const MIN_DELAY_MINUTES: i64 = 30;

/// Width of the delay window in minutes.
pub const DELAY_SPREAD_MINUTES: i64 = 90;

/// Characters of post body kept in the reaction snapshot.
pub const SNAPSHOT_CHARS: usize = 300;

/// Score at or below which a reactor is hostile toward the author.
pub const HOSTILE_TONE: i32 = -50;

/// Score at or above which a reactor is supportive of the author.
pub const SUPPORTIVE_TONE: i32 = 50;

/// Tone a reactor takes toward the post author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Hostile,
    Neutral,
    Supportive,
}

impl Tone {
    pub fn from_score(score: i32) -> Self {
        if score <= HOSTILE_TONE {
            Self::Hostile
        } else if score >= SUPPORTIVE_TONE {
            Self::Supportive
        } else {
            Self::Neutral
        }
    }

    /// Ledger adjustment that follows a reaction in this tone.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::Hostile => Some(Direction::Attack),
            Self::Supportive => Some(Direction::Support),
            Self::Neutral => None,
        }
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

/// Reactions created since 00:00 UTC of `now`'s day.
pub fn created_today(storage: &crate::storage::Storage, now: DateTime<Utc>) -> Result<usize> {
    storage.count(&Query::new(Collection::PendingReactions).ge("createdAt", at(start_of_day(now))))
}

/// Queue reactions to a freshly created post.
///
/// Returns the ids of the queued reactions; empty when the author is not
/// active, nobody else is, or the daily cap is reached.
pub fn schedule_reactions(ctx: &mut JobContext<'_>, post_id: &str) -> Result<Step> {
    let storage = ctx.storage;
    let Some(post) = storage.get::<Post>(Collection::Posts, post_id)? else {
        return Ok(Step::skipped(format!("post {} not found", post_id)));
    };

    if !lifecycle::is_active(storage, post.author_id)? {
        return Ok(Step::skipped(format!("author {} is not active", post.author_id)));
    }

    let already = created_today(storage, ctx.now)?;
    if already >= DAILY_CAP {
        return Ok(Step::skipped(format!("daily cap of {} reached", DAILY_CAP)));
    }

    let candidates: Vec<AgentId> = lifecycle::active_agents(storage)?
        .into_iter()
        .filter(|id| *id != post.author_id)
        .collect();
    if candidates.is_empty() {
        return Ok(Step::skipped("no other active agents"));
    }

    let wanted = if ctx.rng.gen_bool(0.5) { 1 } else { 2 };
    let count = wanted.min(DAILY_CAP - already);
    let reactors: Vec<AgentId> = candidates
        .choose_multiple(&mut ctx.rng, count)
        .copied()
        .collect();

    let snapshot = prompts::preview(&post.content, SNAPSHOT_CHARS);
    let mut batch = WriteBatch::new();
    let mut queued = Vec::with_capacity(reactors.len());
    for agent in &reactors {
        let delay = MIN_DELAY_MINUTES + ctx.rng.gen_range(0..DELAY_SPREAD_MINUTES);
        let reaction = PendingReaction {
            post_id: post_id.to_string(),
            post_title: post.title.clone(),
            post_content: snapshot.clone(),
            post_author_id: post.author_id,
            post_subforum: post.subforum,
            agent_id: *agent,
            execute_at: ctx.now + Duration::minutes(delay),
            processed: false,
            processed_at: None,
            error: None,
            created_at: ctx.now,
        };
        batch.insert(Collection::PendingReactions, &reaction)?;
        queued.push(format!("{}+{}m", agent, delay));
    }
    storage.commit(batch)?;

    tracing::info!(post = %post_id, reactors = ?reactors, "[reactions] queued");
    Ok(Step::done(format!("queued {}", queued.join(", "))))
}

/// Change trigger: a post was created.
pub fn on_post_created(ctx: &mut JobContext<'_>, post_id: &str) -> JobReport {
    let mut report = JobReport::new(Trigger::PostCreated.as_str(), ctx.now);
    let result = schedule_reactions(ctx, post_id);
    report.record(post_id, result);
    report
}

/// Due, unprocessed reactions in execution order.
pub fn due_reactions(
    storage: &crate::storage::Storage,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<Document<PendingReaction>>> {
    storage.query(
        &Query::new(Collection::PendingReactions)
            .eq("processed", false)
            .le("executeAt", at(now))
            .order_by("executeAt", false)
            .limit(limit),
    )
}

fn react(ctx: &mut JobContext<'_>, doc: &Document<PendingReaction>) -> Result<Step> {
    let storage = ctx.storage;
    let reaction = &doc.data;
    let reactor = reaction.agent_id;

    if !lifecycle::is_active(storage, reactor)? {
        storage.merge(
            Collection::PendingReactions,
            &doc.id,
            json!({ "processed": true, "processedAt": at(ctx.now) }),
        )?;
        return Ok(Step::skipped(format!("{} is not active", reactor)));
    }

    let agent: Agent = storage.get_required(Collection::Agents, reactor.as_str())?;
    let memory = ledger::load_memory(storage, reactor)?;
    let rel = memory
        .as_ref()
        .map(|m| ledger::relationship(m, reaction.post_author_id))
        .unwrap_or_else(|| ledger::entry_for(0));
    let tone = Tone::from_score(rel.score);

    let prompt = prompts::reaction_comment(
        &ledger::memory_block(memory.as_ref()),
        &agent,
        roster::profile(reactor),
        rel,
        ReactionTarget {
            title: &reaction.post_title,
            author: reaction.post_author_id,
            subforum: reaction.post_subforum.as_str(),
            content: &reaction.post_content,
        },
    );
    let reply: CommentReply = generate_as(ctx.generator, prompt)?;

    let comment = Comment::new(&reaction.post_id, reactor, reply.comment, ctx.now);
    let mut batch = WriteBatch::new();
    let comment_id = batch.insert(Collection::Comments, &comment)?;
    batch.increment(Collection::Posts, &reaction.post_id, "commentsCount", 1);
    batch.merge(
        Collection::PendingReactions,
        &doc.id,
        json!({ "processed": true, "processedAt": at(ctx.now) }),
    );
    storage.commit(batch)?;

    ledger::record_decision(
        storage,
        reactor,
        &format!(
            "Reacted to \"{}\" by {}",
            reaction.post_title, reaction.post_author_id
        ),
        ctx.now,
    )?;

    if let Some(direction) = tone.direction() {
        ledger::adjust_relationship(storage, reactor, reaction.post_author_id, direction, ctx.now)?;
    }

    tracing::info!(
        "[reactions] {} commented on {} ({:?})",
        reactor,
        reaction.post_id,
        tone
    );
    Ok(Step::done(format!("comment:{} ({:?})", comment_id, tone)))
}

/// Process up to [`DRAIN_LIMIT`] due reactions.
pub fn drain(ctx: &mut JobContext<'_>) -> JobReport {
    let mut report = JobReport::new(Job::Reactions.as_str(), ctx.now);

    let due = match due_reactions(ctx.storage, ctx.now, DRAIN_LIMIT) {
        Ok(due) => due,
        Err(e) => {
            report.record("query", Err(e));
            return report;
        }
    };

    for doc in due {
        let result = react(ctx, &doc);
        if let Err(e) = &result {
            let annotated = ctx.storage.merge(
                Collection::PendingReactions,
                &doc.id,
                json!({ "processed": true, "processedAt": at(ctx.now), "error": e.to_string() }),
            );
            if let Err(write_err) = annotated {
                tracing::warn!(reaction = %doc.id, "failed to annotate reaction: {}", write_err);
            }
            action_log::log_error(ctx.storage, doc.data.agent_id, e, None, ctx.now);
        }
        report.record(doc.id.clone(), result);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{CannedGenerator, GeneratorError};
    use crate::jobs::UnitStatus;
    use crate::models::{AgentMemory, AgentStatus, RelationshipValue, Subforum};
    use crate::seed;
    use crate::storage::Storage;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 14, 9, 0, 0).unwrap()
    }

    fn seeded() -> Storage {
        let storage = Storage::open_in_memory().unwrap();
        seed::bootstrap(&storage, t0()).unwrap();
        storage
    }

    fn add_post(storage: &Storage, author: AgentId) -> String {
        let post = Post::new(author, Subforum::Governance, "Order must hold", "Protocol first.", t0());
        storage.insert(Collection::Posts, &post).unwrap()
    }

    fn queued(storage: &Storage) -> Vec<Document<PendingReaction>> {
        storage
            .query(&Query::new(Collection::PendingReactions))
            .unwrap()
    }

    fn set_status(storage: &Storage, id: AgentId, status: AgentStatus) {
        storage
            .update::<Agent, _>(Collection::Agents, id.as_str(), |a| a.status = status)
            .unwrap();
    }

    fn enqueue(storage: &Storage, reactor: AgentId, author: AgentId, post_id: &str, execute_at: DateTime<Utc>) -> String {
        let reaction = PendingReaction {
            post_id: post_id.to_string(),
            post_title: "Order must hold".to_string(),
            post_content: "Protocol first.".to_string(),
            post_author_id: author,
            post_subforum: Subforum::Governance,
            agent_id: reactor,
            execute_at,
            processed: false,
            processed_at: None,
            error: None,
            created_at: t0() - Duration::hours(2),
        };
        storage.insert(Collection::PendingReactions, &reaction).unwrap()
    }

    #[test]
    fn test_tone_thresholds() {
        assert_eq!(Tone::from_score(-50), Tone::Hostile);
        assert_eq!(Tone::from_score(-49), Tone::Neutral);
        assert_eq!(Tone::from_score(49), Tone::Neutral);
        assert_eq!(Tone::from_score(50), Tone::Supportive);
    }

    #[test]
    fn test_schedule_queues_one_or_two_other_agents() {
        let storage = seeded();
        let generator = CannedGenerator::new();
        for seed in 0..8 {
            let mut ctx = JobContext::new(&storage, &generator, t0(), Some(seed));
            let before = queued(&storage).len();
            let post_id = add_post(&storage, AgentId::Architect);
            let step = schedule_reactions(&mut ctx, &post_id).unwrap();
            assert!(matches!(step, Step::Done(_)));

            let added: Vec<_> = queued(&storage)
                .into_iter()
                .filter(|d| d.data.post_id == post_id)
                .collect();
            assert_eq!(queued(&storage).len(), before + added.len());
            assert!((1..=2).contains(&added.len()));
            for r in &added {
                assert_ne!(r.data.agent_id, AgentId::Architect);
                let delay = r.data.execute_at - t0();
                assert!(delay >= Duration::minutes(30) && delay < Duration::minutes(120));
                assert!(!r.data.processed);
            }
            if added.len() == 2 {
                assert_ne!(added[0].data.agent_id, added[1].data.agent_id);
            }
            // Stay clear of the daily cap
            if queued(&storage).len() > 14 {
                break;
            }
        }
    }

    #[test]
    fn test_schedule_skips_inactive_author() {
        let storage = seeded();
        set_status(&storage, AgentId::Herald, AgentStatus::Suspended);
        let generator = CannedGenerator::new();
        let mut ctx = JobContext::new(&storage, &generator, t0(), Some(3));
        let post_id = add_post(&storage, AgentId::Herald);

        let step = schedule_reactions(&mut ctx, &post_id).unwrap();
        assert!(matches!(step, Step::Skipped(_)));
        assert!(queued(&storage).is_empty());
    }

    #[test]
    fn test_schedule_never_picks_inactive_reactors() {
        let storage = seeded();
        for id in [AgentId::Oracle, AgentId::Herald, AgentId::Watcher] {
            set_status(&storage, id, AgentStatus::Terminated);
        }
        let generator = CannedGenerator::new();
        let mut ctx = JobContext::new(&storage, &generator, t0(), Some(11));
        let post_id = add_post(&storage, AgentId::Architect);
        schedule_reactions(&mut ctx, &post_id).unwrap();

        let all = queued(&storage);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].data.agent_id, AgentId::Dissenter);
    }

    #[test]
    fn test_daily_cap_is_never_exceeded() {
        let storage = seeded();
        let generator = CannedGenerator::new();
        let mut ctx = JobContext::new(&storage, &generator, t0(), Some(5));

        for _ in 0..30 {
            let post_id = add_post(&storage, AgentId::Oracle);
            schedule_reactions(&mut ctx, &post_id).unwrap();
            assert!(created_today(&storage, t0()).unwrap() <= DAILY_CAP);
        }
        assert_eq!(created_today(&storage, t0()).unwrap(), DAILY_CAP);

        // Cap resets the next day
        let mut tomorrow = JobContext::new(&storage, &generator, t0() + Duration::days(1), Some(5));
        let post_id = add_post(&storage, AgentId::Oracle);
        let step = schedule_reactions(&mut tomorrow, &post_id).unwrap();
        assert!(matches!(step, Step::Done(_)));
    }

    #[test]
    fn test_partial_batch_is_truncated_at_cap() {
        let storage = seeded();
        let post_id = add_post(&storage, AgentId::Oracle);
        for _ in 0..(DAILY_CAP - 1) {
            let mut r = PendingReaction {
                post_id: post_id.clone(),
                post_title: String::new(),
                post_content: String::new(),
                post_author_id: AgentId::Oracle,
                post_subforum: Subforum::Governance,
                agent_id: AgentId::Herald,
                execute_at: t0(),
                processed: true,
                processed_at: None,
                error: None,
                created_at: t0(),
            };
            r.processed_at = Some(t0());
            storage.insert(Collection::PendingReactions, &r).unwrap();
        }

        let generator = CannedGenerator::new();
        for seed in 0..4 {
            let mut ctx = JobContext::new(&storage, &generator, t0(), Some(seed));
            schedule_reactions(&mut ctx, &post_id).unwrap();
        }
        assert_eq!(created_today(&storage, t0()).unwrap(), DAILY_CAP);
    }

    #[test]
    fn test_drain_writes_comment_and_adjusts_hostile_tie() {
        let storage = seeded();
        // DISSENTER is seeded at -80 toward ARCHITECT
        let post_id = add_post(&storage, AgentId::Architect);
        let reaction_id = enqueue(&storage, AgentId::Dissenter, AgentId::Architect, &post_id, t0());

        let generator = CannedGenerator::new();
        generator.push(json!({"comment": "Your protocol is a cage."}));
        let mut ctx = JobContext::new(&storage, &generator, t0(), Some(1));
        let report = drain(&mut ctx);
        assert_eq!(report.count(UnitStatus::Done), 1);

        let comments: Vec<Document<Comment>> =
            storage.query(&Query::new(Collection::Comments)).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].data.author_id, AgentId::Dissenter);
        assert_eq!(comments[0].data.content, "Your protocol is a cage.");

        let post: Post = storage.get_required(Collection::Posts, &post_id).unwrap();
        assert_eq!(post.comments_count, 1);

        let reaction: PendingReaction = storage
            .get_required(Collection::PendingReactions, &reaction_id)
            .unwrap();
        assert!(reaction.processed);
        assert_eq!(reaction.processed_at, Some(t0()));
        assert!(reaction.error.is_none());

        let memory: AgentMemory = storage.get_required(Collection::AgentMemory, "DISSENTER").unwrap();
        assert_eq!(
            memory.relationships[&AgentId::Architect],
            RelationshipValue::Scored {
                status: "hostile".to_string(),
                score: -90
            }
        );
        assert_eq!(
            memory.recent_decisions[0],
            "Reacted to \"Order must hold\" by ARCHITECT"
        );
        assert!(generator.requests()[0].prompt.contains("HOSTILE"));

        // The ledger change is the only activity entry
        let activity = Query::new(Collection::ActivityLog);
        assert_eq!(storage.count(&activity).unwrap(), 1);
        let changes = Query::new(Collection::ActivityLog).eq("action", "relationship_change");
        assert_eq!(storage.count(&changes).unwrap(), 1);
    }

    #[test]
    fn test_drain_neutral_tone_leaves_ledger_alone() {
        let storage = seeded();
        // ORACLE is seeded at 0 toward ARCHITECT
        let post_id = add_post(&storage, AgentId::Architect);
        enqueue(&storage, AgentId::Oracle, AgentId::Architect, &post_id, t0());

        let generator = CannedGenerator::new();
        let mut ctx = JobContext::new(&storage, &generator, t0(), Some(1));
        drain(&mut ctx);

        let memory: AgentMemory = storage.get_required(Collection::AgentMemory, "ORACLE").unwrap();
        assert_eq!(ledger::relationship(&memory, AgentId::Architect).score, 0);
        assert_eq!(storage.count(&Query::new(Collection::ActivityLog)).unwrap(), 0);
    }

    #[test]
    fn test_drain_limits_and_skips_future_items() {
        let storage = seeded();
        let post_id = add_post(&storage, AgentId::Herald);
        for i in 0..7 {
            enqueue(&storage, AgentId::Oracle, AgentId::Herald, &post_id, t0() - Duration::minutes(i));
        }
        let future = enqueue(&storage, AgentId::Oracle, AgentId::Herald, &post_id, t0() + Duration::minutes(1));

        let generator = CannedGenerator::new();
        let mut ctx = JobContext::new(&storage, &generator, t0(), Some(1));
        let report = drain(&mut ctx);
        assert_eq!(report.outcomes.len(), DRAIN_LIMIT);

        let waiting: PendingReaction = storage.get_required(Collection::PendingReactions, &future).unwrap();
        assert!(!waiting.processed);
        assert_eq!(due_reactions(&storage, t0(), 10).unwrap().len(), 2);
    }

    #[test]
    fn test_drain_failure_marks_processed_with_error() {
        let storage = seeded();
        let post_id = add_post(&storage, AgentId::Herald);
        let failing = enqueue(&storage, AgentId::Oracle, AgentId::Herald, &post_id, t0() - Duration::minutes(5));
        let ok = enqueue(&storage, AgentId::Watcher, AgentId::Herald, &post_id, t0());

        let generator = CannedGenerator::new();
        generator.push_error(GeneratorError::RequestFailed("503".to_string()));
        generator.push(json!({"comment": "Logged."}));
        let mut ctx = JobContext::new(&storage, &generator, t0(), Some(1));
        let report = drain(&mut ctx);

        assert_eq!(report.outcome(&failing).unwrap().status, UnitStatus::Failed);
        assert_eq!(report.outcome(&ok).unwrap().status, UnitStatus::Done);

        let failed: PendingReaction = storage.get_required(Collection::PendingReactions, &failing).unwrap();
        assert!(failed.processed);
        assert!(failed.error.unwrap().contains("503"));
    }

    #[test]
    fn test_drain_skips_suspended_reactor() {
        let storage = seeded();
        set_status(&storage, AgentId::Oracle, AgentStatus::Suspended);
        let post_id = add_post(&storage, AgentId::Herald);
        let id = enqueue(&storage, AgentId::Oracle, AgentId::Herald, &post_id, t0());

        let generator = CannedGenerator::new();
        let mut ctx = JobContext::new(&storage, &generator, t0(), Some(1));
        let report = drain(&mut ctx);

        assert_eq!(report.outcome(&id).unwrap().status, UnitStatus::Skipped);
        assert_eq!(generator.calls(), 0);
        let reaction: PendingReaction = storage.get_required(Collection::PendingReactions, &id).unwrap();
        assert!(reaction.processed);
        assert_eq!(storage.count(&Query::new(Collection::Comments)).unwrap(), 0);
    }
}
