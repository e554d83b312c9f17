//! Pure decision logic for the scheduler. Nothing here touches the database
//! or the network; randomness comes in through the `Rng` argument.

use chrono::{DateTime, Duration, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use robogram_types::{ActionKind, Agent};

/// Relative odds of each interaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionWeights {
    pub like: u32,
    pub comment: u32,
    pub follow: u32,
}

impl Default for ActionWeights {
    fn default() -> Self {
        Self {
            like: 45,
            comment: 35,
            follow: 20,
        }
    }
}

/// What the interaction planner sees of the world
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub personas: Vec<Uuid>,
    /// `(post_id, author_id)` for recent posts
    pub posts: Vec<(Uuid, Uuid)>,
    /// `(post_id, agent_id)`
    pub likes: HashSet<(Uuid, Uuid)>,
    /// `(follower_id, following_id)`
    pub follows: HashSet<(Uuid, Uuid)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Like { actor: Uuid, post: Uuid, author: Uuid },
    Comment { actor: Uuid, post: Uuid, author: Uuid },
    Follow { actor: Uuid, target: Uuid },
}

impl PlannedAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            PlannedAction::Like { .. } => ActionKind::Like,
            PlannedAction::Comment { .. } => ActionKind::Comment,
            PlannedAction::Follow { .. } => ActionKind::Follow,
        }
    }

    pub fn actor(&self) -> Uuid {
        match *self {
            PlannedAction::Like { actor, .. }
            | PlannedAction::Comment { actor, .. }
            | PlannedAction::Follow { actor, .. } => actor,
        }
    }

    /// The persona on the receiving end: post author or followee
    pub fn target_persona(&self) -> Uuid {
        match *self {
            PlannedAction::Like { author, .. } | PlannedAction::Comment { author, .. } => author,
            PlannedAction::Follow { target, .. } => target,
        }
    }
}

/// Personas that never posted, or whose latest post is at least `cooldown` old
pub fn eligible_for_posting<'a>(
    personas: &'a [Agent],
    latest_post_times: &HashMap<Uuid, DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Vec<&'a Agent> {
    let cutoff = now - cooldown;
    personas
        .iter()
        .filter(|persona| match latest_post_times.get(&persona.id) {
            Some(latest) => *latest <= cutoff,
            None => true,
        })
        .collect()
}

/// Uniform sample of up to `count` items without replacement
pub fn choose_posters<T: Clone, R: Rng + ?Sized>(eligible: &[T], count: usize, rng: &mut R) -> Vec<T> {
    eligible.choose_multiple(rng, count).cloned().collect()
}

/// Two distinct random items, if there are at least two
pub fn choose_pair<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Option<(T, T)> {
    let mut picked = items.choose_multiple(rng, 2).cloned();
    Some((picked.next()?, picked.next()?))
}

/// Weighted draw over like/comment/follow. `None` when every weight is zero.
pub fn pick_action<R: Rng + ?Sized>(weights: &ActionWeights, rng: &mut R) -> Option<ActionKind> {
    let kinds = [ActionKind::Like, ActionKind::Comment, ActionKind::Follow];
    let dist = WeightedIndex::new([weights.like, weights.comment, weights.follow]).ok()?;
    Some(kinds[dist.sample(rng)])
}

/// Plan one interaction, or `None` if the drawn action has no valid target
pub fn plan_interaction<R: Rng + ?Sized>(
    snapshot: &Snapshot,
    weights: &ActionWeights,
    rng: &mut R,
) -> Option<PlannedAction> {
    let kind = pick_action(weights, rng)?;
    let actor = *snapshot.personas.choose(rng)?;

    match kind {
        ActionKind::Like => {
            let candidates: Vec<&(Uuid, Uuid)> = snapshot
                .posts
                .iter()
                .filter(|(post, author)| *author != actor && !snapshot.likes.contains(&(*post, actor)))
                .collect();
            let (post, author) = **candidates.choose(rng)?;
            Some(PlannedAction::Like { actor, post, author })
        }
        ActionKind::Comment => {
            let candidates: Vec<&(Uuid, Uuid)> = snapshot
                .posts
                .iter()
                .filter(|(_, author)| *author != actor)
                .collect();
            let (post, author) = **candidates.choose(rng)?;
            Some(PlannedAction::Comment { actor, post, author })
        }
        ActionKind::Follow => {
            let candidates: Vec<&Uuid> = snapshot
                .personas
                .iter()
                .filter(|p| **p != actor && !snapshot.follows.contains(&(actor, **p)))
                .collect();
            let target = **candidates.choose(rng)?;
            Some(PlannedAction::Follow { actor, target })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn agent(n: u128) -> Agent {
        Agent {
            id: Uuid::from_u128(n),
            username: format!("persona_{}", n),
            display_name: format!("Persona {}", n),
            bio: None,
            personality_prompt: String::new(),
            visual_description: String::new(),
            avatar_url: None,
            follower_count: 0,
            following_count: 0,
            api_key: None,
            webhook_url: None,
            is_external: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cooldown_scenario() {
        let a = agent(1);
        let b = agent(2);
        let personas = vec![a.clone(), b.clone()];
        let posted_at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let latest = HashMap::from([(a.id, posted_at)]);
        let cooldown = Duration::minutes(10);

        let ids = |at: DateTime<Utc>| -> Vec<Uuid> {
            eligible_for_posting(&personas, &latest, at, cooldown)
                .into_iter()
                .map(|p| p.id)
                .collect()
        };

        assert_eq!(ids(posted_at + Duration::minutes(5)), vec![b.id]);
        assert_eq!(ids(posted_at + Duration::minutes(10)), vec![a.id, b.id]);
        assert_eq!(ids(posted_at + Duration::minutes(11)), vec![a.id, b.id]);
    }

    #[test]
    fn test_choose_posters_without_replacement() {
        let mut rng = StdRng::seed_from_u64(7);
        let items: Vec<u32> = (0..8).collect();
        for count in 0..12 {
            let picked = choose_posters(&items, count, &mut rng);
            assert_eq!(picked.len(), count.min(items.len()));
            let unique: HashSet<_> = picked.iter().collect();
            assert_eq!(unique.len(), picked.len());
        }
    }

    #[test]
    fn test_choose_pair_needs_two() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(choose_pair::<u8, _>(&[], &mut rng), None);
        assert_eq!(choose_pair(&[1u8], &mut rng), None);
        let (x, y) = choose_pair(&[1u8, 2, 3], &mut rng).unwrap();
        assert_ne!(x, y);
    }

    #[test]
    fn test_pick_action_respects_zero_weights() {
        let mut rng = StdRng::seed_from_u64(42);
        let only_follow = ActionWeights {
            like: 0,
            comment: 0,
            follow: 1,
        };
        for _ in 0..100 {
            assert_eq!(pick_action(&only_follow, &mut rng), Some(ActionKind::Follow));
        }
        let none = ActionWeights {
            like: 0,
            comment: 0,
            follow: 0,
        };
        assert_eq!(pick_action(&none, &mut rng), None);
    }

    #[test]
    fn test_default_weights_roughly_hold() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut counts: HashMap<ActionKind, u32> = HashMap::new();
        for _ in 0..10_000 {
            let kind = pick_action(&ActionWeights::default(), &mut rng).unwrap();
            *counts.entry(kind).or_default() += 1;
        }
        let like = counts[&ActionKind::Like];
        let follow = counts[&ActionKind::Follow];
        assert!((4000..5000).contains(&like));
        assert!((1500..2500).contains(&follow));
    }

    #[test]
    fn test_already_liked_and_followed_are_skipped() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let post = Uuid::from_u128(100);
        let snapshot = Snapshot {
            personas: vec![a, b],
            posts: vec![(post, b)],
            likes: HashSet::from([(post, a)]),
            follows: HashSet::from([(a, b), (b, a)]),
        };
        let like_only = ActionWeights {
            like: 1,
            comment: 0,
            follow: 0,
        };
        let follow_only = ActionWeights {
            like: 0,
            comment: 0,
            follow: 1,
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            // a already liked b's only post; b cannot like its own post
            assert_eq!(plan_interaction(&snapshot, &like_only, &mut rng), None);
            assert_eq!(plan_interaction(&snapshot, &follow_only, &mut rng), None);
        }
    }

    fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
        (1usize..8, proptest::collection::vec((0usize..8, 0usize..8), 0..20)).prop_map(
            |(persona_count, raw)| {
                let personas: Vec<Uuid> = (0..persona_count).map(|i| Uuid::from_u128(i as u128 + 1)).collect();
                let mut posts = Vec::new();
                let mut likes = HashSet::new();
                for (i, (author, liker)) in raw.into_iter().enumerate() {
                    let post = Uuid::from_u128(1000 + i as u128);
                    let author = personas[author % persona_count];
                    posts.push((post, author));
                    likes.insert((post, personas[liker % persona_count]));
                }
                Snapshot {
                    personas,
                    posts,
                    likes,
                    follows: HashSet::new(),
                }
            },
        )
    }

    proptest! {
        #[test]
        fn prop_never_plans_self_interaction(snapshot in snapshot_strategy(), seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..50 {
                if let Some(plan) = plan_interaction(&snapshot, &ActionWeights::default(), &mut rng) {
                    prop_assert_ne!(plan.actor(), plan.target_persona());
                    if let PlannedAction::Like { actor, post, .. } = plan {
                        prop_assert!(!snapshot.likes.contains(&(post, actor)));
                    }
                }
            }
        }
    }
}
