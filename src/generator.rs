//! Random but plausible sporting events, for seeding demo servers and tests

use chrono::{Duration, NaiveTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::event::EventDraft;

const SPORTS_GROUPS: &[&str] = &[
    "Football", "Basketball", "Tennis", "Cycling", "Olympics",
    "Cricket", "Marathon", "Golf", "Athletics", "Formula 1",
    "Motorsport", "Rugby", "Baseball", "Triathlon", "Extreme Sports",
    "Surfing", "American Football", "Swimming", "Boxing", "Volleyball",
];

const FORMATS: &[&str] = &[
    "Championship", "Cup", "Tournament", "Final", "Series", "Grand Prix", "Classic",
];

const SUPERLATIVES: &[&str] = &[
    "premier", "most prestigious", "annual", "biannual", "world-class",
];

const FLAVOURS: &[&str] = &[
    "featuring top competitors from around the world",
    "with intense competition",
    "held at a world-famous venue",
    "that determines the world champion",
];

/// One random event draft: a future date within two years, daytime hours, start before end
pub fn random_draft() -> EventDraft {
    let mut rng = rand::thread_rng();

    let group = *SPORTS_GROUPS.choose(&mut rng).unwrap();
    let start_hour: u32 = rng.gen_range(6..=20);
    // Same-day events only, so the duration cannot run past midnight
    let duration: u32 = rng.gen_range(1..=6).min(23 - start_hour);
    let date = Utc::now().date_naive() + Duration::days(rng.gen_range(1..=730));

    EventDraft {
        title: format!(
            "{} {} {}",
            rng.gen_range(2023..=2025),
            group,
            FORMATS.choose(&mut rng).unwrap()
        ),
        group: group.to_string(),
        date,
        start_time: NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(start_hour + duration, 0, 0).unwrap(),
        description: format!(
            "The {} {} event {}.",
            SUPERLATIVES.choose(&mut rng).unwrap(),
            group.to_lowercase(),
            FLAVOURS.choose(&mut rng).unwrap()
        ),
    }
}

/// `count` random event drafts
pub fn random_drafts(count: usize) -> Vec<EventDraft> {
    (0..count).map(|_| random_draft()).collect()
}
