use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use readalong::utils::{bounded_levenshtein, DistanceEngine};
use readalong::{AsrState, Difficulty, RecognizedToken, WordState};

mod common;
use common::{ObserverCall, TestSession};

const TEXT: &str = "Once upon a time there was a little fox. The fox lived in a quiet wood \
                    near the river, and every morning it ran down to the water to drink.";

#[test]
fn test_asr_flood_fuzz() {
    let t = TestSession::new(TEXT, Difficulty::Medium);
    let listener = t.session.listener();
    listener.on_state_changed(AsrState::Listening);

    // Simulate a flood of random garbage text
    let garbage = [
        "asdfghjkl",
        "!!! @@@ ###",
        "1234567890",
        "extremely long string that doesn't mean anything to the reader at all but keeps going and going",
        "",
        " ",
        "ñandú über straße",
    ];

    let start = Instant::now();
    for (i, text) in garbage.iter().cycle().take(200).enumerate() {
        t.clock.set_ms(i as u64 * 37);
        if i % 5 == 4 {
            listener.on_final_result(text);
        } else {
            listener.on_partial_result(text);
        }
        t.session.tick();
    }
    println!("Processed 200 garbage updates in {:?}", start.elapsed());

    // Stability check: the session still aligns a clean reading
    t.session.reset();
    listener.on_final_result("once upon a time");
    let states = t.session.snapshot().states();
    assert_eq!(&states[..4], &[WordState::Correct; 4]);
}

#[test]
fn test_debt_flood_fuzz() {
    let t = TestSession::new(TEXT, Difficulty::High);
    let listener = t.session.listener();
    let mut rng = StdRng::seed_from_u64(7);
    let vocabulary = ["fox", "wood", "giraffe", "xyzzy", "um", "river", "the", "a"];

    for _ in 0..300 {
        let word = vocabulary.choose(&mut rng).copied().unwrap_or("a");
        let confidence: f32 = rng.gen_range(0.0..=1.0);
        listener.on_recognized_tokens(&[RecognizedToken::with_confidence(word, confidence)]);
    }

    // At most one debt marker is visible at any time
    let mut open = 0i32;
    for call in t.observer.calls() {
        match call {
            ObserverCall::ShowDebt(_) => open += 1,
            ObserverCall::HideDebt(_) => open -= 1,
            _ => {}
        }
        assert!((0..=1).contains(&open), "more than one open debt");
    }
}

#[test]
fn test_random_updates_keep_cursor_monotonic() {
    let words: Vec<&str> = TEXT.split_whitespace().collect();
    let mut rng = StdRng::seed_from_u64(42);

    for difficulty in [Difficulty::Low, Difficulty::Medium] {
        let t = TestSession::new(TEXT, difficulty);
        let listener = t.session.listener();
        listener.on_state_changed(AsrState::Listening);

        let mut now = 0u64;
        let mut spoken: Vec<String> = Vec::new();
        let mut last_cursor = 0usize;
        let mut last_lock: Option<usize> = None;

        for _ in 0..150 {
            // Mostly read forward, sometimes stumble, skip or get revised
            match rng.gen_range(0..10) {
                0 => {
                    spoken.pop();
                }
                1 => spoken.push("blorp".to_string()),
                2 => {
                    let skip = rng.gen_range(0..words.len());
                    spoken.push(words[skip].to_lowercase());
                }
                _ => {
                    let next = (last_cursor + spoken.len() % 3).min(words.len() - 1);
                    spoken.push(words[next].to_lowercase());
                }
            }

            now += rng.gen_range(20..300);
            t.clock.set_ms(now);
            let transcript = spoken.join(" ");
            if rng.gen_bool(0.15) {
                listener.on_final_result(&transcript);
                spoken.clear();
            } else {
                listener.on_partial_result(&transcript);
            }
            t.session.tick();

            let snapshot = t.session.snapshot();
            assert!(snapshot.cursor >= last_cursor, "cursor moved backward");
            assert!(snapshot.locked_index >= last_lock, "lock moved backward");
            last_cursor = snapshot.cursor;
            last_lock = snapshot.locked_index;
        }

        let moves = t.observer.cursor_moves();
        assert!(moves.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn test_correct_words_stay_correct() {
    let t = TestSession::new(TEXT, Difficulty::Medium);
    let listener = t.session.listener();
    listener.on_final_result("once upon a time there was");
    let before = t.session.snapshot().states();

    for noise in ["once", "upon upon", "xyz", "time was there", "a"] {
        listener.on_final_result(noise);
    }
    let after = t.session.snapshot().states();
    for (i, state) in before.iter().enumerate() {
        if *state == WordState::Correct {
            assert_eq!(after[i], WordState::Correct, "word {} regressed", i);
        }
    }
}

#[test]
fn test_bounded_distance_random_pairs() {
    let mut rng = StdRng::seed_from_u64(1234);
    let alphabet: Vec<char> = "abcde".chars().collect();
    let engine = DistanceEngine::with_capacity(64);
    let word = |rng: &mut StdRng| -> String {
        let len = rng.gen_range(0..8);
        (0..len)
            .map(|_| *alphabet.choose(rng).unwrap_or(&'a'))
            .collect()
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    for _ in 0..2_000 {
        let a = word(&mut rng);
        let b = word(&mut rng);
        let threshold = rng.gen_range(0..6);
        let truth = strsim::levenshtein(&a, &b);
        let expected = if truth <= threshold { truth } else { threshold + 1 };

        assert_eq!(bounded_levenshtein(&a, &b, threshold), expected, "{} / {}", a, b);
        assert_eq!(engine.distance(&a, &b, threshold), expected, "cached {} / {}", a, b);
        assert!(engine.len() <= 64);
    }
    assert!(Instant::now() < deadline);
}
