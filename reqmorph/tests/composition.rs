use std::collections::BTreeSet;

use reqmorph::{
    Body, Catalogue, CompositionEngine, CompositionLevel, EngineConfig, OutcomeStore, ProfileKind,
    Request, Schedule, Scheduler, TargetKey, Variant, builtin_profile,
};

const UPLOAD: &str = "--abc\r\nContent-Disposition: form-data; name=\"file\"; filename=\"shell.php\"\r\nContent-Type: application/x-php\r\n\r\n<?php echo 1; ?>\r\n--abc--\r\n";

fn upload() -> Request {
    Request::post("http://x/upload")
        .with_header("Content-Type", "multipart/form-data; boundary=abc")
        .with_body(Body::Text(UPLOAD.into()))
}

fn pairwise(base: &Request, names: &[&str]) -> Vec<Variant> {
    let catalogue = Catalogue::builtin();
    let schedule = Schedule::from_strategies(
        names
            .iter()
            .map(|name| catalogue.get(name).cloned().unwrap()),
    );
    let engine = CompositionEngine::new(EngineConfig {
        level: CompositionLevel::Pairwise,
        limit: None,
        seed: Some(9),
    });
    let mut rng = engine.rng();
    engine.variants(base, &schedule, &mut rng).collect()
}

#[test]
fn composition_is_order_sensitive() {
    let base = upload();
    let charset_first = pairwise(&base, &["charset_change", "multipart_boundary"]);
    let boundary_first = pairwise(&base, &["multipart_boundary", "charset_change"]);

    // Once the charset change has replaced the multipart media type there is no boundary
    // left to split.
    assert!(charset_first.is_empty());
    assert_eq!(boundary_first.len(), 2);
    for variant in &boundary_first {
        assert_eq!(
            variant.request.content_type(),
            Some("application/x-www-form-urlencoded;charset=ibm037")
        );
        assert_ne!(variant.request.body(), base.body());
    }
}

#[test]
fn seeded_runs_are_reproducible() {
    let base = Request::get("http://x/get?cmd=cat%20/etc/passwd&id=1")
        .with_header("User-Agent", "curl/8.0");
    let profile = builtin_profile(ProfileKind::General).unwrap();
    let schedule = Scheduler::default().schedule_for(&profile, &Default::default(), &base);
    let engine = CompositionEngine::new(EngineConfig {
        level: CompositionLevel::Both,
        limit: Some(500),
        seed: Some(1234),
    });

    let collect = || {
        let mut rng = engine.rng();
        engine.variants(&base, &schedule, &mut rng).collect::<Vec<_>>()
    };
    let first = collect();
    assert_eq!(first.len(), 500);
    assert_eq!(first, collect());
}

#[test]
fn every_chain_comes_from_the_schedule() {
    let base = upload();
    let profile = builtin_profile(ProfileKind::General).unwrap();
    let schedule = Scheduler::default().schedule_for(&profile, &Default::default(), &base);
    let position = |name: &str| schedule.names().iter().position(|n| *n == name).unwrap();

    let engine = CompositionEngine::new(EngineConfig {
        limit: Some(3_000),
        seed: Some(5),
        ..EngineConfig::default()
    });
    let mut rng = engine.rng();
    for variant in engine.variants(&base, &schedule, &mut rng) {
        match variant.chain.as_slice() {
            [single] => {
                position(single);
            }
            [first, second] => assert!(position(first) < position(second)),
            chain => panic!("unexpected chain {chain:?}"),
        }
    }
}

#[test]
fn reported_chains_feed_the_next_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutcomeStore::new(dir.path().join("memory").join("outcomes.jsonl"));
    let base = Request::get("http://x/get?cmd=id");
    let target = TargetKey::from_request(&base).unwrap();

    let profile = builtin_profile(ProfileKind::Reinforcement).unwrap();
    let before = Scheduler::default().schedule_for(&profile, &store.load(), &base);
    let last = before.names().last().map(|name| name.to_string()).unwrap();

    let engine = CompositionEngine::new(EngineConfig {
        level: CompositionLevel::Pairwise,
        limit: None,
        seed: Some(2),
    });
    let mut rng = engine.rng();
    let winner = engine
        .variants(&base, &before, &mut rng)
        .find(|variant| variant.chain.last() == Some(&last))
        .unwrap();
    store.record_success(&target, &winner.chain).unwrap();

    // A variant of the same endpoint with mutation noise in the path shares the target.
    let noisy = Request::get("http://X/get/?cmd=other");
    let after = Scheduler::default().schedule_for(&profile, &store.load(), &noisy);
    let reported: BTreeSet<&str> = winner.chain.iter().map(String::as_str).collect();
    let leaders: BTreeSet<&str> = after.names().into_iter().take(reported.len()).collect();
    assert_eq!(leaders, reported);
    assert_eq!(after.len(), before.len());
}
