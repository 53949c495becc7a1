//! Behaviour-driven tests for the publication policy.
//!
//! These scenarios pin the metadata each asset class ends up with and the
//! objects each sync prunes.

use publish_policy::{
    AssetFilter, CacheControl, Extension, Precedence, RenderedAsset, RuleSpec, RuleTable,
    RuleTableError, mirror_diff, plan, standard_rules,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::collections::BTreeMap;

#[derive(Default)]
struct PolicyWorld {
    assets: Vec<RenderedAsset>,
    remote: Vec<String>,
    sync_count: usize,
    published: BTreeMap<String, (String, String)>,
    uploads_per_key: BTreeMap<String, usize>,
    deletions: BTreeMap<usize, Vec<String>>,
    candidate_rules: Vec<RuleSpec>,
    validation: Option<Result<RuleTable, RuleTableError>>,
}

#[fixture]
fn world() -> PolicyWorld {
    PolicyWorld::default()
}

fn split_keys(keys: &str) -> impl Iterator<Item = &str> {
    keys.split(',').map(str::trim).filter(|key| !key.is_empty())
}

fn ext(value: &str) -> Extension {
    Extension::new(value).expect("valid extension")
}

#[given("a rendered site containing \"{keys}\"")]
fn given_rendered_site(world: &mut PolicyWorld, keys: String) {
    world.assets = split_keys(&keys).map(RenderedAsset::new).collect();
}

#[given("the destination already holds \"{keys}\"")]
fn given_destination_holds(world: &mut PolicyWorld, keys: String) {
    world.remote = split_keys(&keys).map(str::to_owned).collect();
}

#[when("the standard publication plan is built")]
fn when_plan_built(world: &mut PolicyWorld) {
    let plan = plan(standard_rules(), &world.assets);
    world.sync_count = plan.len();
    world.published = plan
        .final_metadata()
        .into_iter()
        .map(|(key, meta)| {
            (
                key.to_owned(),
                (
                    meta.content_type.as_str().to_owned(),
                    meta.cache_control.header_value(),
                ),
            )
        })
        .collect();
    let mut uploads_per_key = BTreeMap::new();
    let mut deletions = BTreeMap::new();
    for job in plan.jobs() {
        for asset in &job.uploads {
            *uploads_per_key.entry(asset.key().to_owned()).or_insert(0) += 1;
        }
        deletions.insert(job.ordinal, mirror_diff(job, &world.remote).deletions);
    }
    world.uploads_per_key = uploads_per_key;
    world.deletions = deletions;
}

#[then("the plan issues {count} syncs")]
fn then_plan_issues(world: &mut PolicyWorld, count: usize) {
    assert_eq!(world.sync_count, count);
}

#[then("\"{key}\" is published as \"{content_type}\" with \"{cache}\"")]
fn then_published_as(world: &mut PolicyWorld, key: String, content_type: String, cache: String) {
    let applied = world.published.get(&key).expect("key was published");
    assert_eq!(applied, &(content_type, cache), "metadata for {key}");
}

#[then("\"{key}\" is uploaded by {count} sync")]
fn then_uploaded_by(world: &mut PolicyWorld, key: String, count: usize) {
    assert_eq!(world.uploads_per_key.get(&key).copied(), Some(count));
}

#[then("sync {ordinal} deletes \"{key}\"")]
fn then_sync_deletes(world: &mut PolicyWorld, ordinal: usize, key: String) {
    let deleted = world.deletions.get(&ordinal).expect("sync ran");
    assert_eq!(deleted, &vec![key]);
}

#[given("a rule table where \"{first}\" and \"{second}\" both include \"{shared}\"")]
fn given_overlapping_rules(world: &mut PolicyWorld, first: String, second: String, shared: String) {
    let cache = CacheControl::max_age_secs(60);
    world.candidate_rules = vec![
        RuleSpec::new(
            first,
            AssetFilter::extensions([ext("png"), ext(&shared)]),
            cache,
        ),
        RuleSpec::new(second, AssetFilter::extensions([ext(&shared)]), cache),
        RuleSpec::new(
            "rest",
            AssetFilter::all_except([ext("png"), ext(&shared)]),
            cache,
        ),
    ];
}

#[when("the table is validated as disjoint")]
fn when_validated_disjoint(world: &mut PolicyWorld) {
    world.validation = Some(RuleTable::new(
        world.candidate_rules.clone(),
        Precedence::Disjoint,
    ));
}

#[when("the table is validated as last-wins")]
fn when_validated_last_wins(world: &mut PolicyWorld) {
    world.validation = Some(RuleTable::new(
        world.candidate_rules.clone(),
        Precedence::LastWins,
    ));
}

#[then("validation fails naming \"{first}\" and \"{second}\"")]
fn then_validation_fails(world: &mut PolicyWorld, first: String, second: String) {
    let result = world.validation.as_ref().expect("validation ran");
    match result {
        Err(RuleTableError::Overlap { earlier, later, .. }) => {
            assert_eq!((earlier, later), (&first, &second));
        }
        other => panic!("expected overlap error, got {other:?}"),
    }
}

#[then("\"{key}\" is governed by rule {ordinal}")]
fn then_governed_by(world: &mut PolicyWorld, key: String, ordinal: usize) {
    let table = world
        .validation
        .as_ref()
        .expect("validation ran")
        .as_ref()
        .expect("table accepted");
    let (found, _) = table
        .effective_rule(&RenderedAsset::new(key))
        .expect("catch-all guarantees a match");
    assert_eq!(found, ordinal);
}

#[scenario(
    path = "tests/features/publication_policy.feature",
    name = "Each asset class receives its own metadata"
)]
fn scenario_standard_metadata(world: PolicyWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/publication_policy.feature",
    name = "Nested files match on their extension"
)]
fn scenario_nested_files(world: PolicyWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/publication_policy.feature",
    name = "Files without an extension fall to the catch-all"
)]
fn scenario_extensionless(world: PolicyWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/publication_policy.feature",
    name = "Stale objects are pruned by the rule that covers them"
)]
fn scenario_pruning(world: PolicyWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/publication_policy.feature",
    name = "A table whose rules overlap is rejected unless last-wins is declared"
)]
fn scenario_overlap_validation(world: PolicyWorld) {
    let _ = world;
}
