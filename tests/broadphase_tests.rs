mod common;

use approx::assert_relative_eq;
use common::{collide_all, random_point, random_scene, self_distance, separated_scene, Scene};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spatial_proximity::collision::{
    BroadPhaseManager, DenseHashTable, DynamicTreeArrayManager, DynamicTreeManager,
    IntervalTreeManager, NaiveManager, SapManager, SparseHashTable, SpatialHashManager,
};
use spatial_proximity::config::DISTANCE_DELTA;
use spatial_proximity::{
    create_manager, Aabb, BroadPhaseConfig, BroadPhaseKind, CollisionObject, CollisionPairs,
    DistanceCallback, EntityId, ManagerState, MinDistance, Vec3,
};

fn build(kind: BroadPhaseKind, config: &BroadPhaseConfig, scene: &Scene) -> Box<dyn BroadPhaseManager> {
    build_from(kind, config, &scene.refs())
}

fn build_from(
    kind: BroadPhaseKind,
    config: &BroadPhaseConfig,
    objects: &[&CollisionObject],
) -> Box<dyn BroadPhaseManager> {
    let mut manager = create_manager(kind, config);
    manager.register_objects(objects);
    manager.setup();
    manager
}

/// Managers of every strategy, with the spatial hash sized from the scene.
fn all_managers(scene: &Scene) -> Vec<Box<dyn BroadPhaseManager>> {
    all_managers_for(&scene.refs())
}

fn all_managers_for(objects: &[&CollisionObject]) -> Vec<Box<dyn BroadPhaseManager>> {
    let bound = SpatialHashManager::compute_bound(objects);
    let extent = bound.size();
    let cell_size = (extent.x.min(extent.y).min(extent.z) / 5.0).max(0.1);
    let config = BroadPhaseConfig::default()
        .with_cell_size(cell_size)
        .with_scene_limit(bound);
    BroadPhaseKind::ALL
        .iter()
        .map(|&kind| build_from(kind, &config, objects))
        .collect()
}

#[test]
fn test_self_distance_agrees_across_managers() {
    let scene = separated_scene(200.0, 512, 7);
    assert_eq!(scene.objects.len(), 512);
    let expected = scene.brute_force_min_distance();
    assert!(expected > 0.0);

    for manager in all_managers(&scene) {
        let found = self_distance(manager.as_ref(), &scene);
        assert!(
            (found - expected).abs() < DISTANCE_DELTA || (found - expected).abs() / expected < DISTANCE_DELTA,
            "{}: {found} vs {expected}",
            manager.name()
        );
    }
}

#[test]
fn test_equal_boxes_naive_tree_and_hash_agree() {
    let scene = common::uniform_box_scene(200.0, 512, 512);
    let objects = scene.refs();
    let bound = SpatialHashManager::compute_bound(&objects);
    let extent = bound.size();
    let cell_size = extent.x.min(extent.y).min(extent.z) / 5.0;

    let mut naive = NaiveManager::new();
    let mut tree = DynamicTreeManager::from_config(&BroadPhaseConfig::default());
    let mut hash = SpatialHashManager::<SparseHashTable>::new(cell_size, Some(bound));
    let managers: [&mut dyn BroadPhaseManager; 3] = [&mut naive, &mut tree, &mut hash];
    let mut results = Vec::new();
    for manager in managers {
        manager.register_objects(&objects);
        manager.setup();
        results.push(self_distance(manager, &scene));
    }

    assert!(results[0] > 0.0);
    for found in &results[1..] {
        assert!((found - results[0]).abs() < DISTANCE_DELTA);
    }
}

#[test]
fn test_self_distance_with_shallow_tree_build() {
    let scene = separated_scene(200.0, 512, 11);
    let expected = scene.brute_force_min_distance();

    for level in [0, 2] {
        let mut arena = DynamicTreeManager::new(level, 0.05);
        let mut pool = DynamicTreeArrayManager::new(level, 0.05);
        arena.register_objects(&scene.refs());
        pool.register_objects(&scene.refs());
        arena.setup();
        pool.setup();
        arena.validate();
        pool.validate();
        assert_relative_eq!(self_distance(&arena, &scene), expected, epsilon = DISTANCE_DELTA);
        assert_relative_eq!(self_distance(&pool, &scene), expected, epsilon = DISTANCE_DELTA);
    }
}

#[test]
fn test_distance_pruning_skips_far_pairs() {
    let scene = separated_scene(100.0, 216, 3);
    let naive = build(BroadPhaseKind::Naive, &BroadPhaseConfig::default(), &scene);
    let tree = build(BroadPhaseKind::DynamicTree, &BroadPhaseConfig::default(), &scene);

    let mut exhaustive = MinDistance::new(|a, b| scene.distance(a, b));
    naive.distance(&mut exhaustive);
    let mut pruned = MinDistance::new(|a, b| scene.distance(a, b));
    tree.distance(&mut pruned);

    assert_relative_eq!(exhaustive.min_distance(), pruned.min_distance(), epsilon = 1e-4);
    assert!(pruned.evaluations < exhaustive.evaluations);
    assert!(pruned.closest_pair().is_some());
}

#[test]
fn test_distance_object_queries_agree() {
    let mut scene = separated_scene(100.0, 125, 21);
    let registered: Vec<_> = scene.objects.ids().collect();
    let managers = all_managers(&scene);

    // Queries live in the same arena so their ids never alias a registered
    // object, but they are not registered with any manager.
    let mut rng = StdRng::seed_from_u64(99);
    let queries: Vec<_> = (0..20)
        .map(|_| scene.add(common::random_shape(&mut rng, 6.0), random_point(&mut rng, 150.0)))
        .collect();

    for query in queries {
        let expected = registered
            .iter()
            .map(|&id| scene.distance(query, id))
            .fold(f32::INFINITY, f32::min);

        for manager in &managers {
            let mut callback = MinDistance::new(|a, b| {
                assert_eq!(a, query, "query id is passed first");
                scene.distance(a, b)
            });
            manager.distance_object(scene.get(query), &mut callback);
            assert_relative_eq!(callback.min_distance(), expected, epsilon = DISTANCE_DELTA);
        }
    }
}

#[test]
fn test_overlap_pairs_agree_across_managers() {
    let scene = random_scene(50.0, 400, 8.0, 5);
    let expected = scene.brute_force_pairs();
    assert!(!expected.is_empty());

    for manager in all_managers(&scene) {
        assert_eq!(collide_all(manager.as_ref()), expected, "{}", manager.name());
    }
    for kind in BroadPhaseKind::ALL {
        let manager = build(kind, &BroadPhaseConfig::default(), &scene);
        assert_eq!(collide_all(manager.as_ref()), expected, "{kind:?}");
    }
}

#[test]
fn test_collide_reports_each_pair_once() {
    let scene = random_scene(20.0, 200, 6.0, 8);
    for manager in all_managers(&scene) {
        let mut raw = CollisionPairs::new(|_, _| true);
        manager.collide(&mut raw);
        let normalised = raw.sorted_pairs();
        assert_eq!(raw.pairs.len(), normalised.len(), "{} duplicated a pair", manager.name());
        assert!(raw.pairs.iter().all(|(a, b)| a != b));
    }
}

#[test]
fn test_narrow_phase_filters_candidates() {
    let scene = random_scene(30.0, 300, 6.0, 13);
    let expected: Vec<_> = scene
        .brute_force_pairs()
        .into_iter()
        .filter(|&(a, b)| scene.overlaps(a, b))
        .collect();

    for manager in all_managers(&scene) {
        let mut pairs = CollisionPairs::new(|a, b| scene.overlaps(a, b));
        manager.collide(&mut pairs);
        assert_eq!(pairs.sorted_pairs(), expected, "{}", manager.name());
    }
}

#[test]
fn test_collide_object_matches_brute_force() {
    let mut scene = random_scene(40.0, 300, 6.0, 17);
    let registered: Vec<_> = scene.objects.ids().collect();
    let managers = all_managers(&scene);

    let mut rng = StdRng::seed_from_u64(4);
    let queries: Vec<_> = (0..25)
        .map(|_| scene.add(common::random_shape(&mut rng, 10.0), random_point(&mut rng, 45.0)))
        .collect();

    for query in queries {
        let query = scene.get(query);
        let mut expected: Vec<_> = registered
            .iter()
            .copied()
            .filter(|&id| scene.get(id).aabb().overlaps(query.aabb()))
            .collect();
        expected.sort();

        for manager in &managers {
            let mut found = Vec::new();
            manager.collide_object(query, &mut |a: EntityId, b: EntityId| {
                assert_eq!(a, query.id);
                found.push(b);
                false
            });
            found.sort();
            assert_eq!(found, expected, "{}", manager.name());
        }
    }
}

#[test]
fn test_collide_object_skips_its_own_registration() {
    let scene = random_scene(10.0, 60, 4.0, 19);
    for manager in all_managers(&scene) {
        for object in scene.objects.iter() {
            manager.collide_object(object, &mut |a: EntityId, b: EntityId| {
                assert_ne!(a, b, "{} reported a self pair", manager.name());
                false
            });
        }
    }
}

#[test]
fn test_any_collision_stops_after_first_pair() {
    let scene = random_scene(20.0, 200, 6.0, 23);
    assert!(scene.brute_force_pairs().len() > 1);

    for manager in all_managers(&scene) {
        let mut calls = 0;
        let mut pairs = CollisionPairs::new(|_, _| {
            calls += 1;
            true
        })
        .with_max_pairs(1);
        manager.collide(&mut pairs);
        assert_eq!(pairs.pairs.len(), 1, "{}", manager.name());
        drop(pairs);
        assert_eq!(calls, 1, "{} kept going after the stop", manager.name());
    }
}

#[test]
fn test_updates_match_fresh_index() {
    let mut scene = random_scene(30.0, 250, 5.0, 31);
    let config = BroadPhaseConfig::default()
        .with_cell_size(4.0)
        .with_scene_limit(SpatialHashManager::compute_bound(&scene.refs()));
    let mut managers: Vec<_> = BroadPhaseKind::ALL
        .iter()
        .map(|&kind| build(kind, &config, &scene))
        .collect();

    let mut rng = StdRng::seed_from_u64(77);
    for _ in 0..5 {
        let ids: Vec<_> = scene.objects.ids().collect();
        for id in ids {
            if rng.gen_bool(0.4) {
                let offset = random_point(&mut rng, 3.0);
                if let Some(object) = scene.objects.get_mut(id) {
                    object.translate(offset);
                }
            }
        }
        for manager in &mut managers {
            manager.update_objects(&scene.refs());
        }

        let expected = scene.brute_force_pairs();
        let nearest = scene.brute_force_min_distance();
        for manager in &managers {
            assert_eq!(manager.state(), ManagerState::Ready);
            assert_eq!(collide_all(manager.as_ref()), expected, "{}", manager.name());
            assert_relative_eq!(self_distance(manager.as_ref(), &scene), nearest, epsilon = DISTANCE_DELTA);
        }
    }
}

#[test]
fn test_updates_keep_distance_queries_exact() {
    let mut scene = separated_scene(60.0, 125, 13);
    let config = BroadPhaseConfig::default()
        .with_cell_size(6.0)
        .with_scene_limit(SpatialHashManager::compute_bound(&scene.refs()));
    let mut managers: Vec<_> = BroadPhaseKind::ALL
        .iter()
        .map(|&kind| build(kind, &config, &scene))
        .collect();
    let ids: Vec<_> = scene.objects.ids().collect();

    let mut rng = StdRng::seed_from_u64(5);
    for round in 0..6 {
        for &id in &ids {
            if rng.gen_bool(0.5) {
                let offset = random_point(&mut rng, 4.0);
                if let Some(object) = scene.objects.get_mut(id) {
                    object.translate(offset);
                }
            }
        }
        for manager in &mut managers {
            manager.update_objects(&scene.refs());
        }

        let nearest = scene.brute_force_min_distance();
        let query = ids[round * 17 % ids.len()];
        let nearest_to_query = ids
            .iter()
            .filter(|&&id| id != query)
            .map(|&id| scene.distance(query, id))
            .fold(f32::INFINITY, f32::min);

        for manager in &managers {
            assert_relative_eq!(self_distance(manager.as_ref(), &scene), nearest, epsilon = DISTANCE_DELTA);

            let mut callback = MinDistance::new(|a, b| scene.distance(a, b));
            manager.distance_object(scene.get(query), &mut callback);
            assert_relative_eq!(callback.min_distance(), nearest_to_query, epsilon = DISTANCE_DELTA);
        }
    }
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "setup() must be called")]
fn test_sap_query_before_setup_panics() {
    let scene = random_scene(10.0, 20, 3.0, 8);
    let mut manager = create_manager(BroadPhaseKind::SweepAndPrune, &BroadPhaseConfig::default());
    manager.register_objects(&scene.refs());
    collide_all(manager.as_ref());
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "setup() must be called")]
fn test_dynamic_tree_query_after_unregister_panics() {
    let scene = random_scene(10.0, 20, 3.0, 8);
    let mut manager = build(BroadPhaseKind::DynamicTree, &BroadPhaseConfig::default(), &scene);
    if let Some(id) = scene.objects.ids().next() {
        manager.unregister_object(id);
    }
    self_distance(manager.as_ref(), &scene);
}

#[test]
#[should_panic(expected = "not registered")]
fn test_sap_unregister_unknown_object_panics() {
    let mut scene = random_scene(10.0, 20, 3.0, 9);
    let mut manager = build(BroadPhaseKind::SweepAndPrune, &BroadPhaseConfig::default(), &scene);
    let stranger = scene.add(spatial_proximity::Shape::sphere(1.0), Vec3::ZERO);
    manager.unregister_object(stranger);
}

#[test]
#[should_panic(expected = "not registered")]
fn test_dynamic_tree_unregister_twice_panics() {
    let scene = random_scene(10.0, 20, 3.0, 9);
    let mut manager = build(BroadPhaseKind::DynamicTreeArray, &BroadPhaseConfig::default(), &scene);
    let id = scene.objects.ids().next().expect("scene is not empty");
    manager.unregister_object(id);
    manager.setup();
    manager.unregister_object(id);
}

#[test]
fn test_unregister_then_setup() {
    let mut scene = random_scene(20.0, 120, 6.0, 41);
    let mut managers = all_managers(&scene);

    let removed: Vec<_> = scene.objects.ids().step_by(3).collect();
    for manager in &mut managers {
        for &id in &removed {
            manager.unregister_object(id);
        }
        assert_eq!(manager.state(), ManagerState::Populated);
        manager.setup();
    }
    for id in removed {
        scene.objects.remove(id);
    }

    let expected = scene.brute_force_pairs();
    for manager in &managers {
        assert_eq!(manager.len(), scene.objects.len());
        assert_eq!(collide_all(manager.as_ref()), expected, "{}", manager.name());
    }
}

#[test]
fn test_late_registration_joins_existing_index() {
    let mut scene = random_scene(20.0, 80, 6.0, 43);
    let mut managers = all_managers(&scene);

    let mut rng = StdRng::seed_from_u64(44);
    let mut added = Vec::new();
    for _ in 0..40 {
        added.push(scene.add(common::random_shape(&mut rng, 6.0), random_point(&mut rng, 20.0)));
    }
    for manager in &mut managers {
        for &id in &added {
            manager.register_object(scene.get(id));
        }
        manager.setup();
    }

    let expected = scene.brute_force_pairs();
    for manager in &managers {
        assert_eq!(collide_all(manager.as_ref()), expected, "{}", manager.name());
    }
}

#[test]
fn test_collide_manager_and_distance_manager() {
    let scene = random_scene(20.0, 160, 5.0, 51);
    let objects = scene.refs();
    let (left, right) = objects.split_at(100);

    let mut expected = Vec::new();
    let mut expected_distance = f32::INFINITY;
    for b in right {
        for a in left {
            if a.aabb().overlaps(b.aabb()) {
                expected.push((b.id, a.id));
            }
            expected_distance = expected_distance.min(a.aabb().distance(b.aabb()));
        }
    }
    expected.sort();
    assert!(!expected.is_empty());

    let other = build_from(BroadPhaseKind::Naive, &BroadPhaseConfig::default(), right);
    for manager in all_managers_for(left) {
        let mut found = Vec::new();
        manager.collide_manager(other.as_ref(), &mut |a: EntityId, b: EntityId| {
            found.push((a, b));
            false
        });
        found.sort();
        assert_eq!(found, expected, "{}", manager.name());

        let mut callback = MinDistance::new(|a, b| scene.get(a).aabb().distance(scene.get(b).aabb()));
        manager.distance_manager(other.as_ref(), &mut callback);
        assert_relative_eq!(callback.min_distance(), expected_distance, epsilon = 1e-4);
    }
}

#[test]
fn test_clear_empties_manager() {
    let scene = random_scene(10.0, 50, 4.0, 61);
    for mut manager in all_managers(&scene) {
        manager.clear();
        assert!(manager.is_empty());
        assert_eq!(manager.state(), ManagerState::Empty);
        assert!(collide_all(manager.as_ref()).is_empty());

        manager.register_objects(&scene.refs());
        manager.setup();
        assert_eq!(collide_all(manager.as_ref()), scene.brute_force_pairs());
    }
}

#[test]
fn test_empty_managers_answer_nothing() {
    let scene = Scene::new();
    for kind in BroadPhaseKind::ALL {
        let mut manager = create_manager(kind, &BroadPhaseConfig::default());
        manager.setup();
        assert_eq!(manager.state(), ManagerState::Empty);
        assert!(collide_all(manager.as_ref()).is_empty());
        assert!(self_distance(manager.as_ref(), &scene).is_infinite());
    }
}

#[test]
fn test_spatial_hash_backends_agree_with_outliers() {
    let scene = random_scene(30.0, 200, 6.0, 71);
    let limit = Aabb::new(Vec3::splat(-15.0), Vec3::splat(15.0));
    let mut sparse = SpatialHashManager::<SparseHashTable>::new(3.0, Some(limit));
    let mut dense = SpatialHashManager::<DenseHashTable>::new(3.0, Some(limit));
    sparse.register_objects(&scene.refs());
    dense.register_objects(&scene.refs());
    sparse.setup();
    dense.setup();

    assert!(sparse.outlier_count() > 0);
    assert_eq!(sparse.outlier_count(), dense.outlier_count());
    let expected = scene.brute_force_pairs();
    assert_eq!(collide_all(&sparse), expected);
    assert_eq!(collide_all(&dense), expected);
}

#[test]
fn test_concrete_managers_report_names() {
    let names = [
        NaiveManager::new().name(),
        SapManager::new().name(),
        IntervalTreeManager::new().name(),
        DynamicTreeManager::new(2, 0.0).name(),
        DynamicTreeArrayManager::new(2, 0.0).name(),
    ];
    let mut unique = names.to_vec();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), names.len());
}
