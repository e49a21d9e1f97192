//! End-to-end physics scenarios over the public API.

use std::cell::RefCell;
use std::rc::Rc;

use loam_engine::physics::body::{body_anchor_position, create_body};
use loam_engine::prelude::*;

fn spawn_physics_entity(
    registry: &mut Registry,
    transform: Transform,
    rigidbody: RigidBody,
    collider: Collider,
) -> Entity {
    let entity = registry.spawn();
    registry.insert(entity, transform).unwrap();
    registry.insert(entity, rigidbody).unwrap();
    registry.insert(entity, collider).unwrap();
    entity
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

/// Sixty accumulated updates of 1/60 s through the system must land on the
/// same pose as sixty direct world steps with the same timestep.
#[test]
fn fixed_timestep_updates_match_direct_world_stepping() {
    let transform = Transform::new(100.0, 100.0);
    let rigidbody = RigidBody::new_dynamic(1.0);
    let collider = Collider::new_box(32.0, 32.0);

    // Path A: the integration system with its accumulator.
    let mut registry = Registry::new();
    let entity = spawn_physics_entity(
        &mut registry,
        transform,
        rigidbody.clone(),
        collider.clone(),
    );
    let mut system = PhysicsSystem::new(PhysicsWorld::new(DEFAULT_GRAVITY).unwrap());
    system.init(&mut registry);
    for _ in 0..60 {
        system.update(&mut registry, FIXED_TIMESTEP);
    }
    assert_eq!(system.total_steps(), 60);
    let via_system = *registry.get::<Transform>(entity).unwrap();

    // Path B: the world stepped directly.
    let mut world = PhysicsWorld::new(DEFAULT_GRAVITY).unwrap();
    let handle = create_body(
        &mut world,
        Entity::new(0, 0),
        &transform,
        &rigidbody,
        &collider,
    );
    for _ in 0..60 {
        world.step(FIXED_TIMESTEP);
    }
    let via_world = body_anchor_position(&world, handle, Some(&collider)).unwrap();

    assert!(
        via_system.y > 100.0,
        "body must fall under +y gravity, got y={}",
        via_system.y
    );
    assert!(
        (via_system.y - via_world.y).abs() < 1e-3,
        "system path y={} vs direct path y={}",
        via_system.y,
        via_world.y
    );
    assert!((via_system.x - via_world.x).abs() < 1e-3);
}

/// Identical setups produce identical trajectories across runs.
#[test]
fn two_identical_runs_are_bitwise_identical() {
    fn run() -> Vec<(f32, f32)> {
        let mut registry = Registry::new();
        let entity = spawn_physics_entity(
            &mut registry,
            Transform::new(64.0, 0.0),
            RigidBody::new_dynamic(1.0),
            Collider::new_circle(16.0),
        );
        let mut system = PhysicsSystem::new(PhysicsWorld::new(DEFAULT_GRAVITY).unwrap());
        system.init(&mut registry);

        let mut trajectory = Vec::new();
        for _ in 0..100 {
            system.update(&mut registry, FIXED_TIMESTEP);
            let t = registry.get::<Transform>(entity).unwrap();
            trajectory.push((t.x, t.y));
        }
        trajectory
    }

    assert_eq!(run(), run());
}

// ---------------------------------------------------------------------------
// Collision filtering
// ---------------------------------------------------------------------------

fn run_filtered_drop(filter_a: CollisionFilter, filter_b: CollisionFilter) -> (usize, f32) {
    let mut world = PhysicsWorld::new(DEFAULT_GRAVITY).unwrap();
    let falling = Entity::new(0, 0);
    let platform = Entity::new(1, 0);

    create_body(
        &mut world,
        falling,
        &Transform::new(100.0, 100.0),
        &RigidBody::new_dynamic(1.0),
        &Collider::new_box(32.0, 32.0).with_filter(filter_a),
    );
    create_body(
        &mut world,
        platform,
        &Transform::new(0.0, 300.0),
        &RigidBody::new_static(),
        &Collider::new_box(640.0, 32.0).with_filter(filter_b),
    );

    let begins = Rc::new(RefCell::new(Vec::new()));
    let mut processor = EventProcessor::new();
    {
        let begins = Rc::clone(&begins);
        processor
            .signals_mut()
            .on_collision_begin
            .connect(move |e: &CollisionBeginEvent| {
                begins.borrow_mut().push((e.entity_a, e.entity_b))
            });
    }

    let falling_collider = Collider::new_box(32.0, 32.0);
    let mut final_y = 0.0;
    for _ in 0..120 {
        world.step(FIXED_TIMESTEP);
        processor.process(&mut world);
        if let Some(body) = world.bodies().iter().find(|(_, b)| b.is_dynamic()) {
            let pose = body_anchor_position(&world, body.0, Some(&falling_collider)).unwrap();
            final_y = pose.y;
        }
    }
    let count = begins.borrow().len();
    (count, final_y)
}

/// Non-overlapping category/mask bitmasks suppress both the contact events
/// and the physical response, even though the bounds overlap.
#[test]
fn mismatched_filter_masks_never_collide() {
    let a = CollisionFilter {
        category: 0x0001,
        mask: 0x0002,
        group: 0,
    };
    let b = CollisionFilter {
        category: 0x0004,
        mask: 0xFFFF,
        group: 0,
    };
    let (begins, final_y) = run_filtered_drop(a, b);
    assert_eq!(begins, 0, "filtered pair must produce no begin events");
    assert!(
        final_y > 300.0,
        "filtered box must fall through the platform, final y={}",
        final_y
    );
}

/// The same geometry with matching masks produces a contact.
#[test]
fn matching_filter_masks_do_collide() {
    let a = CollisionFilter {
        category: 0x0001,
        mask: 0x0002,
        group: 0,
    };
    let b = CollisionFilter {
        category: 0x0002,
        mask: 0xFFFF,
        group: 0,
    };
    let (begins, final_y) = run_filtered_drop(a, b);
    assert!(begins > 0, "matching pair must produce a begin event");
    assert!(
        final_y <= 300.0 + 1.0,
        "box must rest on the platform, final y={}",
        final_y
    );
}

/// A shared positive group index forces contact past a mask veto.
#[test]
fn positive_group_overrides_mask_veto() {
    let a = CollisionFilter {
        category: 0x0001,
        mask: 0x0002,
        group: 5,
    };
    let b = CollisionFilter {
        category: 0x0004,
        mask: 0x0008,
        group: 5,
    };
    let (begins, _) = run_filtered_drop(a, b);
    assert!(begins > 0, "shared positive group must force the contact");
}

// ---------------------------------------------------------------------------
// End-to-end scenario
// ---------------------------------------------------------------------------

/// A dynamic one-tile crate dropped onto a static platform, driven through
/// the full registry/system/event stack.
#[test]
fn crate_falls_onto_platform_and_reports_the_contact() {
    let mut registry = Registry::new();
    let crate_entity = spawn_physics_entity(
        &mut registry,
        Transform::new(100.0, 100.0),
        RigidBody::new_dynamic(1.0),
        Collider::new_box(32.0, 32.0),
    );
    let platform_entity = spawn_physics_entity(
        &mut registry,
        Transform::new(0.0, 300.0),
        RigidBody::new_static(),
        Collider::new_box(640.0, 32.0),
    );

    let mut system = PhysicsSystem::new(PhysicsWorld::new(Vec2::new(0.0, 9.8)).unwrap());
    system.init(&mut registry);

    let begins = Rc::new(RefCell::new(Vec::new()));
    let mut processor = EventProcessor::new();
    {
        let begins = Rc::clone(&begins);
        processor
            .signals_mut()
            .on_collision_begin
            .connect(move |e: &CollisionBeginEvent| {
                begins.borrow_mut().push((e.entity_a, e.entity_b))
            });
    }

    for _ in 0..120 {
        system.update(&mut registry, FIXED_TIMESTEP);
        processor.process(system.world_mut());
    }

    let final_y = registry.get::<Transform>(crate_entity).unwrap().y;
    assert!(
        final_y > 100.0,
        "crate must have fallen from its spawn height, final y={final_y}"
    );

    let begins = begins.borrow();
    assert!(!begins.is_empty(), "the landing must publish a begin event");
    let (a, b) = begins[0];
    let mut pair = [a, b];
    pair.sort();
    let mut expected = [crate_entity, platform_entity];
    expected.sort();
    assert_eq!(pair, expected);

    // The platform never moved.
    assert_eq!(
        *registry.get::<Transform>(platform_entity).unwrap(),
        Transform::new(0.0, 300.0)
    );
}

/// Hit events respect the configurable speed threshold.
#[test]
fn hit_events_respect_the_speed_threshold() {
    fn run(threshold: f32) -> usize {
        let mut world = PhysicsWorld::new(DEFAULT_GRAVITY).unwrap();
        create_body(
            &mut world,
            Entity::new(0, 0),
            &Transform::new(100.0, 0.0),
            &RigidBody::new_dynamic(1.0),
            &Collider::new_box(32.0, 32.0),
        );
        create_body(
            &mut world,
            Entity::new(1, 0),
            &Transform::new(0.0, 400.0),
            &RigidBody::new_static(),
            &Collider::new_box(640.0, 32.0),
        );

        let hits = Rc::new(RefCell::new(0usize));
        let mut processor = EventProcessor::new();
        processor.set_hit_speed_threshold(threshold);
        {
            let hits = Rc::clone(&hits);
            processor
                .signals_mut()
                .on_collision_hit
                .connect(move |_: &CollisionHitEvent| *hits.borrow_mut() += 1);
        }

        for _ in 0..180 {
            world.step(FIXED_TIMESTEP);
            processor.process(&mut world);
        }
        let count = *hits.borrow();
        count
    }

    // A ~1.4 s free fall impacts at several m/s: well above the default
    // threshold, far below an absurd one.
    assert!(run(DEFAULT_HIT_SPEED_THRESHOLD) > 0, "impact must register");
    assert_eq!(run(1_000.0), 0, "unreachable threshold must mute hits");
}

// ---------------------------------------------------------------------------
// Schedule integration
// ---------------------------------------------------------------------------

/// The physics system is reachable through the schedule by its stable tag.
#[test]
fn physics_system_runs_under_the_schedule() {
    let mut registry = Registry::new();
    let entity = spawn_physics_entity(
        &mut registry,
        Transform::new(0.0, 0.0),
        RigidBody::new_dynamic(1.0),
        Collider::from_tiles(1, 1),
    );

    let mut system = PhysicsSystem::new(PhysicsWorld::new(DEFAULT_GRAVITY).unwrap());
    system.init(&mut registry);

    let mut schedule = Schedule::new();
    schedule.add_system(Box::new(system));
    assert!(schedule.system(PHYSICS_SYSTEM_NAME).is_some());

    for _ in 0..30 {
        schedule.run(&mut registry, FIXED_TIMESTEP);
    }
    assert!(registry.get::<Transform>(entity).unwrap().y > 0.0);
}
