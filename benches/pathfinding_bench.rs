use criterion::{Criterion, black_box, criterion_group, criterion_main};
use dungeon::{DungeonGenerator, GeneratorConfig, Pathfinder, PathfindingConfig, SeededRng};

use deepforge::{Action, Session};
use deepforge::actions::WaitAction;

fn bench_generation(c: &mut Criterion) {
    let generator = DungeonGenerator::new(GeneratorConfig::default());
    c.bench_function("generate_64x40", |b| {
        b.iter(|| {
            let mut rng = SeededRng::new(black_box(12345));
            generator.generate(64, 40, 1, &mut rng)
        })
    });
}

fn bench_pathfinding(c: &mut Criterion) {
    let mut rng = SeededRng::new(777);
    let level = DungeonGenerator::new(GeneratorConfig::default()).generate(64, 40, 1, &mut rng);
    let start = level.rooms.first().map(|r| r.center()).unwrap_or((1, 1));
    let goal = level.stair_down().unwrap_or(start);

    let with_shortcut = Pathfinder::new(PathfindingConfig::default());
    let without_shortcut = Pathfinder::new(PathfindingConfig {
        line_of_sight_shortcut: false,
        ..PathfindingConfig::default()
    });

    c.bench_function("astar_across_level", |b| {
        b.iter(|| with_shortcut.find_path(&level, black_box(start), black_box(goal)))
    });
    c.bench_function("astar_across_level_no_shortcut", |b| {
        b.iter(|| without_shortcut.find_path(&level, black_box(start), black_box(goal)))
    });
}

fn bench_turns(c: &mut Criterion) {
    c.bench_function("hundred_wait_turns", |b| {
        b.iter_with_setup(
            || Session::with_defaults(black_box(42u64)).expect("builtin content is valid"),
            |mut session| {
                let actor = session.world.player_id();
                for _ in 0..100 {
                    session.submit(Action::Wait(WaitAction { actor }));
                }
                session
            },
        )
    });
}

criterion_group!(benches, bench_generation, bench_pathfinding, bench_turns);
criterion_main!(benches);
