use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use snipdrill::content::{SnippetLibrary, SnippetSource};
use snipdrill::engine::bias::SignalPolicy;
use snipdrill::engine::difficulty::DifficultyProfile;
use snipdrill::engine::heatmap::MistakeHeatmap;
use snipdrill::engine::selector::SmartSelector;
use snipdrill::store::schema::ProfileData;

const SYMBOLS: &[char] = &['{', '}', '(', ')', ';', ':', '=', '<', '>', '&', '|', 'a', 'b', 'x'];

fn trained_heatmap(updates: usize) -> MistakeHeatmap {
    let mut heatmap = MistakeHeatmap::default();
    for i in 0..updates {
        let ch = SYMBOLS[i % SYMBOLS.len()];
        if i % 7 == 0 {
            heatmap.record_miss(ch, Some('?'));
        } else {
            heatmap.record_hit(ch);
        }
    }
    heatmap
}

fn make_library(count: usize) -> SnippetLibrary {
    let mut library = SnippetLibrary::new();
    for i in 0..count {
        let depth = i % 4;
        let code = format!(
            "fn f{i}(x: &[u32]) -> u32 {{ {}x[{i} % x.len()]{} }}",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        let tier = (i % 7) as u8 + 1;
        // Codes are unique per index, so every add succeeds
        let source = SnippetSource::Corpus;
        let _ = library.add_with_difficulty("rust", &code, Some(tier), Vec::new(), source);
    }
    library
}

fn bench_heatmap_updates(c: &mut Criterion) {
    c.bench_function("heatmap (10k updates)", |b| {
        b.iter(|| trained_heatmap(black_box(10_000)))
    });
}

fn bench_weakest(c: &mut Criterion) {
    let heatmap = trained_heatmap(10_000);
    c.bench_function("heatmap weakest + groups", |b| {
        b.iter(|| {
            let weak = heatmap.weakest(black_box(10), 5);
            let groups = heatmap.weakest_groups(black_box(10));
            (weak, groups)
        })
    });
}

fn bench_selection(c: &mut Criterion) {
    let library = make_library(5_000);
    let mut profile = ProfileData::default();
    profile.heatmap = trained_heatmap(10_000);
    let difficulty = DifficultyProfile::pinned(4);
    let policy = SignalPolicy::with_weakness_bias(true);
    let mut selector = SmartSelector::default();
    let mut rng = SmallRng::seed_from_u64(17);

    c.bench_function("select_adaptive (5k candidates)", |b| {
        b.iter(|| {
            selector.select_adaptive(
                &library,
                "rust",
                &profile,
                black_box(&difficulty),
                None,
                &policy,
                &mut rng,
            )
        })
    });
}

criterion_group!(benches, bench_heatmap_updates, bench_weakest, bench_selection);
criterion_main!(benches);
