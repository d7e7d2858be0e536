//! Benchmarks for the render, diff and patch pipeline.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use livemark::cancel::Checkpoint;
use livemark::diff::{Patch, diff};
use livemark::patch::{MountedTree, apply};
use livemark::render::{MarkdownRenderer, Render};

fn document(blocks: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for i in 0..blocks {
        match i % 4 {
            0 => lines.push(format!("## Section {i}")),
            1 => lines.push(format!("Paragraph {i} with *emphasis* and `code`.")),
            2 => {
                lines.push("```rust".to_string());
                lines.push(format!("fn block_{i}() {{}}"));
                lines.push("```".to_string());
            }
            _ => {
                lines.push(format!("- item {i}"));
                lines.push(format!("- item {}", i + 1));
            }
        }
        lines.push(String::new());
    }
    lines
}

fn mounted(lines: &[String]) -> MountedTree {
    let tree = MarkdownRenderer::new().render(lines).unwrap();
    let mut mounted = MountedTree::new();
    apply(&mut mounted, Patch::Mount(tree), &mut Checkpoint::detached()).unwrap();
    mounted
}

fn bench_render(c: &mut Criterion) {
    let lines = document(200);
    let renderer = MarkdownRenderer::new();
    c.bench_function("render_200_blocks", |b| {
        b.iter(|| renderer.render(black_box(&lines)).unwrap())
    });
}

fn bench_diff_single_edit(c: &mut Criterion) {
    let lines = document(200);
    let base = mounted(&lines);
    let mut edited = lines;
    edited[301] = "Paragraph edited in the middle.".to_string();
    let fresh = MarkdownRenderer::new().render(&edited).unwrap();
    c.bench_function("diff_single_edit_200_blocks", |b| {
        b.iter(|| diff(base.tree(), black_box(fresh.clone()), &mut Checkpoint::detached()).unwrap())
    });
}

fn bench_diff_unchanged(c: &mut Criterion) {
    let lines = document(200);
    let base = mounted(&lines);
    let fresh = MarkdownRenderer::new().render(&lines).unwrap();
    c.bench_function("diff_unchanged_200_blocks", |b| {
        b.iter(|| diff(base.tree(), black_box(fresh.clone()), &mut Checkpoint::detached()).unwrap())
    });
}

fn bench_diff_and_apply(c: &mut Criterion) {
    let lines = document(200);
    let mut edited = lines.clone();
    edited.insert(0, "Inserted at the top.".to_string());
    edited.insert(1, String::new());
    let fresh = MarkdownRenderer::new().render(&edited).unwrap();
    c.bench_function("diff_apply_insert_top_200_blocks", |b| {
        b.iter_batched(
            || mounted(&lines),
            |mut base| {
                let patch = diff(base.tree(), fresh.clone(), &mut Checkpoint::detached()).unwrap();
                apply(&mut base, patch, &mut Checkpoint::detached()).unwrap()
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_render,
    bench_diff_single_edit,
    bench_diff_unchanged,
    bench_diff_and_apply
);
criterion_main!(benches);
