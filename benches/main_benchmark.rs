use criterion::{Criterion, criterion_group, criterion_main};
use kiln::build::utils::get_std_flag_gcc;
use kiln::graph::{DependencyGraph, scan_includes};
use std::fs;
use std::hint::black_box;
use std::path::PathBuf;

const MOCK_SOURCE: &str = r#"
// Widget implementation
#include "widget.h"
#include "util/strings.h"
#include <vector>
#include <string>

/* #include "commented_out.h" */
static const char* banner = "#include \"not_a_directive.h\"";

#if defined(FEATURE)
#  include "feature.h"
#endif

int widget_count(const std::vector<int>& v) {
    return static_cast<int>(v.size());
}
"#;

fn bench_scan_includes(c: &mut Criterion) {
    let text = MOCK_SOURCE.repeat(20);
    c.bench_function("scan_includes", |b| {
        b.iter(|| scan_includes(black_box(text.as_bytes())))
    });
}

fn bench_graph_build(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let src = dir.path().join("src");
    fs::create_dir_all(&src).expect("src dir");

    // 50 sources sharing a chain of 10 headers
    for i in 0..10 {
        let next = if i + 1 < 10 {
            format!("#include \"h{}.h\"\n", i + 1)
        } else {
            String::new()
        };
        fs::write(src.join(format!("h{}.h", i)), next).expect("header");
    }
    let roots: Vec<PathBuf> = (0..50)
        .map(|i| {
            let path = src.join(format!("s{}.cpp", i));
            fs::write(&path, "#include \"h0.h\"\nint f() { return 0; }\n").expect("source");
            path
        })
        .collect();

    c.bench_function("dependency_graph_build", |b| {
        b.iter(|| {
            let mut graph = DependencyGraph::build(black_box(&roots), &[]);
            graph.compute_effective_times();
            graph
        })
    });
}

fn bench_std_flags(c: &mut Criterion) {
    c.bench_function("get_std_flag_gcc", |b| {
        b.iter(|| {
            for edition in ["c++20", "cpp17", "gnu++23", "c11", "17"] {
                black_box(get_std_flag_gcc(black_box(edition)));
            }
        })
    });
}

criterion_group!(benches, bench_scan_includes, bench_graph_build, bench_std_flags);
criterion_main!(benches);
