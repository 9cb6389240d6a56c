use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bandcheck_core::feedback::parse_evaluation;
use bandcheck_core::parser::parse_answer_key_str;

fn bench_parse_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_evaluation");

    let strict = r#"{"overall_band": 6.5, "fluency_coherence": 6, "lexical_resource": 7,
        "grammatical_range": 6.5, "pronunciation": 6.5, "feedback": "Clear and relevant.",
        "strengths": ["range of vocabulary"], "improvements": ["fewer pauses"]}"#;

    let fenced = r#"Here is my evaluation:

```json
{"bandScore": "7", "comments": "Fluent with minor slips.", "suggestions": ["vary tenses"]}
```

Keep practising!"#;

    let embedded = r#"Overall I would say {"overall": 6, "feedback": "Good {structure}"} is fair."#;

    let raw = "The candidate speaks at length without noticeable effort. ".repeat(20);

    group.bench_function("strict", |b| {
        b.iter(|| parse_evaluation(black_box(strict)))
    });

    group.bench_function("fenced", |b| {
        b.iter(|| parse_evaluation(black_box(fenced)))
    });

    group.bench_function("embedded", |b| {
        b.iter(|| parse_evaluation(black_box(embedded)))
    });

    group.bench_function("raw_fallback", |b| {
        b.iter(|| parse_evaluation(black_box(&raw)))
    });

    group.finish();
}

fn bench_toml_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("toml_parsing");

    let small_toml = generate_key_toml(13);
    let full_toml = generate_key_toml(40);

    group.bench_function("13_answers", |b| {
        b.iter(|| parse_answer_key_str(black_box(&small_toml), Path::new("bench.toml")))
    });

    group.bench_function("40_answers", |b| {
        b.iter(|| parse_answer_key_str(black_box(&full_toml), Path::new("bench.toml")))
    });

    group.finish();
}

fn generate_key_toml(n: usize) -> String {
    let mut s = String::from(
        "[test]\nid = \"bench\"\nname = \"Bench\"\nmodule = \"academic-reading\"\n\n\
         [[ranges]]\nfirst = 1\nlast = 6\nkind = \"tfng\"\n\n[answers]\n",
    );
    for i in 1..=n {
        let answer = if i <= 6 { "NOT GIVEN".to_string() } else { format!("word{i}/words{i}") };
        s.push_str(&format!("\"{i}\" = \"{answer}\"\n"));
    }
    s
}

criterion_group!(benches, bench_parse_evaluation, bench_toml_parsing);
criterion_main!(benches);
