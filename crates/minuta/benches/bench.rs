use criterion::{Criterion, criterion_group, criterion_main};
use minuta::{ValueMap, extract, substitute};
use std::hint::black_box;

fn contract_body() -> String {
    // Roughly the size and shape of a stored contract template.
    let clause = "<p>O contratante {{nome}}, CPF {{cpf}}, residente em {{endereco}}, \
                  concorda com o valor de {{valor}} na data {{data}}.</p>\n";
    clause.repeat(64)
}

fn bench_extract(c: &mut Criterion) {
    let body = contract_body();
    c.bench_function("extract/contract", |b| {
        b.iter(|| extract(black_box(&body)));
    });
}

fn bench_substitute(c: &mut Criterion) {
    let body = contract_body();
    let values: ValueMap = [
        ("nome", "Ana Beatriz Souza"),
        ("cpf", "123.456.789-00"),
        ("endereco", "Rua das Acácias, 100"),
        ("valor", "R$ 1.250,00"),
        ("data", "07/08/2026"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    c.bench_function("substitute/contract", |b| {
        b.iter(|| substitute(black_box(&body), black_box(&values)));
    });
}

criterion_group!(benches, bench_extract, bench_substitute);
criterion_main!(benches);
