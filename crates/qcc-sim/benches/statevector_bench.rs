//! Benchmarks for the statevector engine
//!
//! Run with: cargo bench -p qcc-sim

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use qcc_sim::{Circuit, Pauli, QubitId, Statevector};

/// Layered Ry/Rz + CZ ring, the shape the classifier builds.
fn layered_circuit(num_qubits: usize, layers: usize) -> Circuit {
    let mut circuit = Circuit::with_size("bench", num_qubits);
    for layer in 0..layers {
        for q in 0..num_qubits {
            let theta = 0.1 * (layer * num_qubits + q) as f64;
            circuit.ry(theta, QubitId::from(q)).unwrap();
            circuit.rz(theta / 2.0, QubitId::from(q)).unwrap();
        }
        for q in 0..num_qubits - 1 {
            circuit.cz(QubitId::from(q), QubitId::from(q + 1)).unwrap();
        }
    }
    circuit
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("statevector_run");

    for num_qubits in &[2usize, 4, 8, 12] {
        let circuit = layered_circuit(*num_qubits, 2);
        group.bench_with_input(
            BenchmarkId::new("layered", num_qubits),
            &circuit,
            |b, circuit| {
                let mut sv = Statevector::new(circuit.num_qubits()).unwrap();
                b.iter(|| {
                    sv.run(black_box(circuit)).unwrap();
                    sv.expectation(Pauli::Z, QubitId(0)).unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_run);
criterion_main!(benches);
